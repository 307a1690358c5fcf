//! Remote assistant service: threads, messages and runs.
//!
//! The core treats the assistant service as a remote state machine reachable
//! only through the [`AssistantApi`] trait. [`OpenAiAssistantClient`] is the
//! HTTP implementation; tests substitute in-memory fakes.

pub mod api;
pub mod openai;
pub mod types;

pub use api::{AssistantAdmin, AssistantApi};
pub use openai::OpenAiAssistantClient;
pub use types::*;
