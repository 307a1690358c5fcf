//! Tools the assistant can call, and the dispatcher that routes to them.

pub mod builtin;
pub mod envelope;
pub mod registry;
pub mod tool;

pub use envelope::ResultEnvelope;
pub use registry::{Dispatcher, ToolArguments, ToolRegistry};
pub use tool::*;
