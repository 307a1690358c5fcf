//! Per-run record of tool call attempts, used to break tool-call loops.

use std::collections::HashMap;

/// Counts identical `(name, raw arguments)` calls. Counts only grow; a new
/// orchestrator starts from an empty history.
#[derive(Debug, Clone)]
pub struct ToolCallHistory {
    attempts: HashMap<String, u32>,
    max_attempts: u32,
}

impl ToolCallHistory {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: HashMap::new(),
            max_attempts,
        }
    }

    /// Arguments are compared as the raw string the model sent.
    fn key(name: &str, raw_args: &str) -> String {
        format!("{name}:{raw_args}")
    }

    /// Count one more attempt. Returns `false` once the call has been made
    /// more than `max_attempts` times.
    pub fn record(&mut self, name: &str, raw_args: &str) -> bool {
        let count = self.attempts.entry(Self::key(name, raw_args)).or_insert(0);
        *count += 1;
        *count <= self.max_attempts
    }

    pub fn attempts(&self, name: &str, raw_args: &str) -> u32 {
        self.attempts
            .get(&Self::key(name, raw_args))
            .copied()
            .unwrap_or(0)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Output reported for a call that was skipped.
    pub fn exceeded_message(&self) -> String {
        format!(
            "Maximum retry attempts ({}) exceeded for this operation. \
             The operation has been canceled to prevent an infinite loop.",
            self.max_attempts
        )
    }
}
