//! Execution parameters: turn loop control.

use serde::{Deserialize, Serialize};

/// Controls the step loop of
/// [`StreamCoordinator`](crate::use_cases::run_turn::StreamCoordinator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionParams {
    /// Maximum model steps in one turn.
    pub max_steps: usize,
    /// Whether a human is attached to answer approval prompts.
    pub interactive: bool,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            max_steps: 10,
            interactive: false,
        }
    }
}

impl ExecutionParams {
    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max.max(1);
        self
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }
}
