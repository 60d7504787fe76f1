//! Tool domain value objects: the outcome that reaches the model
//!
//! Every dispatched call resolves to exactly one [`ToolOutcome`]. Failures
//! are data: the reason text is what the model reads on its next step.

use serde::{Deserialize, Serialize};

/// Final result of one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The tool ran and its output fit the token budget.
    Ok(String),
    /// The tool ran but its output exceeded the budget and was replaced.
    Truncated {
        notice: String,
        token_count: usize,
        limit: usize,
    },
    /// The call was rejected, could not run, or crashed.
    Failed(String),
}

impl ToolOutcome {
    pub fn ok(text: impl Into<String>) -> Self {
        Self::Ok(text.into())
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// The text folded back into the conversation for the model.
    pub fn model_text(&self) -> &str {
        match self {
            ToolOutcome::Ok(text) => text,
            ToolOutcome::Truncated { notice, .. } => notice,
            ToolOutcome::Failed(reason) => reason,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ToolOutcome::Failed(_))
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, ToolOutcome::Truncated { .. })
    }
}
