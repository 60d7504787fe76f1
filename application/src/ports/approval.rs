//! Approval port for high-risk tool calls.
//!
//! - **Port**: [`ApprovalPort`] - defined here in application layer
//! - **Adapter**: `InteractiveApproval` - terminal prompt in presentation layer
//!
//! ```text
//! run_command validated
//!        ↓
//! ApprovalGate::decide()  ── auto-accepting? ──▶ Accept
//!        ↓
//! ApprovalPort::request_approval()
//!        ↓
//! User decides: Accept / Accept all / Reject (+ reason)
//! ```
//!
//! # Built-in Implementations
//!
//! - [`AutoAcceptApproval`] - Always returns `ApprovalDecision::Accept`
//! - [`AutoRejectApproval`] - Always rejects with a fixed reason

use async_trait::async_trait;
use thiserror::Error;
use warden_domain::ApprovalDecision;

/// Failures of the prompt itself, not decisions made by the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    /// User cancelled the operation (e.g., via Ctrl+C).
    #[error("Operation cancelled")]
    Cancelled,
    /// Input/output error (e.g., terminal read failure).
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Port for asking a human whether a high-risk call may run.
#[async_trait]
pub trait ApprovalPort: Send + Sync {
    /// `description` is what the tool is about to do, e.g. the command line.
    async fn request_approval(&self, description: &str) -> Result<ApprovalDecision, ApprovalError>;
}

/// Accepts everything.
pub struct AutoAcceptApproval;

#[async_trait]
impl ApprovalPort for AutoAcceptApproval {
    async fn request_approval(&self, _description: &str) -> Result<ApprovalDecision, ApprovalError> {
        Ok(ApprovalDecision::Accept)
    }
}

/// Rejects everything with a fixed reason.
pub struct AutoRejectApproval {
    reason: String,
}

impl AutoRejectApproval {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for AutoRejectApproval {
    fn default() -> Self {
        Self::new("Rejected by policy")
    }
}

#[async_trait]
impl ApprovalPort for AutoRejectApproval {
    async fn request_approval(&self, _description: &str) -> Result<ApprovalDecision, ApprovalError> {
        Ok(ApprovalDecision::reject(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builtin_ports() {
        assert_eq!(
            AutoAcceptApproval.request_approval("ls").await.unwrap(),
            ApprovalDecision::Accept
        );
        assert_eq!(
            AutoRejectApproval::default()
                .request_approval("ls")
                .await
                .unwrap(),
            ApprovalDecision::reject("Rejected by policy")
        );
    }
}
