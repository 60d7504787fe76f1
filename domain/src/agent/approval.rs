//! Human approval decisions and the session-scoped auto-accept flag.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// What the human chose for one high-risk call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    Accept,
    /// Accept this call and every later one in the session.
    AcceptAll,
    Reject {
        reason: String,
    },
}

impl ApprovalDecision {
    pub fn reject(reason: impl Into<String>) -> Self {
        ApprovalDecision::Reject {
            reason: reason.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ApprovalDecision::Accept | ApprovalDecision::AcceptAll)
    }

    /// Tool result text the model sees when the human says no.
    pub fn rejection_text(&self) -> Option<String> {
        match self {
            ApprovalDecision::Reject { reason } if reason.trim().is_empty() => {
                Some("User rejected the command.".to_string())
            }
            ApprovalDecision::Reject { reason } => Some(format!(
                "User rejected the command. Reason: {}",
                reason.trim()
            )),
            _ => None,
        }
    }
}

/// Approval mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    Normal,
    AutoAccepting,
}

/// Shared auto-accept flag.
///
/// Clones share the flag. The only transition is `Normal -> AutoAccepting`;
/// a fresh session starts from [`SessionApproval::new`].
#[derive(Debug, Clone, Default)]
pub struct SessionApproval {
    auto_accept: Arc<AtomicBool>,
}

impl SessionApproval {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ApprovalMode {
        if self.is_auto_accepting() {
            ApprovalMode::AutoAccepting
        } else {
            ApprovalMode::Normal
        }
    }

    pub fn is_auto_accepting(&self) -> bool {
        self.auto_accept.load(Ordering::Acquire)
    }

    pub fn enable_auto_accept(&self) {
        self.auto_accept.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_accept_is_sticky_and_shared() {
        let approval = SessionApproval::new();
        let handle = approval.clone();
        assert_eq!(approval.mode(), ApprovalMode::Normal);

        handle.enable_auto_accept();
        assert_eq!(approval.mode(), ApprovalMode::AutoAccepting);
        handle.enable_auto_accept();
        assert!(approval.is_auto_accepting());
    }

    #[test]
    fn test_sessions_are_independent() {
        let first = SessionApproval::new();
        let second = SessionApproval::new();
        first.enable_auto_accept();
        assert!(!second.is_auto_accepting());
    }

    #[test]
    fn test_rejection_text() {
        assert_eq!(ApprovalDecision::Accept.rejection_text(), None);
        assert_eq!(
            ApprovalDecision::reject("  use git diff instead ").rejection_text(),
            Some("User rejected the command. Reason: use git diff instead".to_string())
        );
        assert_eq!(
            ApprovalDecision::reject("").rejection_text(),
            Some("User rejected the command.".to_string())
        );
    }
}
