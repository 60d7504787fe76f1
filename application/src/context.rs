//! Execution context handed to every tool invocation.
//!
//! [`SessionContext`] holds what is fixed for a session: working directory,
//! policy, containment checks and the shared approval state.
//! [`SessionContext::for_call`] derives a fresh [`ExecutionContext`] for each
//! tool call, carrying the turn's cancellation token.

use crate::config::ToolPolicy;
use crate::use_cases::approval_gate::ApprovalGate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use warden_domain::{CommandValidator, PathGuard, SessionApproval};

/// Session-scoped state shared by every call in the session.
#[derive(Clone)]
pub struct SessionContext {
    working_dir: PathBuf,
    guard: PathGuard,
    validator: CommandValidator,
    policy: Arc<ToolPolicy>,
    approval: SessionApproval,
    approval_gate: Option<Arc<ApprovalGate>>,
}

impl SessionContext {
    /// Headless session: no approval gate.
    pub fn new(working_dir: impl Into<PathBuf>, policy: Arc<ToolPolicy>) -> Self {
        let working_dir = working_dir.into();
        let working_dir = working_dir.canonicalize().unwrap_or(working_dir);
        let guard = if policy.allowed_roots.is_empty() {
            PathGuard::new([&working_dir])
        } else {
            PathGuard::new(&policy.allowed_roots)
        };
        let validator =
            CommandValidator::new(policy.allowed_programs.iter().cloned(), policy.pipe_policy);

        Self {
            working_dir,
            guard,
            validator,
            policy,
            approval: SessionApproval::new(),
            approval_gate: None,
        }
    }

    /// Attach an interactive approval gate.
    pub fn with_approval_gate(mut self, gate: Arc<ApprovalGate>) -> Self {
        self.approval_gate = Some(gate);
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn policy(&self) -> &ToolPolicy {
        &self.policy
    }

    pub fn approval(&self) -> &SessionApproval {
        &self.approval
    }

    pub fn is_interactive(&self) -> bool {
        self.approval_gate.is_some()
    }

    pub fn approval_gate(&self) -> Option<&Arc<ApprovalGate>> {
        self.approval_gate.as_ref()
    }

    /// Context for one tool call.
    pub fn for_call(
        &self,
        tool_call_id: impl Into<String>,
        cancel: CancellationToken,
    ) -> ExecutionContext {
        ExecutionContext {
            tool_call_id: tool_call_id.into(),
            working_dir: self.working_dir.clone(),
            guard: self.guard.clone(),
            validator: self.validator.clone(),
            timeout: self.policy.default_timeout,
            cancel,
            approval: self.approval.clone(),
            approval_gate: self.approval_gate.clone(),
            policy: self.policy.clone(),
        }
    }
}

/// Everything a tool may consult while it runs.
#[derive(Clone)]
pub struct ExecutionContext {
    pub tool_call_id: String,
    pub working_dir: PathBuf,
    pub guard: PathGuard,
    pub validator: CommandValidator,
    pub timeout: Duration,
    pub cancel: CancellationToken,
    /// Shared auto-accept flag
    pub approval: SessionApproval,
    /// `None` when running headless
    pub approval_gate: Option<Arc<ApprovalGate>>,
    pub policy: Arc<ToolPolicy>,
}

impl ExecutionContext {
    /// Resolve a path argument through the guard, returning the failure as
    /// tool-readable text.
    pub fn resolve_path(&self, requested: &str) -> Result<PathBuf, String> {
        self.guard
            .resolve(requested, &self.working_dir)
            .map_err(|e| e.to_string())
    }

    /// Ask for approval when a human is attached.
    ///
    /// Headless sessions always pass. `Err` carries the rejection text for
    /// the model.
    pub async fn require_approval(&self, description: &str) -> Result<(), String> {
        let Some(gate) = &self.approval_gate else {
            return Ok(());
        };
        let decision = gate.decide(description, &self.approval, &self.cancel).await;
        match decision.rejection_text() {
            Some(text) => Err(text),
            None => Ok(()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_root_is_working_dir() {
        let dir = tempfile_dir();
        let session = SessionContext::new(&dir, Arc::new(ToolPolicy::default()));
        let ctx = session.for_call("c1", CancellationToken::new());

        assert_eq!(ctx.guard.roots(), &[session.working_dir().to_path_buf()]);
        assert!(ctx.resolve_path("../escape").is_err());
        assert!(!session.is_interactive());
    }

    #[test]
    fn test_calls_share_approval_flag() {
        let dir = tempfile_dir();
        let session = SessionContext::new(&dir, Arc::new(ToolPolicy::default()));
        let a = session.for_call("a", CancellationToken::new());
        let b = session.for_call("b", CancellationToken::new());
        a.approval.enable_auto_accept();
        assert!(b.approval.is_auto_accepting());

        let other = SessionContext::new(&dir, Arc::new(ToolPolicy::default()));
        assert!(!other.approval().is_auto_accepting());
    }

    #[tokio::test]
    async fn test_headless_approval_passes() {
        let dir = tempfile_dir();
        let session = SessionContext::new(&dir, Arc::new(ToolPolicy::default()));
        let ctx = session.for_call("c1", CancellationToken::new());
        assert!(ctx.require_approval("rm -rf /").await.is_ok());
    }

    fn tempfile_dir() -> PathBuf {
        std::env::temp_dir()
    }
}
