//! ApprovalGate: human confirmation for high-risk tool calls.
//!
//! ```text
//! Normal ──(AcceptAll)──▶ AutoAccepting
//! ```
//!
//! There is no way back to `Normal` within a session. Prompts are
//! serialized: concurrent calls queue on one lock and re-check the
//! auto-accept flag once they hold it, so an "accept all" answered for one
//! call releases the calls queued behind it without further prompts.

use crate::ports::approval::{ApprovalError, ApprovalPort};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use warden_domain::{ApprovalDecision, SessionApproval};

pub struct ApprovalGate {
    port: Arc<dyn ApprovalPort>,
    prompt_lock: Mutex<()>,
    /// Set once the current batch has shown its first prompt.
    batch_prompted: AtomicBool,
    first_prompt_delay: Duration,
}

impl ApprovalGate {
    pub fn new(port: Arc<dyn ApprovalPort>) -> Self {
        Self {
            port,
            prompt_lock: Mutex::new(()),
            batch_prompted: AtomicBool::new(false),
            first_prompt_delay: Duration::ZERO,
        }
    }

    pub fn with_first_prompt_delay(mut self, delay: Duration) -> Self {
        self.first_prompt_delay = delay;
        self
    }

    /// Mark the start of a new batch of tool calls (one model step).
    pub fn begin_batch(&self) {
        self.batch_prompted.store(false, Ordering::Release);
    }

    /// Decide whether `description` may run.
    ///
    /// Cancellation while waiting for the lock or the human is an implicit
    /// reject. Prompt failures also reject.
    pub async fn decide(
        &self,
        description: &str,
        session: &SessionApproval,
        cancel: &CancellationToken,
    ) -> ApprovalDecision {
        if session.is_auto_accepting() {
            debug!(description, "Auto-accepting");
            return ApprovalDecision::Accept;
        }

        let _guard = tokio::select! {
            guard = self.prompt_lock.lock() => guard,
            _ = cancel.cancelled() => return cancelled(),
        };

        // Another prompt may have switched the session while we queued
        if session.is_auto_accepting() {
            debug!(description, "Auto-accepting after queued prompt");
            return ApprovalDecision::Accept;
        }

        if !self.first_prompt_delay.is_zero() && !self.batch_prompted.swap(true, Ordering::AcqRel)
        {
            tokio::select! {
                _ = tokio::time::sleep(self.first_prompt_delay) => {}
                _ = cancel.cancelled() => return cancelled(),
            }
        }

        let result = tokio::select! {
            result = self.port.request_approval(description) => result,
            _ = cancel.cancelled() => return cancelled(),
        };

        match result {
            Ok(ApprovalDecision::AcceptAll) => {
                info!("Auto-accept enabled for the rest of the session");
                session.enable_auto_accept();
                ApprovalDecision::AcceptAll
            }
            Ok(decision) => {
                debug!(description, ?decision, "Approval decision");
                decision
            }
            Err(ApprovalError::Cancelled) => cancelled(),
            Err(e) => {
                warn!(error = %e, "Approval prompt failed; rejecting");
                ApprovalDecision::reject(format!("Approval prompt failed: {}", e))
            }
        }
    }
}

fn cancelled() -> ApprovalDecision {
    ApprovalDecision::reject("Cancelled by user before approval")
}
