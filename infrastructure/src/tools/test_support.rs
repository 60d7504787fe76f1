//! Fixtures shared by the tool tests.

use std::path::Path;
use std::sync::Arc;
use warden_application::{ApprovalGate, AutoRejectApproval, SessionContext, ToolPolicy};
use warden_domain::ToolArguments;

pub(crate) fn args(value: serde_json::Value) -> ToolArguments {
    match value {
        serde_json::Value::Object(map) => ToolArguments::new(map),
        other => panic!("tool arguments must be an object, got {other}"),
    }
}

pub(crate) fn session(dir: &Path) -> SessionContext {
    session_with(dir, ToolPolicy::default())
}

pub(crate) fn session_with(dir: &Path, policy: ToolPolicy) -> SessionContext {
    SessionContext::new(dir, Arc::new(policy))
}

/// A session whose human rejects everything with `reason`.
pub(crate) fn interactive_session(dir: &Path, reason: &str) -> SessionContext {
    let gate = ApprovalGate::new(Arc::new(AutoRejectApproval::new(reason)));
    session(dir).with_approval_gate(Arc::new(gate))
}
