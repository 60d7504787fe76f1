//! Tool execution state machine and the in-flight set.
//!
//! Every dispatched tool call gets a [`ToolExecution`] entry in
//! [`PendingTools`] before it runs. The entry is removed when the call ends
//! or errors; an entry still present at agent-stop is a bug.
//!
//! ```text
//! Pending ──> Running ──> Completed
//!                    └──> Error
//! ```

use crate::core::string::truncate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// State of a tool execution. Each variant carries only the fields valid for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ToolExecutionState {
    Pending,
    Running {
        started_at: u64,
        updates: usize,
    },
    Completed {
        started_at: u64,
        completed_at: u64,
        output_preview: String,
    },
    Error {
        started_at: u64,
        failed_at: u64,
        error_message: String,
    },
}

impl ToolExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Error { .. })
    }

    /// Duration in milliseconds (only available for terminal states).
    pub fn duration_ms(&self) -> Option<u64> {
        match self {
            Self::Completed {
                started_at,
                completed_at,
                ..
            } => Some(completed_at.saturating_sub(*started_at)),
            Self::Error {
                started_at,
                failed_at,
                ..
            } => Some(failed_at.saturating_sub(*started_at)),
            _ => None,
        }
    }
}

/// One tool call being tracked from dispatch to resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolExecution {
    pub tool_call_id: String,
    pub tool_name: String,
    pub state: ToolExecutionState,
    /// Model step this call belongs to (1-indexed).
    pub step: usize,
}

impl ToolExecution {
    pub fn new(tool_call_id: impl Into<String>, tool_name: impl Into<String>, step: usize) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            state: ToolExecutionState::Pending,
            step,
        }
    }

    /// Pending -> Running. No-op otherwise.
    pub fn mark_running(&mut self) {
        if self.state == ToolExecutionState::Pending {
            self.state = ToolExecutionState::Running {
                started_at: current_timestamp(),
                updates: 0,
            };
        }
    }

    pub fn record_update(&mut self) {
        if let ToolExecutionState::Running { updates, .. } = &mut self.state {
            *updates += 1;
        }
    }

    /// Running -> Completed. No-op otherwise.
    pub fn mark_completed(&mut self, output: &str) {
        if let ToolExecutionState::Running { started_at, .. } = self.state {
            self.state = ToolExecutionState::Completed {
                started_at,
                completed_at: current_timestamp(),
                output_preview: truncate(output, 200),
            };
        }
    }

    /// Pending or Running -> Error. A call can fail before it starts running
    /// (schema errors, rejections).
    pub fn mark_error(&mut self, message: impl Into<String>) {
        let started_at = match self.state {
            ToolExecutionState::Pending => current_timestamp(),
            ToolExecutionState::Running { started_at, .. } => started_at,
            _ => return,
        };
        self.state = ToolExecutionState::Error {
            started_at,
            failed_at: current_timestamp(),
            error_message: message.into(),
        };
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.state.duration_ms()
    }
}

/// The in-flight set, keyed by tool call id.
#[derive(Debug, Clone, Default)]
pub struct PendingTools {
    entries: HashMap<String, ToolExecution>,
}

impl PendingTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new execution. Returns `false` (and leaves the set unchanged)
    /// when the id already has an open span.
    pub fn insert(&mut self, execution: ToolExecution) -> bool {
        if self.entries.contains_key(&execution.tool_call_id) {
            return false;
        }
        self.entries
            .insert(execution.tool_call_id.clone(), execution);
        true
    }

    pub fn get(&self, tool_call_id: &str) -> Option<&ToolExecution> {
        self.entries.get(tool_call_id)
    }

    pub fn get_mut(&mut self, tool_call_id: &str) -> Option<&mut ToolExecution> {
        self.entries.get_mut(tool_call_id)
    }

    pub fn remove(&mut self, tool_call_id: &str) -> Option<ToolExecution> {
        self.entries.remove(tool_call_id)
    }

    pub fn contains(&self, tool_call_id: &str) -> bool {
        self.entries.contains_key(tool_call_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of every open entry, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn snapshot(&self) -> Vec<ToolExecution> {
        let mut all: Vec<ToolExecution> = self.entries.values().cloned().collect();
        all.sort_by(|a, b| a.tool_call_id.cmp(&b.tool_call_id));
        all
    }
}

/// Current timestamp in milliseconds.
fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_completed() {
        let mut exec = ToolExecution::new("call-1", "read_file", 1);
        assert_eq!(exec.state, ToolExecutionState::Pending);
        assert_eq!(exec.duration_ms(), None);

        exec.mark_running();
        exec.record_update();
        exec.record_update();
        assert!(matches!(
            exec.state,
            ToolExecutionState::Running { updates: 2, .. }
        ));

        exec.mark_completed("file contents");
        assert!(exec.is_terminal());
        assert!(exec.duration_ms().is_some());
    }

    #[test]
    fn test_error_from_pending() {
        let mut exec = ToolExecution::new("call-1", "run_command", 1);
        exec.mark_error("Command not allowed");
        match &exec.state {
            ToolExecutionState::Error { error_message, .. } => {
                assert_eq!(error_message, "Command not allowed")
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut exec = ToolExecution::new("call-1", "read_file", 1);
        exec.mark_running();
        exec.mark_completed("ok");
        exec.mark_error("late");
        exec.mark_running();
        assert!(matches!(exec.state, ToolExecutionState::Completed { .. }));
    }

    #[test]
    fn test_completed_preview_is_truncated() {
        let mut exec = ToolExecution::new("call-1", "read_file", 1);
        exec.mark_running();
        exec.mark_completed(&"a".repeat(500));
        match &exec.state {
            ToolExecutionState::Completed { output_preview, .. } => {
                assert_eq!(output_preview.len(), 200);
                assert!(output_preview.ends_with("..."));
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn test_pending_tools_rejects_duplicate_open_id() {
        let mut pending = PendingTools::new();
        assert!(pending.insert(ToolExecution::new("a", "read_file", 1)));
        assert!(!pending.insert(ToolExecution::new("a", "write_file", 1)));
        assert_eq!(pending.get("a").unwrap().tool_name, "read_file");

        assert!(pending.insert(ToolExecution::new("b", "glob_search", 1)));
        assert_eq!(pending.ids(), vec!["a", "b"]);

        pending.remove("a");
        assert!(pending.insert(ToolExecution::new("a", "write_file", 2)));
        pending.remove("a");
        pending.remove("b");
        assert!(pending.is_empty());
    }
}
