//! The observable event stream of a turn.
//!
//! For any `tool_call_id` the order is `tool-call-start`, zero or more
//! `tool-call-update`, then exactly one of `tool-call-end` / `tool-call-error`.
//! Events for different ids interleave freely.

use crate::tool::ToolOutcome;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Why a turn stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    /// The model finished without requesting more tools.
    Completed,
    MaxSteps,
    Cancelled,
    /// The model stream failed.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AgentEvent {
    AgentStart,
    StepStart {
        step: usize,
    },
    MessageStart {
        step: usize,
    },
    /// A streamed text delta.
    Message {
        step: usize,
        text: String,
    },
    MessageEnd {
        step: usize,
        text: String,
    },
    ToolCallStart {
        tool_call_id: String,
        tool_name: String,
        arguments: String,
    },
    ToolCallUpdate {
        tool_call_id: String,
        message: String,
    },
    ToolCallEnd {
        tool_call_id: String,
        tool_name: String,
        outcome: ToolOutcome,
    },
    ToolCallError {
        tool_call_id: String,
        tool_name: String,
        error: String,
    },
    AgentStop {
        reason: StopReason,
    },
}

impl AgentEvent {
    /// Wire name of the variant (`tool-call-start`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::AgentStart => "agent-start",
            AgentEvent::StepStart { .. } => "step-start",
            AgentEvent::MessageStart { .. } => "message-start",
            AgentEvent::Message { .. } => "message",
            AgentEvent::MessageEnd { .. } => "message-end",
            AgentEvent::ToolCallStart { .. } => "tool-call-start",
            AgentEvent::ToolCallUpdate { .. } => "tool-call-update",
            AgentEvent::ToolCallEnd { .. } => "tool-call-end",
            AgentEvent::ToolCallError { .. } => "tool-call-error",
            AgentEvent::AgentStop { .. } => "agent-stop",
        }
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            AgentEvent::ToolCallStart { tool_call_id, .. }
            | AgentEvent::ToolCallUpdate { tool_call_id, .. }
            | AgentEvent::ToolCallEnd { tool_call_id, .. }
            | AgentEvent::ToolCallError { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }

    /// Whether this event closes a tool call span.
    pub fn closes_tool_call(&self) -> bool {
        matches!(
            self,
            AgentEvent::ToolCallEnd { .. } | AgentEvent::ToolCallError { .. }
        )
    }
}

/// Check the per-call ordering over a recorded event sequence.
///
/// Returns the first violation found. An id may be reused once its previous
/// span has closed.
pub fn check_tool_call_ordering(events: &[AgentEvent]) -> Result<(), String> {
    let mut open: HashMap<&str, usize> = HashMap::new();

    for (index, event) in events.iter().enumerate() {
        match event {
            AgentEvent::ToolCallStart { tool_call_id, .. } => {
                if open.insert(tool_call_id, index).is_some() {
                    return Err(format!(
                        "event {index}: tool-call-start for '{tool_call_id}' while already open"
                    ));
                }
            }
            AgentEvent::ToolCallUpdate { tool_call_id, .. } => {
                if !open.contains_key(tool_call_id.as_str()) {
                    return Err(format!(
                        "event {index}: tool-call-update for '{tool_call_id}' outside a span"
                    ));
                }
            }
            AgentEvent::ToolCallEnd { tool_call_id, .. }
            | AgentEvent::ToolCallError { tool_call_id, .. } => {
                if open.remove(tool_call_id.as_str()).is_none() {
                    return Err(format!(
                        "event {index}: {} for '{tool_call_id}' without a start",
                        event.kind()
                    ));
                }
            }
            AgentEvent::AgentStop { .. } if !open.is_empty() => {
                let mut ids: Vec<&str> = open.keys().copied().collect();
                ids.sort();
                return Err(format!(
                    "event {index}: agent-stop with open tool calls: {}",
                    ids.join(", ")
                ));
            }
            _ => {}
        }
    }

    Ok(())
}
