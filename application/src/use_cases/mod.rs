//! Use cases of the tool-execution core.
//!
//! - [`approval_gate::ApprovalGate`]: human confirmation for high-risk calls
//! - [`dispatch_tool_call::ToolCallDispatcher`]: one call from lookup to outcome
//! - [`repair_tool_call::ToolCallRepairer`]: single repair of malformed arguments
//! - [`run_turn::StreamCoordinator`]: one conversational turn

pub mod approval_gate;
pub mod dispatch_tool_call;
pub mod repair_tool_call;
pub mod run_turn;

#[cfg(test)]
pub(crate) mod test_support;
