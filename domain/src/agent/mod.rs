//! Turn lifecycle: observable events, approval state and in-flight tool
//! executions.

pub mod approval;
pub mod events;
pub mod tool_execution;

pub use approval::{ApprovalDecision, ApprovalMode, SessionApproval};
pub use events::{AgentEvent, StopReason, check_tool_call_ordering};
pub use tool_execution::{PendingTools, ToolExecution, ToolExecutionState};
