//! Domain layer for warden
//!
//! Pure types and checks for the tool-execution core. The only I/O here is
//! read-only path resolution in [`security::PathGuard`].
//!
//! # Core Concepts
//!
//! ## Tools
//!
//! - [`ToolDefinition`] / [`ToolSpec`]: what the model may call, and how
//! - [`ToolCall`]: one invocation from the model stream
//! - [`ToolOutcome`]: `Ok`, `Truncated` or `Failed`; exactly one reaches the model
//!
//! ## Containment
//!
//! - [`PathGuard`]: keeps every path under the allowed roots
//! - [`CommandValidator`]: allow-list plus dangerous-pattern gate for shell text
//! - [`budget()`]: replaces oversized output with a notice
//!
//! ## Lifecycle
//!
//! - [`AgentEvent`]: the observable event stream
//! - [`PendingTools`]: the in-flight set
//! - [`SessionApproval`]: the sticky auto-accept flag

pub mod agent;
pub mod budget;
pub mod core;
pub mod security;
pub mod session;
pub mod tool;

pub use agent::{
    AgentEvent, ApprovalDecision, ApprovalMode, PendingTools, SessionApproval, StopReason,
    ToolExecution, ToolExecutionState, check_tool_call_ordering,
};
pub use budget::{
    BudgetedOutput, HeuristicTokenCounter, TokenCountError, TokenCounter, budget,
    is_truncation_notice,
};
pub use core::{error::DomainError, string::truncate};
pub use security::{
    AccessError, CommandValidator, PathGuard, PipePolicy, ShellConstruct, ValidationResult,
};
pub use session::{Conversation, Message, ModelChunk, ModelInfo, TokenUsage};
pub use tool::{
    DefaultToolValidator, ParamType, RiskLevel, SchemaError, ToolArguments, ToolCall,
    ToolDefinition, ToolOutcome, ToolParameter, ToolSpec, ToolValidator,
};
