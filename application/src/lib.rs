//! Application layer for warden
//!
//! Ports (tool, model gateway, approval, event sink) and the use cases that
//! compose the domain checks into the tool-execution pipeline:
//!
//! ```text
//! model stream ─▶ StreamCoordinator ─▶ ToolCallDispatcher ─▶ Tool::execute
//!                        │                    │                  │
//!                        │             ToolCallRepairer     ApprovalGate
//!                        ▼                    ▼
//!                   AgentEvent ◀──────── ToolOutcome (budgeted)
//! ```
//!
//! It depends only on the domain layer.

pub mod config;
pub mod context;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{
    DEFAULT_ALLOWED_PROGRAMS, ExecutionParams, InterpreterConfig, TokenLimits, ToolPolicy,
};
pub use context::{ExecutionContext, SessionContext};
pub use ports::{
    approval::{ApprovalError, ApprovalPort, AutoAcceptApproval, AutoRejectApproval},
    event_sink::{
        AgentEventSink, ChannelEventSink, CompositeEventSink, NoEvents, RecordingEventSink,
    },
    llm_gateway::{GatewayError, LlmGateway, LlmSession, StreamHandle},
    tool::{ProgressSink, Tool, ToolRegistryPort, ToolStep},
};
pub use use_cases::{
    approval_gate::ApprovalGate,
    dispatch_tool_call::{DispatchError, ToolCallDispatcher},
    repair_tool_call::{RepairCause, ToolCallRepairer},
    run_turn::{CoordinatorState, StreamCoordinator, TurnOutput},
};
