//! Tool domain module
//!
//! Core abstractions for how a model-issued action is described, invoked and
//! resolved:
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ ToolSpec     │───▶│ ToolCall     │───▶│ ToolOutcome  │
//! │ (registry)   │    │ (raw args)   │    │ (to model)   │
//! └──────┬───────┘    └──────────────┘    └──────────────┘
//!        │
//!        ├─ aliases: "bash" → "run_command"
//!        └─ tools:   "run_command" → ToolDefinition
//! ```
//!
//! # Risk-Based Execution
//!
//! | Risk | Examples | Approval |
//! |------|----------|----------|
//! | **Low** | `read_file`, `grep_search` | Never asked |
//! | **High** | `write_file`, `run_command`, `execute_code` | Asked when a human is attached |
//!
//! # Key Types
//!
//! - [`ToolSpec`]: definitions plus alias mappings
//! - [`ToolDefinition`]: name, typed parameters, risk level
//! - [`ToolCall`]: an invocation with unparsed JSON arguments
//! - [`ToolArguments`]: arguments after schema validation
//! - [`ToolOutcome`]: `Ok`, `Truncated` or `Failed`
//! - [`ToolValidator`]: pure schema validation

pub mod entities;
pub mod traits;
pub mod value_objects;

pub use entities::{
    ParamType, RiskLevel, ToolArguments, ToolCall, ToolDefinition, ToolParameter, ToolSpec,
};
pub use traits::{DefaultToolValidator, SchemaError, ToolValidator};
pub use value_objects::ToolOutcome;
