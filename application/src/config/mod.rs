//! Application-level configuration.
//!
//! - [`ToolPolicy`]: allow-lists, roots, timeouts and output ceilings
//! - [`ExecutionParams`]: turn loop control

pub mod execution_params;
pub mod tool_policy;

pub use execution_params::ExecutionParams;
pub use tool_policy::{DEFAULT_ALLOWED_PROGRAMS, InterpreterConfig, TokenLimits, ToolPolicy};
