//! Built-in tools
//!
//! Concrete [`Tool`](warden_application::Tool) implementations that touch
//! the local filesystem and process table. All of them route path
//! arguments through the session's `PathGuard`; `run_command` additionally
//! goes through the `CommandValidator`, and the two process tools run
//! under the [`SandboxedExecutor`](crate::sandbox::SandboxedExecutor).

pub mod code;
pub mod command;
pub mod file;
pub mod search;

mod registry;
#[cfg(test)]
mod test_support;

pub use code::ExecuteCodeTool;
pub use command::RunCommandTool;
pub use file::{EditFileTool, ReadFileTool, WriteFileTool};
pub use registry::{BUILTIN_ALIASES, ToolRegistry};
pub use search::{GlobSearchTool, GrepSearchTool};
