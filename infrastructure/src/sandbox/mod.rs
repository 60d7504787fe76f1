//! Subprocess execution under containment.

pub mod executor;
mod process_group;

pub use executor::{ExecOutput, ExecutorError, ExitKind, RunOptions, SandboxedExecutor};
