//! Containment checks applied before any tool touches the filesystem or
//! process table.

pub mod command_validator;
pub mod path_guard;

pub use command_validator::{
    CommandValidator, DANGEROUS_PATTERNS, FIND_ACTIONS, PipePolicy, ShellConstruct, ValidationResult,
    is_path_like,
};
pub use path_guard::{AccessError, PathGuard, normalize_path};
