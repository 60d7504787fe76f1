//! Presentation layer for warden
//!
//! This crate contains the CLI definition, the terminal approval prompt,
//! the console event renderer and the generic selector reducer they share.

pub mod approval;
pub mod cli;
pub mod output;
pub mod progress;
pub mod selector;

// Re-export commonly used types
pub use approval::{ApprovalChoice, InteractiveApproval};
pub use cli::commands::{Cli, Command, OutputFormat};
pub use output::console::ConsoleFormatter;
pub use progress::reporter::ConsoleRenderer;
pub use selector::{SelectorEvent, SelectorItem, SelectorState, reduce};
