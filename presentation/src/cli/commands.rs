//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for `call` results and the tool list
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable, colored
    Text,
    /// JSON on stdout
    Json,
}

/// CLI arguments for warden
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(author, version, about = "Sandboxed tool execution for coding assistants")]
#[command(long_about = r#"
Warden runs the tool calls a coding assistant asks for: reading and editing
files, searching, running allow-listed shell commands and short scripts.
Every call is checked against the allowed roots and the command allow-list,
run under a timeout and trimmed to the model's token budget.

Configuration files are loaded from (lowest to highest priority):
1. ~/.config/warden/config.toml   Global config
2. ./warden.toml or ./.warden.toml   Project-level config
3. --config <path>     Explicit config file
4. WARDEN_* environment variables (e.g. WARDEN_TOOLS__PIPE_POLICY=validated)

Example:
  warden call read_file '{"path": "src/main.rs", "start_line": 1, "end_line": 20}'
  warden --interactive call run_command '{"command": "git status"}'
  warden replay session.json
  warden tools --output json
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Ask before running high-risk tools
    #[arg(short, long, global = true)]
    pub interactive: bool,

    /// Working directory (defaults to the current directory)
    #[arg(short = 'C', long, value_name = "DIR", global = true)]
    pub working_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Write every agent event as a JSON line to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub event_log: Option<PathBuf>,

    /// Also write tracing output to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Dispatch a single tool call
    Call {
        /// Tool name or alias (e.g. read_file, bash)
        tool: String,

        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
    },

    /// Drive a full turn from a scripted model response
    Replay {
        /// Path to the JSON script
        script: PathBuf,

        /// User input for the turn (overrides the script's)
        #[arg(long, value_name = "TEXT")]
        input: Option<String>,

        /// Maximum model steps (overrides config)
        #[arg(long, value_name = "N")]
        max_steps: Option<usize>,
    },

    /// List the registered tools
    Tools,
}
