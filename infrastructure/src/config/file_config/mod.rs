//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application types
//! ([`ToolPolicy`], [`ExecutionParams`], [`ModelInfo`]) once per session.

mod model;
mod session;
mod tools;

pub use model::FileModelConfig;
pub use session::FileSessionConfig;
pub use tools::FileToolsConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use warden_application::{ExecutionParams, ToolPolicy};
use warden_domain::ModelInfo;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("{field} cannot be 0")]
    ZeroValue { field: &'static str },

    #[error("tools.allowed_programs contains an empty program name")]
    EmptyProgramName,

    #[error("tools.interpreter.program cannot be empty")]
    EmptyInterpreter,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// `[tools]` containment and execution limits
    pub tools: FileToolsConfig,
    /// `[model]` metadata used to size budgets
    pub model: FileModelConfig,
    /// `[session]` turn loop settings
    pub session: FileSessionConfig,
}

impl FileConfig {
    /// Reject values that would make every tool call fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tools = &self.tools;
        if tools.default_timeout_ms == 0 {
            return Err(ConfigError::ZeroValue {
                field: "tools.default_timeout_ms",
            });
        }
        if tools.code_timeout_ms == 0 {
            return Err(ConfigError::ZeroValue {
                field: "tools.code_timeout_ms",
            });
        }
        if tools.max_output_bytes == 0 {
            return Err(ConfigError::ZeroValue {
                field: "tools.max_output_bytes",
            });
        }
        if tools.allowed_programs.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::EmptyProgramName);
        }
        if tools.interpreter.program.trim().is_empty() {
            return Err(ConfigError::EmptyInterpreter);
        }
        if self.session.max_steps == 0 {
            return Err(ConfigError::ZeroValue {
                field: "session.max_steps",
            });
        }
        Ok(())
    }

    pub fn to_tool_policy(&self, working_dir: &Path) -> ToolPolicy {
        self.tools.to_tool_policy(working_dir)
    }

    pub fn to_execution_params(&self) -> ExecutionParams {
        self.session.to_execution_params()
    }

    pub fn to_model_info(&self) -> ModelInfo {
        self.model.to_model_info()
    }
}
