//! Tools configuration from TOML (`[tools]` section)
//!
//! Example configuration:
//!
//! ```toml
//! [tools]
//! allowed_programs = ["rg", "git", "ls"]
//! pipe_policy = "validated"
//! default_timeout_ms = 30000
//!
//! [tools.token_limits]
//! default = 20000
//! run_command = 8000
//!
//! [tools.interpreter]
//! program = "deno"
//! args = ["run", "--quiet", "--no-prompt", "--allow-read={cwd}", "--allow-write={cwd}"]
//! extension = "ts"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use warden_application::{DEFAULT_ALLOWED_PROGRAMS, InterpreterConfig, TokenLimits, ToolPolicy};
use warden_domain::PipePolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileToolsConfig {
    /// Programs `run_command` may start
    pub allowed_programs: Vec<String>,
    /// Directories tools may touch. Empty means the working directory;
    /// relative entries are taken from the working directory.
    pub allowed_roots: Vec<PathBuf>,
    pub pipe_policy: PipePolicy,
    pub default_timeout_ms: u64,
    pub code_timeout_ms: u64,
    /// Per-stream capture ceiling for subprocess output
    pub max_output_bytes: usize,
    pub approval_delay_ms: u64,
    pub token_limits: TokenLimits,
    pub interpreter: InterpreterConfig,
}

impl Default for FileToolsConfig {
    fn default() -> Self {
        let policy = ToolPolicy::default();
        Self {
            allowed_programs: DEFAULT_ALLOWED_PROGRAMS.iter().map(|p| p.to_string()).collect(),
            allowed_roots: Vec::new(),
            pipe_policy: policy.pipe_policy,
            default_timeout_ms: policy.default_timeout.as_millis() as u64,
            code_timeout_ms: policy.code_timeout.as_millis() as u64,
            max_output_bytes: policy.max_output_bytes,
            approval_delay_ms: policy.approval_delay.as_millis() as u64,
            token_limits: policy.token_limits,
            interpreter: policy.interpreter,
        }
    }
}

impl FileToolsConfig {
    pub fn to_tool_policy(&self, working_dir: &Path) -> ToolPolicy {
        let roots = self
            .allowed_roots
            .iter()
            .map(|root| {
                if root.is_absolute() {
                    root.clone()
                } else {
                    working_dir.join(root)
                }
            })
            .collect();

        ToolPolicy {
            allowed_programs: self.allowed_programs.clone(),
            allowed_roots: roots,
            pipe_policy: self.pipe_policy,
            default_timeout: Duration::from_millis(self.default_timeout_ms),
            code_timeout: Duration::from_millis(self.code_timeout_ms),
            max_output_bytes: self.max_output_bytes,
            approval_delay: Duration::from_millis(self.approval_delay_ms),
            token_limits: self.token_limits.clone(),
            interpreter: self.interpreter.clone(),
        }
    }
}
