//! Tool policy: what tools may touch and how long they may run.
//!
//! [`ToolPolicy`] is loaded once per session and shared as `Arc<ToolPolicy>`.
//! Tools read it on every invocation; nothing re-reads config files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use warden_domain::PipePolicy;

/// Programs `run_command` accepts when nothing is configured.
pub const DEFAULT_ALLOWED_PROGRAMS: &[&str] =
    &["rg", "git", "ls", "cat", "head", "tail", "wc", "find", "grep"];

/// Per-tool output token ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLimits {
    pub default: usize,
    #[serde(default, flatten)]
    pub per_tool: HashMap<String, usize>,
}

impl Default for TokenLimits {
    fn default() -> Self {
        Self {
            default: 20_000,
            per_tool: HashMap::new(),
        }
    }
}

impl TokenLimits {
    pub fn for_tool(&self, tool_name: &str) -> usize {
        self.per_tool
            .get(tool_name)
            .copied()
            .unwrap_or(self.default)
    }
}

/// Interpreter used by the code-execution tool.
///
/// `{cwd}` in `args` is replaced with the working directory. The default
/// grants the interpreter read/write inside the working directory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Extension of the scratch source file
    pub extension: String,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            program: "deno".to_string(),
            args: vec![
                "run".to_string(),
                "--quiet".to_string(),
                "--no-prompt".to_string(),
                "--allow-read={cwd}".to_string(),
                "--allow-write={cwd}".to_string(),
            ],
            extension: "ts".to_string(),
        }
    }
}

impl InterpreterConfig {
    pub fn resolved_args(&self, cwd: &std::path::Path) -> Vec<String> {
        let cwd = cwd.display().to_string();
        self.args.iter().map(|a| a.replace("{cwd}", &cwd)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPolicy {
    pub allowed_programs: Vec<String>,
    /// Empty means "the working directory only".
    pub allowed_roots: Vec<PathBuf>,
    pub pipe_policy: PipePolicy,
    pub default_timeout: Duration,
    pub code_timeout: Duration,
    /// Transport-level cap per output stream, independent of the token budget.
    pub max_output_bytes: usize,
    /// Pause before the first approval prompt of a batch.
    pub approval_delay: Duration,
    pub token_limits: TokenLimits,
    pub interpreter: InterpreterConfig,
}

impl Default for ToolPolicy {
    fn default() -> Self {
        Self {
            allowed_programs: DEFAULT_ALLOWED_PROGRAMS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            allowed_roots: Vec::new(),
            pipe_policy: PipePolicy::Strict,
            default_timeout: Duration::from_millis(60_000),
            code_timeout: Duration::from_millis(10_000),
            max_output_bytes: 1024 * 1024,
            approval_delay: Duration::ZERO,
            token_limits: TokenLimits::default(),
            interpreter: InterpreterConfig::default(),
        }
    }
}

impl ToolPolicy {
    // ==================== Builder Methods ====================

    pub fn with_allowed_programs<I, S>(mut self, programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_programs = programs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allowed_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.allowed_roots = roots;
        self
    }

    pub fn with_pipe_policy(mut self, policy: PipePolicy) -> Self {
        self.pipe_policy = policy;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_code_timeout(mut self, timeout: Duration) -> Self {
        self.code_timeout = timeout;
        self
    }

    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    pub fn with_approval_delay(mut self, delay: Duration) -> Self {
        self.approval_delay = delay;
        self
    }

    pub fn with_token_limit(mut self, tool_name: impl Into<String>, limit: usize) -> Self {
        self.token_limits.per_tool.insert(tool_name.into(), limit);
        self
    }

    pub fn with_default_token_limit(mut self, limit: usize) -> Self {
        self.token_limits.default = limit;
        self
    }

    pub fn with_interpreter(mut self, interpreter: InterpreterConfig) -> Self {
        self.interpreter = interpreter;
        self
    }
}
