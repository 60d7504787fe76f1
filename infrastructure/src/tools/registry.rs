//! Tool Registry
//!
//! The [`ToolRegistry`] owns the executable tools and the [`ToolSpec`] that
//! describes them, and implements [`ToolRegistryPort`] for the dispatcher.
//! It is built once per session and never mutated afterwards.
//!
//! # Usage
//!
//! ```ignore
//! use warden_infrastructure::tools::ToolRegistry;
//!
//! let registry = ToolRegistry::builtin();
//! assert!(registry.tool_spec().get("read_file").is_some());
//! // Aliases resolve to the canonical tool
//! assert_eq!(registry.tool_spec().resolve("bash"), Some("run_command"));
//! ```

use super::{
    code::ExecuteCodeTool,
    command::RunCommandTool,
    file::{EditFileTool, ReadFileTool, WriteFileTool},
    search::{GlobSearchTool, GrepSearchTool},
};
use crate::sandbox::SandboxedExecutor;
use std::collections::HashMap;
use std::sync::Arc;
use warden_application::{Tool, ToolRegistryPort};
use warden_domain::ToolSpec;

/// Alternate names models commonly use for the built-in tools.
pub const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("bash", super::command::RUN_COMMAND),
    ("shell", super::command::RUN_COMMAND),
    ("cat", super::file::READ_FILE),
    ("view", super::file::READ_FILE),
    ("grep", super::search::GREP_SEARCH),
    ("rg", super::search::GREP_SEARCH),
];

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    tool_spec: ToolSpec,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            tool_spec: ToolSpec::new(),
        }
    }

    /// Registry with every built-in tool and its aliases.
    pub fn builtin() -> Self {
        let executor = SandboxedExecutor::new();
        let mut registry = Self::new()
            .register(ReadFileTool::new())
            .register(WriteFileTool::new())
            .register(EditFileTool::new())
            .register(GlobSearchTool::new())
            .register(GrepSearchTool::new())
            .register(RunCommandTool::new(executor))
            .register(ExecuteCodeTool::new(executor));
        for (alias, canonical) in BUILTIN_ALIASES {
            registry = registry.alias(*alias, *canonical);
        }
        registry
    }

    /// Register a tool. A later registration with the same name replaces
    /// the earlier one.
    pub fn register<T: Tool + 'static>(self, tool: T) -> Self {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        let definition = tool.definition().clone();
        tracing::debug!(tool = %definition.name, risk = %definition.risk_level, "Registered tool");
        self.tools.insert(definition.name.clone(), tool);
        self.tool_spec = self.tool_spec.register(definition);
        self
    }

    pub fn alias(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.tool_spec = self.tool_spec.register_alias(alias, canonical);
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistryPort for ToolRegistry {
    fn tool_spec(&self) -> &ToolSpec {
        &self.tool_spec
    }

    fn tool(&self, canonical_name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(canonical_name).cloned()
    }
}
