//! Tool port
//!
//! A [`Tool`] is the executable half of a [`ToolDefinition`]. Tools report
//! through a two-phase contract: zero or more [`ToolStep::Progress`]
//! messages, then exactly one [`ToolStep::Done`]. The dispatcher consumes
//! those steps as a plain loop over a channel.

use crate::context::ExecutionContext;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use warden_domain::{ToolArguments, ToolDefinition, ToolOutcome, ToolSpec};

/// One step reported by a running tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStep {
    Progress(String),
    Done(ToolOutcome),
}

/// Sending half handed to a tool for progress messages.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<ToolStep>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::Sender<ToolStep>) -> Self {
        Self { tx }
    }

    /// A sink whose messages go nowhere.
    pub fn detached() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }

    /// Report progress. A closed receiver is ignored; the dispatcher has
    /// already moved on.
    pub async fn update(&self, message: impl Into<String>) {
        let _ = self.tx.send(ToolStep::Progress(message.into())).await;
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    /// Label used in truncation notices ("Output of {label} ...").
    fn output_label(&self) -> &str {
        &self.definition().name
    }

    /// Run the tool. Every failure is returned as [`ToolOutcome::Failed`].
    async fn execute(
        &self,
        args: ToolArguments,
        ctx: &ExecutionContext,
        progress: &ProgressSink,
    ) -> ToolOutcome;
}

/// Read-only set of registered tools, shared by the dispatcher.
pub trait ToolRegistryPort: Send + Sync {
    /// Definitions and alias mappings
    fn tool_spec(&self) -> &ToolSpec;

    /// Executable tool by canonical name
    fn tool(&self, canonical_name: &str) -> Option<Arc<dyn Tool>>;

    /// Resolve a name or alias to its tool.
    fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tool_spec()
            .resolve(name)
            .and_then(|canonical| self.tool(canonical))
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tool_spec().all().cloned().collect()
    }
}
