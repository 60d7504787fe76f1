//! File operation tools: read_file, write_file, edit_file
//!
//! Every path argument goes through the session's [`PathGuard`] before the
//! filesystem is touched. Writes and edits are high risk and ask for
//! approval in interactive sessions.
//!
//! [`PathGuard`]: warden_domain::PathGuard

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;
use warden_application::{ExecutionContext, ProgressSink, Tool};
use warden_domain::{ParamType, RiskLevel, ToolArguments, ToolDefinition, ToolOutcome, ToolParameter};

/// Tool name constants
pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const EDIT_FILE: &str = "edit_file";

/// Maximum file size to read (10 MB)
const MAX_READ_SIZE: u64 = 10 * 1024 * 1024;

/// Shows a path relative to the working directory when possible.
pub(crate) fn display_path(path: &Path, ctx: &ExecutionContext) -> String {
    path.strip_prefix(&ctx.working_dir)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}

// ==================== read_file ====================

pub struct ReadFileTool {
    definition: ToolDefinition,
}

impl ReadFileTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            READ_FILE,
            "Read the contents of a file. Use start_line/end_line (1-based, inclusive) to read part of a large file.",
            RiskLevel::Low,
        )
        .with_parameter(
            ToolParameter::new("path", "Path to the file to read", true).with_type(ParamType::Path),
        )
        .with_parameter(
            ToolParameter::new("start_line", "First line to read (1-based)", false)
                .with_type(ParamType::Integer),
        )
        .with_parameter(
            ToolParameter::new("end_line", "Last line to read (inclusive)", false)
                .with_type(ParamType::Integer),
        );
        Self { definition }
    }
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        args: ToolArguments,
        ctx: &ExecutionContext,
        _progress: &ProgressSink,
    ) -> ToolOutcome {
        let requested = match args.require_string("path") {
            Ok(p) => p,
            Err(e) => return ToolOutcome::failed(e),
        };
        let path = match ctx.resolve_path(requested) {
            Ok(p) => p,
            Err(e) => return ToolOutcome::failed(e),
        };

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return ToolOutcome::failed(format!("File not found: {}", requested));
            }
            Err(e) => return ToolOutcome::failed(format!("Failed to get file metadata: {}", e)),
        };
        if !metadata.is_file() {
            return ToolOutcome::failed(format!("'{}' is not a file", requested));
        }
        if metadata.len() > MAX_READ_SIZE {
            return ToolOutcome::failed(format!(
                "File too large ({} bytes). Maximum size is {} bytes",
                metadata.len(),
                MAX_READ_SIZE
            ));
        }

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return ToolOutcome::failed(format!("Permission denied: {}", requested));
            }
            Err(e) => return ToolOutcome::failed(format!("Failed to read file: {}", e)),
        };

        let start = args.get_i64("start_line");
        let end = args.get_i64("end_line");
        if start.is_none() && end.is_none() {
            return ToolOutcome::ok(content);
        }

        match select_lines(&content, start, end) {
            Ok(selected) => ToolOutcome::ok(selected),
            Err(e) => ToolOutcome::failed(e),
        }
    }
}

/// Lines `start..=end` (1-based). Missing bounds mean the file's edge.
fn select_lines(content: &str, start: Option<i64>, end: Option<i64>) -> Result<String, String> {
    let lines: Vec<&str> = content.lines().collect();
    let start = start.unwrap_or(1);
    // An open range starting past the end is empty, not inverted
    let end = end.unwrap_or_else(|| start.max(lines.len() as i64));
    if start < 1 {
        return Err(format!("start_line must be at least 1 (got {})", start));
    }
    if end < start {
        return Err(format!(
            "end_line ({}) must not be before start_line ({})",
            end, start
        ));
    }
    let from = (start as usize - 1).min(lines.len());
    let to = (end as usize).min(lines.len());
    Ok(lines[from..to].join("\n"))
}

// ==================== write_file ====================

pub struct WriteFileTool {
    definition: ToolDefinition,
}

impl WriteFileTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            WRITE_FILE,
            "Write content to a file. Creates the file if it doesn't exist, or overwrites if it does.",
            RiskLevel::High,
        )
        .with_parameter(
            ToolParameter::new("path", "Path to the file to write", true).with_type(ParamType::Path),
        )
        .with_parameter(
            ToolParameter::new("content", "Content to write to the file", true)
                .with_type(ParamType::String),
        )
        .with_parameter(
            ToolParameter::new(
                "create_dirs",
                "Create parent directories if they don't exist",
                false,
            )
            .with_type(ParamType::Boolean),
        );
        Self { definition }
    }
}

impl Default for WriteFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        args: ToolArguments,
        ctx: &ExecutionContext,
        _progress: &ProgressSink,
    ) -> ToolOutcome {
        let (requested, content) = match (args.require_string("path"), args.require_string("content")) {
            (Ok(p), Ok(c)) => (p, c),
            (Err(e), _) | (_, Err(e)) => return ToolOutcome::failed(e),
        };
        let create_dirs = args.get_bool("create_dirs").unwrap_or(false);

        let path = if create_dirs {
            match ctx.guard.check_argument(requested, &ctx.working_dir) {
                Ok(p) => p,
                Err(e) => return ToolOutcome::failed(e.to_string()),
            }
        } else {
            match ctx.resolve_path(requested) {
                Ok(p) => p,
                Err(e) => return ToolOutcome::failed(e),
            }
        };

        let description = format!("write_file {} ({} bytes)", display_path(&path, ctx), content.len());
        if let Err(rejection) = ctx.require_approval(&description).await {
            return ToolOutcome::failed(rejection);
        }

        if create_dirs
            && let Some(parent) = path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return ToolOutcome::failed(format!("Failed to create parent directories: {}", e));
        }

        match tokio::fs::write(&path, content).await {
            Ok(()) => {
                debug!(path = %path.display(), bytes = content.len(), "Wrote file");
                ToolOutcome::ok(format!(
                    "Wrote {} bytes to {}",
                    content.len(),
                    display_path(&path, ctx)
                ))
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                ToolOutcome::failed(format!("Permission denied: {}", requested))
            }
            Err(e) => ToolOutcome::failed(format!("Failed to write file: {}", e)),
        }
    }
}

// ==================== edit_file ====================

pub struct EditFileTool {
    definition: ToolDefinition,
}

impl EditFileTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            EDIT_FILE,
            "Replace one exact occurrence of old_string with new_string in a file. old_string must appear exactly once; include surrounding lines to make it unique.",
            RiskLevel::High,
        )
        .with_parameter(
            ToolParameter::new("path", "Path to the file to edit", true).with_type(ParamType::Path),
        )
        .with_parameter(
            ToolParameter::new("old_string", "Exact text to replace", true)
                .with_type(ParamType::String),
        )
        .with_parameter(
            ToolParameter::new("new_string", "Replacement text", true).with_type(ParamType::String),
        );
        Self { definition }
    }
}

impl Default for EditFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        args: ToolArguments,
        ctx: &ExecutionContext,
        _progress: &ProgressSink,
    ) -> ToolOutcome {
        let requested = match args.require_string("path") {
            Ok(p) => p,
            Err(e) => return ToolOutcome::failed(e),
        };
        let (old, new) = match (args.require_string("old_string"), args.require_string("new_string")) {
            (Ok(o), Ok(n)) => (o, n),
            (Err(e), _) | (_, Err(e)) => return ToolOutcome::failed(e),
        };
        if old.is_empty() {
            return ToolOutcome::failed("old_string must not be empty");
        }

        let path = match ctx.resolve_path(requested) {
            Ok(p) => p,
            Err(e) => return ToolOutcome::failed(e),
        };
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return ToolOutcome::failed(format!("File not found: {}", requested));
            }
            Err(e) => return ToolOutcome::failed(format!("Failed to read file: {}", e)),
        };

        match content.matches(old).count() {
            0 => {
                return ToolOutcome::failed(format!("old_string not found in {}", requested));
            }
            1 => {}
            n => {
                return ToolOutcome::failed(format!(
                    "old_string appears {} times in {}; include more surrounding text to make it unique",
                    n, requested
                ));
            }
        }

        let description = format!("edit_file {}", display_path(&path, ctx));
        if let Err(rejection) = ctx.require_approval(&description).await {
            return ToolOutcome::failed(rejection);
        }

        let updated = content.replacen(old, new, 1);
        match tokio::fs::write(&path, &updated).await {
            Ok(()) => ToolOutcome::ok(format!("Edited {}", display_path(&path, ctx))),
            Err(e) => ToolOutcome::failed(format!("Failed to write file: {}", e)),
        }
    }
}
