//! Search tools: glob_search, grep_search
//!
//! Both walk the filesystem on a blocking thread and drop any match whose
//! real path falls outside the allowed roots (e.g. through a symlink).

use crate::tools::file::display_path;
use async_trait::async_trait;
use glob::{MatchOptions, Pattern, glob_with};
use regex::RegexBuilder;
use std::path::{Component, Path, PathBuf};
use tokio_util::sync::CancellationToken;
use warden_application::{ExecutionContext, ProgressSink, Tool};
use warden_domain::{
    ParamType, PathGuard, RiskLevel, ToolArguments, ToolDefinition, ToolOutcome, ToolParameter,
};

/// Tool name constants
pub const GLOB_SEARCH: &str = "glob_search";
pub const GREP_SEARCH: &str = "grep_search";

/// Maximum number of results to return
const MAX_RESULTS: usize = 1000;

/// Maximum file size for grep (5 MB)
const MAX_GREP_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Longest matched line echoed back
const MAX_LINE_LEN: usize = 500;

fn result_limit(args: &ToolArguments) -> usize {
    args.get_u64("max_results")
        .map(|n| n as usize)
        .unwrap_or(MAX_RESULTS)
        .clamp(1, MAX_RESULTS)
}

/// Resolve an optional directory argument, defaulting to the working directory.
fn base_dir(args: &ToolArguments, key: &str, ctx: &ExecutionContext) -> Result<PathBuf, String> {
    match args.get_string(key) {
        Some(requested) => ctx.resolve_path(requested),
        None => Ok(ctx.working_dir.clone()),
    }
}

/// Keep glob patterns relative and below the base directory.
fn check_pattern(pattern: &str) -> Result<(), String> {
    let path = Path::new(pattern);
    if path.is_absolute() || pattern.starts_with('~') {
        return Err(format!(
            "Glob pattern must be relative to the base directory: {}",
            pattern
        ));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(format!("Glob pattern must not contain '..': {}", pattern));
    }
    Ok(())
}

fn is_contained(guard: &PathGuard, path: &Path) -> bool {
    path.canonicalize()
        .map(|real| guard.is_within_roots(&real))
        .unwrap_or(false)
}

// ==================== glob_search ====================

pub struct GlobSearchTool {
    definition: ToolDefinition,
}

impl GlobSearchTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            GLOB_SEARCH,
            "Find files matching a glob pattern (e.g., '**/*.rs', 'src/*.txt')",
            RiskLevel::Low,
        )
        .with_parameter(
            ToolParameter::new("pattern", "Glob pattern to match files", true)
                .with_type(ParamType::String),
        )
        .with_parameter(
            ToolParameter::new(
                "base_dir",
                "Directory to search from (default: working directory)",
                false,
            )
            .with_type(ParamType::Path),
        )
        .with_parameter(
            ToolParameter::new(
                "max_results",
                "Maximum number of results to return (default: 1000)",
                false,
            )
            .with_type(ParamType::Integer),
        );
        Self { definition }
    }
}

impl Default for GlobSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GlobSearchTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        args: ToolArguments,
        ctx: &ExecutionContext,
        _progress: &ProgressSink,
    ) -> ToolOutcome {
        let pattern = match args.require_string("pattern") {
            Ok(p) => p.to_string(),
            Err(e) => return ToolOutcome::failed(e),
        };
        if let Err(e) = check_pattern(&pattern) {
            return ToolOutcome::failed(e);
        }
        let base = match base_dir(&args, "base_dir", ctx) {
            Ok(b) => b,
            Err(e) => return ToolOutcome::failed(e),
        };
        let max_results = result_limit(&args);
        let guard = ctx.guard.clone();
        let cancel = ctx.cancel.clone();

        let full_pattern = format!("{}/{}", Pattern::escape(&base.display().to_string()), pattern);
        let walk = tokio::task::spawn_blocking(move || {
            glob_paths(&full_pattern, &guard, max_results, &cancel)
        });
        let (paths, limited) = match walk.await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => return ToolOutcome::failed(e),
            Err(e) => return ToolOutcome::failed(format!("Search failed: {}", e)),
        };

        if paths.is_empty() {
            return ToolOutcome::ok("No files found matching the pattern");
        }
        let mut output = paths
            .iter()
            .map(|p| display_path(p, ctx))
            .collect::<Vec<_>>()
            .join("\n");
        if limited {
            output.push_str(&format!("\n... (limited to {} results)", max_results));
        }
        ToolOutcome::ok(output)
    }
}

fn glob_paths(
    full_pattern: &str,
    guard: &PathGuard,
    max_results: usize,
    cancel: &CancellationToken,
) -> Result<(Vec<PathBuf>, bool), String> {
    let entries = glob_with(full_pattern, MatchOptions::new())
        .map_err(|e| format!("Invalid glob pattern: {}", e))?;

    let mut results = Vec::new();
    for path in entries.flatten() {
        if cancel.is_cancelled() {
            break;
        }
        if !is_contained(guard, &path) {
            continue;
        }
        if results.len() >= max_results {
            return Ok((results, true));
        }
        results.push(path);
    }
    Ok((results, false))
}

// ==================== grep_search ====================

pub struct GrepSearchTool {
    definition: ToolDefinition,
}

impl GrepSearchTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            GREP_SEARCH,
            "Search file contents for a regex pattern. Returns path:line: text for each match.",
            RiskLevel::Low,
        )
        .with_parameter(
            ToolParameter::new("pattern", "Regex pattern to search for", true)
                .with_type(ParamType::String),
        )
        .with_parameter(
            ToolParameter::new(
                "path",
                "File or directory to search in (default: working directory)",
                false,
            )
            .with_type(ParamType::Path),
        )
        .with_parameter(
            ToolParameter::new(
                "file_pattern",
                "Glob pattern to filter files (e.g., '*.rs')",
                false,
            )
            .with_type(ParamType::String),
        )
        .with_parameter(
            ToolParameter::new("case_insensitive", "Perform case-insensitive search", false)
                .with_type(ParamType::Boolean),
        )
        .with_parameter(
            ToolParameter::new(
                "max_results",
                "Maximum number of matches to return (default: 1000)",
                false,
            )
            .with_type(ParamType::Integer),
        );
        Self { definition }
    }
}

impl Default for GrepSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

struct GrepRequest {
    root: PathBuf,
    working_dir: PathBuf,
    regex: regex::Regex,
    file_pattern: Option<Pattern>,
    max_results: usize,
}

#[async_trait]
impl Tool for GrepSearchTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        args: ToolArguments,
        ctx: &ExecutionContext,
        progress: &ProgressSink,
    ) -> ToolOutcome {
        let pattern = match args.require_string("pattern") {
            Ok(p) => p,
            Err(e) => return ToolOutcome::failed(e),
        };
        let regex = match RegexBuilder::new(pattern)
            .case_insensitive(args.get_bool("case_insensitive").unwrap_or(false))
            .build()
        {
            Ok(r) => r,
            Err(e) => return ToolOutcome::failed(format!("Invalid regex pattern: {}", e)),
        };
        let file_pattern = match args.get_string("file_pattern").map(Pattern::new).transpose() {
            Ok(p) => p,
            Err(e) => return ToolOutcome::failed(format!("Invalid file pattern: {}", e)),
        };
        let root = match base_dir(&args, "path", ctx) {
            Ok(r) => r,
            Err(e) => return ToolOutcome::failed(e),
        };
        if !root.exists() {
            return ToolOutcome::failed(format!(
                "Path not found: {}",
                args.get_string("path").unwrap_or(".")
            ));
        }

        let request = GrepRequest {
            root,
            working_dir: ctx.working_dir.clone(),
            regex,
            file_pattern,
            max_results: result_limit(&args),
        };
        let max_results = request.max_results;
        progress
            .update(format!("Searching {} for /{}/", display_path(&request.root, ctx), pattern))
            .await;

        let guard = ctx.guard.clone();
        let cancel = ctx.cancel.clone();
        let search = tokio::task::spawn_blocking(move || grep(&request, &guard, &cancel));
        let (matches, limited) = match search.await {
            Ok(found) => found,
            Err(e) => return ToolOutcome::failed(format!("Search failed: {}", e)),
        };

        if matches.is_empty() {
            return ToolOutcome::ok("No matches found");
        }
        let mut output = matches.join("\n");
        if limited {
            output.push_str(&format!("\n... (limited to {} matches)", max_results));
        }
        ToolOutcome::ok(output)
    }
}

fn grep(request: &GrepRequest, guard: &PathGuard, cancel: &CancellationToken) -> (Vec<String>, bool) {
    let files = if request.root.is_file() {
        vec![request.root.clone()]
    } else {
        collect_files(&request.root, request.file_pattern.as_ref())
    };

    let mut results = Vec::new();
    for file in files {
        if cancel.is_cancelled() {
            break;
        }
        if !is_contained(guard, &file) {
            continue;
        }
        if std::fs::metadata(&file).map(|m| m.len() > MAX_GREP_FILE_SIZE).unwrap_or(true) {
            continue;
        }
        // Binary or unreadable files are skipped
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let shown = file
            .strip_prefix(&request.working_dir)
            .unwrap_or(&file)
            .display()
            .to_string();
        for (line_num, line) in content.lines().enumerate() {
            if !request.regex.is_match(line) {
                continue;
            }
            if results.len() >= request.max_results {
                return (results, true);
            }
            results.push(format!(
                "{}:{}: {}",
                shown,
                line_num + 1,
                warden_domain::truncate(line, MAX_LINE_LEN)
            ));
        }
    }
    (results, false)
}

/// Files under `dir`, sorted, optionally filtered by a file-name glob.
fn collect_files(dir: &Path, file_pattern: Option<&Pattern>) -> Vec<PathBuf> {
    let full_pattern = format!("{}/**/*", Pattern::escape(&dir.display().to_string()));
    let Ok(entries) = glob_with(&full_pattern, MatchOptions::new()) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .filter(|p| p.is_file())
        .filter(|p| match file_pattern {
            Some(pattern) => p
                .file_name()
                .map(|name| pattern.matches(&name.to_string_lossy()))
                .unwrap_or(false),
            None => true,
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{args, session};
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "// TODO: tidy\nfn main() {}\n").unwrap();
        fs::write(dir.path().join("src/nested/mod.rs"), "fn helper() {}\n// todo lower\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "TODO in notes\n").unwrap();
        dir
    }

    async fn run(tool: &dyn Tool, ctx: &ExecutionContext, value: serde_json::Value) -> ToolOutcome {
        tool.execute(args(value), ctx, &ProgressSink::detached()).await
    }

    #[tokio::test]
    async fn test_glob_search_recursive() {
        let dir = fixture();
        let ctx = session(dir.path()).for_call("t", Default::default());

        let outcome = run(&GlobSearchTool::new(), &ctx, json!({"pattern": "**/*.rs"})).await;
        let text = outcome.model_text();
        assert!(text.contains("src/lib.rs"), "{text}");
        assert!(text.contains("src/nested/mod.rs"));
        assert!(!text.contains("notes.txt"));
    }

    #[tokio::test]
    async fn test_glob_search_limit() {
        let dir = fixture();
        let ctx = session(dir.path()).for_call("t", Default::default());

        let outcome = run(
            &GlobSearchTool::new(),
            &ctx,
            json!({"pattern": "**/*.rs", "max_results": 1}),
        )
        .await;
        assert!(outcome.model_text().contains("(limited to 1 results)"));
    }

    #[tokio::test]
    async fn test_glob_search_rejects_escaping_patterns() {
        let dir = fixture();
        let ctx = session(dir.path()).for_call("t", Default::default());

        for pattern in ["/etc/*", "../*", "src/../../*", "~/.ssh/*"] {
            let outcome = run(&GlobSearchTool::new(), &ctx, json!({"pattern": pattern})).await;
            assert!(outcome.is_failure(), "{pattern} should be rejected");
        }
        let outcome = run(
            &GlobSearchTool::new(),
            &ctx,
            json!({"pattern": "*", "base_dir": "/etc"}),
        )
        .await;
        assert!(outcome.model_text().contains("resolves outside the project directory"));
    }

    #[tokio::test]
    async fn test_glob_search_no_results() {
        let dir = fixture();
        let ctx = session(dir.path()).for_call("t", Default::default());

        let outcome = run(&GlobSearchTool::new(), &ctx, json!({"pattern": "*.py"})).await;
        assert_eq!(outcome, ToolOutcome::ok("No files found matching the pattern"));
    }

    #[tokio::test]
    async fn test_grep_search_basic() {
        let dir = fixture();
        let ctx = session(dir.path()).for_call("t", Default::default());

        let outcome = run(&GrepSearchTool::new(), &ctx, json!({"pattern": "TODO", "path": "src"})).await;
        assert_eq!(outcome, ToolOutcome::ok("src/lib.rs:1: // TODO: tidy"));
    }

    #[tokio::test]
    async fn test_grep_search_case_insensitive_and_filter() {
        let dir = fixture();
        let ctx = session(dir.path()).for_call("t", Default::default());

        let outcome = run(
            &GrepSearchTool::new(),
            &ctx,
            json!({"pattern": "todo", "case_insensitive": true, "file_pattern": "*.rs"}),
        )
        .await;
        let text = outcome.model_text();
        assert!(text.contains("src/lib.rs:1:"));
        assert!(text.contains("src/nested/mod.rs:2:"));
        assert!(!text.contains("notes.txt"));
    }

    #[tokio::test]
    async fn test_grep_search_invalid_regex() {
        let dir = fixture();
        let ctx = session(dir.path()).for_call("t", Default::default());

        let outcome = run(&GrepSearchTool::new(), &ctx, json!({"pattern": "(unclosed"})).await;
        assert!(outcome.model_text().starts_with("Invalid regex pattern"));
    }

    #[tokio::test]
    async fn test_grep_search_cap() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("many.txt"), "hit\n".repeat(50)).unwrap();
        let ctx = session(dir.path()).for_call("t", Default::default());

        let outcome = run(
            &GrepSearchTool::new(),
            &ctx,
            json!({"pattern": "hit", "max_results": 10}),
        )
        .await;
        let text = outcome.model_text();
        assert_eq!(text.lines().filter(|l| l.starts_with("many.txt:")).count(), 10);
        assert!(text.ends_with("... (limited to 10 matches)"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_grep_skips_symlinked_files_outside_root() {
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "TODO secret\n").unwrap();
        let dir = fixture();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("link.txt"))
            .unwrap();
        let ctx = session(dir.path()).for_call("t", Default::default());

        let outcome = run(&GrepSearchTool::new(), &ctx, json!({"pattern": "secret"})).await;
        assert_eq!(outcome, ToolOutcome::ok("No matches found"));
    }
}
