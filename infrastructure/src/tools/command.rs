//! Command execution tool: run_command
//!
//! Gate order: allow-list and dangerous-pattern scan, working directory,
//! argument path containment, approval, then the sandboxed run. The first
//! gate that fails ends the call and its message is what the model sees.

use crate::sandbox::{ExecOutput, ExitKind, RunOptions, SandboxedExecutor};
use crate::tools::file::display_path;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use warden_application::{ExecutionContext, ProgressSink, Tool};
use warden_domain::{ParamType, RiskLevel, ToolArguments, ToolDefinition, ToolOutcome, ToolParameter};

/// Tool name constant
pub const RUN_COMMAND: &str = "run_command";

pub struct RunCommandTool {
    definition: ToolDefinition,
    executor: SandboxedExecutor,
}

impl RunCommandTool {
    pub fn new(executor: SandboxedExecutor) -> Self {
        let definition = ToolDefinition::new(
            RUN_COMMAND,
            "Run one allowed program with arguments and return its output. Pipes, redirection, chaining and substitution are disabled.",
            RiskLevel::High,
        )
        .with_parameter(
            ToolParameter::new("command", "The command line to run", true)
                .with_type(ParamType::String),
        )
        .with_parameter(
            ToolParameter::new(
                "working_dir",
                "Directory to run in (default: project directory)",
                false,
            )
            .with_type(ParamType::Path),
        )
        .with_parameter(
            ToolParameter::new(
                "timeout_ms",
                "Timeout in milliseconds; cannot exceed the configured default",
                false,
            )
            .with_type(ParamType::Integer),
        );
        Self {
            definition,
            executor,
        }
    }
}

impl Default for RunCommandTool {
    fn default() -> Self {
        Self::new(SandboxedExecutor::new())
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn output_label(&self) -> &str {
        "command"
    }

    async fn execute(
        &self,
        args: ToolArguments,
        ctx: &ExecutionContext,
        progress: &ProgressSink,
    ) -> ToolOutcome {
        let command = match args.require_string("command") {
            Ok(c) => c,
            Err(e) => return ToolOutcome::failed(e),
        };

        if let Err(reason) = ctx.validator.validate(command).into_result() {
            debug!(command, reason = %reason, "Command rejected");
            return ToolOutcome::failed(reason);
        }

        let cwd = match args.get_string("working_dir") {
            Some(dir) => match ctx.resolve_path(dir) {
                Ok(p) if p.is_dir() => p,
                Ok(_) => return ToolOutcome::failed(format!("'{}' is not a directory", dir)),
                Err(e) => {
                    return ToolOutcome::failed(format!(
                        "Working directory must be within the project directory: {}",
                        e
                    ));
                }
            },
            None => ctx.working_dir.clone(),
        };

        if let Err(reason) = ctx
            .validator
            .check_argument_paths(command, &ctx.guard, &cwd)
            .into_result()
        {
            debug!(command, reason = %reason, "Command argument rejected");
            return ToolOutcome::failed(reason);
        }

        if let Err(rejection) = ctx.require_approval(command).await {
            return ToolOutcome::failed(rejection);
        }

        let timeout = match args.get_u64("timeout_ms") {
            Some(ms) => Duration::from_millis(ms).min(ctx.timeout),
            None => ctx.timeout,
        };
        progress
            .update(format!("Running `{}` in {}", command, display_path(&cwd, ctx)))
            .await;

        let options = RunOptions::new(cwd, timeout, ctx.cancel.clone())
            .with_max_output_bytes(ctx.policy.max_output_bytes);
        match self.executor.run_shell(command, &options).await {
            Ok(output) => command_outcome(command, timeout, output),
            Err(e) => {
                warn!(command, error = %e, "Command failed to start");
                ToolOutcome::failed(format!("Failed to execute command: {}", e))
            }
        }
    }
}

fn command_outcome(command: &str, timeout: Duration, output: ExecOutput) -> ToolOutcome {
    let combined = output.combined();
    match output.exit {
        ExitKind::Exited(0) if combined.is_empty() => {
            ToolOutcome::ok("Command completed successfully (no output)")
        }
        ExitKind::Exited(0) => ToolOutcome::ok(combined),
        // A non-zero exit is a normal result for the model to read
        ExitKind::Exited(code) => ToolOutcome::ok(format!("Command exited with code {}\n{}", code, combined)),
        ExitKind::Signaled(signal) => {
            ToolOutcome::ok(format!("Command terminated by signal {}\n{}", signal, combined))
        }
        ExitKind::TimedOut => {
            warn!(command, timeout_ms = timeout.as_millis() as u64, "Command timed out");
            ToolOutcome::failed(format!(
                "Command timed out after {}ms. The process may be waiting for input.",
                timeout.as_millis()
            ))
        }
        ExitKind::Cancelled => ToolOutcome::failed("Command cancelled"),
    }
}
