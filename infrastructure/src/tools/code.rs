//! Code execution tool: execute_code
//!
//! Runs model-written source in a fresh interpreter process. The default
//! interpreter is restricted to reading and writing the working directory;
//! the tool never widens that.

use crate::sandbox::{ExitKind, RunOptions, SandboxedExecutor};
use async_trait::async_trait;
use tracing::warn;
use warden_application::{ExecutionContext, ProgressSink, Tool};
use warden_domain::{ParamType, RiskLevel, ToolArguments, ToolDefinition, ToolOutcome, ToolParameter};

/// Tool name constant
pub const EXECUTE_CODE: &str = "execute_code";

pub struct ExecuteCodeTool {
    definition: ToolDefinition,
    executor: SandboxedExecutor,
}

impl ExecuteCodeTool {
    pub fn new(executor: SandboxedExecutor) -> Self {
        let definition = ToolDefinition::new(
            EXECUTE_CODE,
            "Execute a short script in a sandboxed interpreter. The script may read and write files in the project directory only; network access is denied.",
            RiskLevel::High,
        )
        .with_parameter(
            ToolParameter::new("code", "Source code to execute", true).with_type(ParamType::String),
        );
        Self {
            definition,
            executor,
        }
    }
}

impl Default for ExecuteCodeTool {
    fn default() -> Self {
        Self::new(SandboxedExecutor::new())
    }
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn output_label(&self) -> &str {
        "script"
    }

    async fn execute(
        &self,
        args: ToolArguments,
        ctx: &ExecutionContext,
        progress: &ProgressSink,
    ) -> ToolOutcome {
        let code = match args.require_string("code") {
            Ok(c) if !c.trim().is_empty() => c,
            Ok(_) => return ToolOutcome::failed("Code cannot be empty"),
            Err(e) => return ToolOutcome::failed(e),
        };

        let interpreter = &ctx.policy.interpreter;
        let description = format!("{} script:\n{}", interpreter.program, code);
        if let Err(rejection) = ctx.require_approval(&description).await {
            return ToolOutcome::failed(rejection);
        }

        let timeout = ctx.policy.code_timeout;
        progress
            .update(format!("Running script with {}", interpreter.program))
            .await;
        let options = RunOptions::new(&ctx.working_dir, timeout, ctx.cancel.clone())
            .with_max_output_bytes(ctx.policy.max_output_bytes);

        let output = match self.executor.run_script(code, interpreter, &options).await {
            Ok(output) => output,
            Err(e) => {
                warn!(interpreter = %interpreter.program, error = %e, "Script failed to start");
                return ToolOutcome::failed(format!("Failed to execute script: {}", e));
            }
        };

        let combined = output.combined();
        match output.exit {
            ExitKind::Exited(0) if combined.is_empty() => {
                ToolOutcome::ok("Script completed successfully (no output)")
            }
            ExitKind::Exited(0) => ToolOutcome::ok(combined),
            ExitKind::Exited(code) => {
                ToolOutcome::ok(format!("Script exited with code {}\n{}", code, combined))
            }
            ExitKind::Signaled(signal) => {
                ToolOutcome::ok(format!("Script terminated by signal {}\n{}", signal, combined))
            }
            ExitKind::TimedOut => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Script timed out");
                ToolOutcome::failed(format!(
                    "Script timed out after {}ms and was terminated.",
                    timeout.as_millis()
                ))
            }
            ExitKind::Cancelled => ToolOutcome::failed("Script cancelled"),
        }
    }
}
