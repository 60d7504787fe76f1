//! CLI entrypoint for warden
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use warden_application::{
    AgentEventSink, ApprovalGate, CompositeEventSink, LlmGateway, SessionContext,
    StreamCoordinator, ToolCallDispatcher, ToolCallRepairer, ToolPolicy, ToolRegistryPort,
};
use warden_domain::{Conversation, ModelInfo, StopReason, ToolCall, ToolOutcome};
use warden_infrastructure::{
    BUILTIN_ALIASES, ConfigLoader, FileConfig, JsonlEventLog, ModelScript, ScriptedLlmGateway,
    ToolRegistry,
};
use warden_presentation::{
    Cli, Command, ConsoleFormatter, ConsoleRenderer, InteractiveApproval, OutputFormat,
};

/// A second Ctrl-C within this window exits instead of cancelling.
const FORCE_EXIT_WINDOW: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command.clone() else {
        bail!("No command given. Try `warden --help`.");
    };

    info!("Starting warden");

    // === Configuration ===
    let config = ConfigLoader::load(cli.config.as_deref()).context("Invalid configuration")?;
    let working_dir = match &cli.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Cannot determine the current directory")?,
    };
    if !working_dir.is_dir() {
        bail!("Working directory {} does not exist", working_dir.display());
    }
    let policy = Arc::new(config.to_tool_policy(&working_dir));
    let interactive = cli.interactive || config.session.interactive;

    // === Dependency Injection ===
    let registry = Arc::new(ToolRegistry::builtin());

    match command {
        Command::Tools => {
            print_tools(&*registry, cli.output)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Call { tool, arguments } => {
            let session = build_session(&working_dir, policy.clone(), interactive);
            let events = build_sinks(&cli, interactive)?;
            let dispatcher = ToolCallDispatcher::new(registry, events)
                .with_model_info(config.to_model_info());
            run_call(&dispatcher, &session, &tool, arguments, cli.output).await
        }
        Command::Replay {
            script,
            input,
            max_steps,
        } => {
            let session = build_session(&working_dir, policy.clone(), interactive);
            let events = build_sinks(&cli, interactive)?;
            run_replay(ReplayRequest {
                config: &config,
                script: &script,
                input,
                max_steps,
                interactive,
                registry,
                events,
                session,
                quiet: cli.quiet,
            })
            .await
        }
    }
}

/// Logging goes to stderr, plus a non-blocking file writer when requested.
/// `RUST_LOG` overrides the `-v` level.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"), // -vvv or more
        })
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter());

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let Some(file_name) = path.file_name() else {
                bail!("--log-file {} is not a file path", path.display());
            };
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn build_session(working_dir: &Path, policy: Arc<ToolPolicy>, interactive: bool) -> SessionContext {
    let delay = policy.approval_delay;
    let session = SessionContext::new(working_dir, policy);
    if interactive {
        let gate = ApprovalGate::new(Arc::new(InteractiveApproval::stdin()))
            .with_first_prompt_delay(delay);
        session.with_approval_gate(Arc::new(gate))
    } else {
        session
    }
}

fn build_sinks(cli: &Cli, interactive: bool) -> Result<Arc<dyn AgentEventSink>> {
    let mut sinks = CompositeEventSink::new();
    if !cli.quiet && cli.output == OutputFormat::Text {
        // Spinners would redraw over the approval prompt
        let renderer = ConsoleRenderer::new()
            .with_spinners(!interactive)
            .with_verbose(cli.verbose > 0);
        sinks = sinks.with(Arc::new(renderer));
    }
    if let Some(path) = &cli.event_log {
        let log = JsonlEventLog::open(path)
            .with_context(|| format!("Cannot open event log {}", path.display()))?;
        info!(path = %path.display(), "Writing event log");
        sinks = sinks.with(Arc::new(log));
    }
    Ok(Arc::new(sinks))
}

fn print_tools(registry: &dyn ToolRegistryPort, format: OutputFormat) -> Result<()> {
    let spec = registry.tool_spec();
    match format {
        OutputFormat::Text => print!("{}", ConsoleFormatter::tool_list(spec, BUILTIN_ALIASES)),
        OutputFormat::Json => {
            let tools: Vec<serde_json::Value> = spec
                .names()
                .into_iter()
                .filter_map(|name| spec.get(name))
                .map(|def| {
                    let aliases: Vec<&str> = BUILTIN_ALIASES
                        .iter()
                        .filter(|(_, canonical)| *canonical == def.name)
                        .map(|(alias, _)| *alias)
                        .collect();
                    serde_json::json!({
                        "name": def.name,
                        "description": def.description,
                        "risk_level": def.risk_level,
                        "aliases": aliases,
                        "parameters": def.to_json_schema(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&tools)?);
        }
    }
    Ok(())
}

async fn run_call(
    dispatcher: &ToolCallDispatcher,
    session: &SessionContext,
    tool: &str,
    arguments: String,
    format: OutputFormat,
) -> Result<ExitCode> {
    let call = ToolCall::new("call-1", tool, arguments);
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        spawn_interrupt_handler(move || cancel.cancel())
    };

    if let Some(gate) = session.approval_gate() {
        gate.begin_batch();
    }
    let outcome = dispatcher.dispatch(call, session, &cancel, 1).await;
    interrupt.abort();

    match format {
        OutputFormat::Text => println!("{}", ConsoleFormatter::outcome_body(&outcome)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }

    Ok(match outcome {
        ToolOutcome::Failed(_) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

struct ReplayRequest<'a> {
    config: &'a FileConfig,
    script: &'a PathBuf,
    input: Option<String>,
    max_steps: Option<usize>,
    interactive: bool,
    registry: Arc<ToolRegistry>,
    events: Arc<dyn AgentEventSink>,
    session: SessionContext,
    quiet: bool,
}

async fn run_replay(request: ReplayRequest<'_>) -> Result<ExitCode> {
    let script = ModelScript::from_file(request.script)?;
    let base_info: ModelInfo = request.config.to_model_info();
    let gateway: Arc<dyn LlmGateway> = Arc::new(ScriptedLlmGateway::new(&script, base_info)?);

    let dispatcher = ToolCallDispatcher::new(request.registry, request.events)
        .with_repairer(Arc::new(ToolCallRepairer::new(gateway.clone())))
        .with_model_info(gateway.model_info());

    let mut params = request
        .config
        .to_execution_params()
        .with_interactive(request.interactive);
    if let Some(max) = request.max_steps {
        params = params.with_max_steps(max);
    }

    let coordinator = Arc::new(StreamCoordinator::new(
        gateway,
        Arc::new(dispatcher),
        request.session,
        params,
    ));
    let interrupt = {
        let coordinator = coordinator.clone();
        spawn_interrupt_handler(move || coordinator.cancel())
    };

    let mut conversation = match &script.system {
        Some(system) => Conversation::with_system(system.clone()),
        None => Conversation::new(),
    };
    let input = request.input.unwrap_or_else(|| script.input.clone());
    let output = coordinator.run_turn(&mut conversation, &input).await;
    interrupt.abort();

    if !request.quiet {
        println!("{}", ConsoleFormatter::turn_summary(&output));
    }

    Ok(match output.stop_reason {
        StopReason::Completed | StopReason::MaxSteps => ExitCode::SUCCESS,
        StopReason::Cancelled => ExitCode::from(130),
        StopReason::Failed(_) => ExitCode::FAILURE,
    })
}

/// First Ctrl-C runs `on_first`; another within [`FORCE_EXIT_WINDOW`] exits.
fn spawn_interrupt_handler<F>(on_first: F) -> tokio::task::JoinHandle<()>
where
    F: Fn() + Send + 'static,
{
    tokio::spawn(async move {
        let mut last: Option<Instant> = None;
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C: {}", e);
                return;
            }
            if last.is_some_and(|at| at.elapsed() < FORCE_EXIT_WINDOW) {
                eprintln!("Interrupted");
                std::process::exit(130);
            }
            eprintln!("Cancelling... (press Ctrl-C again to exit)");
            on_first();
            last = Some(Instant::now());
        }
    })
}
