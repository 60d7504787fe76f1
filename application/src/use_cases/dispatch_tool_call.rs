//! ToolCallDispatcher: resolve, validate, run and report one tool call.
//!
//! ```text
//! ToolCall ──▶ PendingTools.insert ──▶ tool-call-start
//!                 │
//!                 ├─ lookup (aliases) ─────── unknown ──────────────┐
//!                 ├─ schema validation ─ fail ─▶ repair once ─ fail ─┤
//!                 ├─ spawn Tool::execute                             │
//!                 │     Progress(..) ─▶ tool-call-update             │
//!                 │     Done(outcome) ─▶ budget                      │
//!                 │     panic / cancel ──────────────────────────────┤
//!                 ▼                                                  ▼
//!            tool-call-end                                   tool-call-error
//!                 └────────── PendingTools.remove ◀──────────────────┘
//! ```
//!
//! Every path ends in exactly one of `tool-call-end` / `tool-call-error`,
//! and nothing a tool does escapes as an error: the caller always gets a
//! [`ToolOutcome`].

use super::repair_tool_call::{RepairCause, ToolCallRepairer};
use crate::context::{ExecutionContext, SessionContext};
use crate::ports::event_sink::AgentEventSink;
use crate::ports::tool::{ProgressSink, Tool, ToolRegistryPort, ToolStep};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use warden_domain::{
    AgentEvent, DefaultToolValidator, HeuristicTokenCounter, ModelInfo, PendingTools, SchemaError,
    TokenCounter, ToolArguments, ToolCall, ToolDefinition, ToolExecution, ToolOutcome,
    ToolValidator, budget,
};

/// Capacity of the per-call progress channel
const PROGRESS_BUFFER: usize = 32;

/// Why a dispatch ended in `tool-call-error`.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Unknown tool '{name}'. Available tools: {available}")]
    NoSuchTool { name: String, available: String },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(#[from] SchemaError),

    #[error("Tool '{tool}' crashed: {message}")]
    Crashed { tool: String, message: String },

    #[error("Tool '{0}' finished without a result")]
    NoResult(String),

    #[error("Tool call cancelled")]
    Cancelled,

    #[error("Tool call id '{0}' is already in flight")]
    DuplicateId(String),

    /// The tool ran and reported a failure (rejection, timeout, ...).
    #[error("{0}")]
    Failed(String),
}

pub struct ToolCallDispatcher {
    registry: Arc<dyn ToolRegistryPort>,
    validator: Box<dyn ToolValidator + Send + Sync>,
    repairer: Option<Arc<ToolCallRepairer>>,
    events: Arc<dyn AgentEventSink>,
    pending: Arc<Mutex<PendingTools>>,
    counter: Arc<dyn TokenCounter>,
    model_info: ModelInfo,
}

impl ToolCallDispatcher {
    pub fn new(registry: Arc<dyn ToolRegistryPort>, events: Arc<dyn AgentEventSink>) -> Self {
        Self {
            registry,
            validator: Box::new(DefaultToolValidator),
            repairer: None,
            events,
            pending: Arc::new(Mutex::new(PendingTools::new())),
            counter: Arc::new(HeuristicTokenCounter),
            model_info: ModelInfo::default(),
        }
    }

    pub fn with_repairer(mut self, repairer: Arc<ToolCallRepairer>) -> Self {
        self.repairer = Some(repairer);
        self
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_model_info(mut self, info: ModelInfo) -> Self {
        self.model_info = info;
        self
    }

    pub fn with_validator(mut self, validator: Box<dyn ToolValidator + Send + Sync>) -> Self {
        self.validator = validator;
        self
    }

    pub fn registry(&self) -> &Arc<dyn ToolRegistryPort> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<dyn AgentEventSink> {
        &self.events
    }

    /// Read-only view of in-flight calls, sorted by id.
    pub fn pending_snapshot(&self) -> Vec<ToolExecution> {
        self.with_pending(|pending| pending.snapshot())
    }

    pub fn pending_count(&self) -> usize {
        self.with_pending(|pending| pending.len())
    }

    /// Dispatch one call and return the outcome folded back to the model.
    pub async fn dispatch(
        &self,
        call: ToolCall,
        session: &SessionContext,
        cancel: &CancellationToken,
        step: usize,
    ) -> ToolOutcome {
        let execution = ToolExecution::new(&call.id, &call.tool_name, step);
        if !self.with_pending(|pending| pending.insert(execution)) {
            let err = DispatchError::DuplicateId(call.id.clone());
            error!(tool_call_id = %call.id, "{}", err);
            return ToolOutcome::failed(err.to_string());
        }

        info!(tool_call_id = %call.id, tool = %call.tool_name, "Tool call started");
        self.events.emit(&AgentEvent::ToolCallStart {
            tool_call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            arguments: call.raw_arguments.clone(),
        });

        match self.run(&call, session, cancel).await {
            Ok(outcome) => self.finish(&call, outcome),
            Err(err) => self.fail(&call, err),
        }
    }

    async fn run(
        &self,
        call: &ToolCall,
        session: &SessionContext,
        cancel: &CancellationToken,
    ) -> Result<ToolOutcome, DispatchError> {
        let tool = self
            .registry
            .lookup(&call.tool_name)
            .ok_or_else(|| DispatchError::NoSuchTool {
                name: call.tool_name.clone(),
                available: self.registry.tool_spec().names().join(", "),
            })?;
        let definition = tool.definition().clone();

        let (call, args) = self.validate_or_repair(call, &definition, cancel).await?;

        self.with_pending(|pending| {
            if let Some(execution) = pending.get_mut(&call.id) {
                execution.mark_running();
            }
        });

        let ctx = session.for_call(&call.id, cancel.clone());
        let outcome = self.execute(&call, tool.clone(), args, ctx, cancel).await?;

        Ok(match outcome {
            ToolOutcome::Ok(text) => {
                let ceiling = session.policy().token_limits.for_tool(&definition.name);
                let limit = self.model_info.output_token_limit(ceiling);
                let budgeted = budget(tool.output_label(), text, self.counter.as_ref(), limit);
                if budgeted.was_truncated {
                    info!(
                        tool_call_id = %call.id,
                        tokens = budgeted.token_count,
                        limit = budgeted.limit,
                        "Tool output replaced by truncation notice"
                    );
                }
                budgeted.into_outcome()
            }
            other => other,
        })
    }

    async fn validate_or_repair(
        &self,
        call: &ToolCall,
        definition: &ToolDefinition,
        cancel: &CancellationToken,
    ) -> Result<(ToolCall, ToolArguments), DispatchError> {
        let error = match self.validator.validate(call, definition) {
            Ok(args) => return Ok((call.clone(), args)),
            Err(error) => error,
        };

        let Some(repairer) = &self.repairer else {
            return Err(error.into());
        };

        debug!(tool_call_id = %call.id, error = %error, "Attempting argument repair");
        let cause = RepairCause::InvalidArguments {
            definition,
            error: &error,
        };
        let Some(repaired) = repairer.repair(call, cause, cancel).await else {
            return Err(error.into());
        };

        let args = self.validator.validate(&repaired, definition)?;
        info!(tool_call_id = %call.id, "Arguments repaired");
        Ok((repaired, args))
    }

    /// Run the tool in its own task and pump its steps until `Done`.
    async fn execute(
        &self,
        call: &ToolCall,
        tool: Arc<dyn Tool>,
        args: ToolArguments,
        ctx: ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<ToolOutcome, DispatchError> {
        let (tx, mut rx) = mpsc::channel(PROGRESS_BUFFER);
        let mut task = AbortOnDrop(tokio::spawn(async move {
            let progress = ProgressSink::new(tx.clone());
            let outcome = tool.execute(args, &ctx, &progress).await;
            let _ = tx.send(ToolStep::Done(outcome)).await;
        }));

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    task.0.abort();
                    return Err(DispatchError::Cancelled);
                }
                step = rx.recv() => match step {
                    Some(ToolStep::Progress(message)) => {
                        self.with_pending(|pending| {
                            if let Some(execution) = pending.get_mut(&call.id) {
                                execution.record_update();
                            }
                        });
                        self.events.emit(&AgentEvent::ToolCallUpdate {
                            tool_call_id: call.id.clone(),
                            message,
                        });
                    }
                    Some(ToolStep::Done(outcome)) => return Ok(outcome),
                    None => {
                        // Every sender is gone without a Done: the task died
                        return Err(match (&mut task.0).await {
                            Err(join_error) if join_error.is_panic() => DispatchError::Crashed {
                                tool: call.tool_name.clone(),
                                message: panic_message(join_error.into_panic()),
                            },
                            _ => DispatchError::NoResult(call.tool_name.clone()),
                        });
                    }
                }
            }
        }
    }

    fn finish(&self, call: &ToolCall, outcome: ToolOutcome) -> ToolOutcome {
        if let ToolOutcome::Failed(reason) = outcome {
            return self.fail(call, DispatchError::Failed(reason));
        }

        let execution = self.with_pending(|pending| {
            let mut execution = pending.remove(&call.id);
            if let Some(execution) = execution.as_mut() {
                execution.mark_completed(outcome.model_text());
            }
            execution
        });
        debug!(
            tool_call_id = %call.id,
            duration_ms = execution.as_ref().and_then(ToolExecution::duration_ms),
            truncated = outcome.is_truncated(),
            "Tool call ended"
        );

        self.events.emit(&AgentEvent::ToolCallEnd {
            tool_call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            outcome: outcome.clone(),
        });
        outcome
    }

    fn fail(&self, call: &ToolCall, err: DispatchError) -> ToolOutcome {
        let message = err.to_string();
        match &err {
            DispatchError::Crashed { .. } | DispatchError::NoResult(_) => {
                error!(tool_call_id = %call.id, tool = %call.tool_name, "{}", message)
            }
            DispatchError::Failed(_) | DispatchError::Cancelled => {
                warn!(tool_call_id = %call.id, tool = %call.tool_name, "{}", message)
            }
            _ => debug!(tool_call_id = %call.id, tool = %call.tool_name, "{}", message),
        }

        self.with_pending(|pending| {
            if let Some(mut execution) = pending.remove(&call.id) {
                execution.mark_error(&message);
            }
        });

        self.events.emit(&AgentEvent::ToolCallError {
            tool_call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            error: message.clone(),
        });
        ToolOutcome::Failed(message)
    }

    fn with_pending<R>(&self, f: impl FnOnce(&mut PendingTools) -> R) -> R {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut pending)
    }
}

/// Aborts the task when the dispatch future is dropped mid-flight.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolPolicy;
    use crate::ports::approval::AutoRejectApproval;
    use crate::ports::event_sink::RecordingEventSink;
    use crate::use_cases::approval_gate::ApprovalGate;
    use crate::use_cases::test_support::{FakeRegistry, ScriptGateway};
    use std::time::Duration;
    use warden_domain::check_tool_call_ordering;

    fn setup() -> (ToolCallDispatcher, Arc<RecordingEventSink>, SessionContext) {
        let events = Arc::new(RecordingEventSink::new());
        let dispatcher = ToolCallDispatcher::new(FakeRegistry::standard(), events.clone());
        let session = SessionContext::new(std::env::temp_dir(), Arc::new(ToolPolicy::default()));
        (dispatcher, events, session)
    }

    fn call(id: &str, tool: &str, args: &str) -> ToolCall {
        ToolCall::new(id, tool, args)
    }

    #[tokio::test]
    async fn test_successful_call() {
        let (dispatcher, events, session) = setup();
        let outcome = dispatcher
            .dispatch(call("c1", "echo", r#"{"text":"hi"}"#), &session, &CancellationToken::new(), 1)
            .await;

        assert_eq!(outcome, ToolOutcome::ok("hi"));
        assert_eq!(events.kinds(), vec!["tool-call-start", "tool-call-end"]);
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_alias_resolves() {
        let (dispatcher, events, session) = setup();
        let outcome = dispatcher
            .dispatch(call("c1", "say", r#"{"text":"hi"}"#), &session, &CancellationToken::new(), 1)
            .await;
        assert_eq!(outcome, ToolOutcome::ok("hi"));
        assert_eq!(events.kinds(), vec!["tool-call-start", "tool-call-end"]);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (dispatcher, events, session) = setup();
        let outcome = dispatcher
            .dispatch(call("c1", "nope", "{}"), &session, &CancellationToken::new(), 1)
            .await;

        assert!(outcome.model_text().starts_with("Unknown tool 'nope'"));
        assert!(outcome.model_text().contains("echo"));
        assert_eq!(events.kinds(), vec!["tool-call-start", "tool-call-error"]);
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_progress_updates() {
        let (dispatcher, events, session) = setup();
        dispatcher
            .dispatch(call("c1", "progress", "{}"), &session, &CancellationToken::new(), 1)
            .await;
        assert_eq!(
            events.kinds(),
            vec!["tool-call-start", "tool-call-update", "tool-call-update", "tool-call-end"]
        );
    }

    #[tokio::test]
    async fn test_tool_failure_is_error_event() {
        let (dispatcher, events, session) = setup();
        let outcome = dispatcher
            .dispatch(call("c1", "fail", "{}"), &session, &CancellationToken::new(), 1)
            .await;
        assert_eq!(outcome, ToolOutcome::failed("it broke"));
        assert_eq!(events.kinds(), vec!["tool-call-start", "tool-call-error"]);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let (dispatcher, events, session) = setup();
        let outcome = dispatcher
            .dispatch(call("c1", "panic", "{}"), &session, &CancellationToken::new(), 1)
            .await;
        assert!(outcome.model_text().contains("crashed: tool exploded"));
        assert_eq!(dispatcher.pending_count(), 0);

        // The session carries on
        let outcome = dispatcher
            .dispatch(call("c2", "echo", r#"{"text":"still here"}"#), &session, &CancellationToken::new(), 1)
            .await;
        assert_eq!(outcome, ToolOutcome::ok("still here"));
        assert!(check_tool_call_ordering(&events.events()).is_ok());
    }

    #[tokio::test]
    async fn test_cancel_terminates_running_tool() {
        let (dispatcher, events, session) = setup();
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let outcome = dispatcher
            .dispatch(call("c1", "sleep", "{}"), &session, &cancel, 1)
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(outcome, ToolOutcome::failed("Tool call cancelled"));
        assert_eq!(events.kinds(), vec!["tool-call-start", "tool-call-error"]);
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_output_is_truncated() {
        let (dispatcher, events, session) = setup();
        let outcome = dispatcher
            .dispatch(call("c1", "big", "{}"), &session, &CancellationToken::new(), 1)
            .await;

        match &outcome {
            ToolOutcome::Truncated {
                notice,
                token_count,
                limit,
            } => {
                assert_eq!(*token_count, 100_000);
                assert_eq!(*limit, 20_000);
                assert!(notice.starts_with("Output of big (100000 tokens) exceeds maximum allowed tokens (20000)"));
            }
            other => panic!("expected truncation, got {other:?}"),
        }
        assert_eq!(events.kinds(), vec!["tool-call-start", "tool-call-end"]);
    }

    #[tokio::test]
    async fn test_model_context_window_tightens_limit() {
        let (dispatcher, _events, session) = setup();
        let dispatcher = dispatcher.with_model_info(ModelInfo {
            context_window: Some(8_000),
            ..ModelInfo::default()
        });
        let outcome = dispatcher
            .dispatch(call("c1", "big", "{}"), &session, &CancellationToken::new(), 1)
            .await;
        assert!(matches!(outcome, ToolOutcome::Truncated { limit: 2_000, .. }));
    }

    #[tokio::test]
    async fn test_schema_failure_without_repairer() {
        let (dispatcher, events, session) = setup();
        let outcome = dispatcher
            .dispatch(call("c1", "echo", r#"{"count":"seven"}"#), &session, &CancellationToken::new(), 1)
            .await;
        assert!(outcome.model_text().starts_with("Invalid arguments:"));
        assert_eq!(events.kinds(), vec!["tool-call-start", "tool-call-error"]);
    }

    #[tokio::test]
    async fn test_schema_failure_repaired_once() {
        let (dispatcher, events, session) = setup();
        let gateway = Arc::new(ScriptGateway::new(vec![]).with_repairs(vec![r#"{"count": 7, "text": "fixed"}"#]));
        let dispatcher = dispatcher.with_repairer(Arc::new(ToolCallRepairer::new(gateway.clone())));

        let outcome = dispatcher
            .dispatch(call("c1", "echo", r#"{"count":"seven","text":"fixed"}"#), &session, &CancellationToken::new(), 1)
            .await;
        assert_eq!(outcome, ToolOutcome::ok("fixed"));
        assert_eq!(gateway.repair_count(), 1);
        assert_eq!(events.kinds(), vec!["tool-call-start", "tool-call-end"]);
    }

    #[tokio::test]
    async fn test_failed_repair_is_not_retried() {
        let (dispatcher, events, session) = setup();
        let gateway = Arc::new(
            ScriptGateway::new(vec![]).with_repairs(vec![r#"{"count": "still wrong"}"#, r#"{"count": 1}"#]),
        );
        let dispatcher = dispatcher.with_repairer(Arc::new(ToolCallRepairer::new(gateway.clone())));

        let outcome = dispatcher
            .dispatch(call("c1", "echo", r#"{"count":"seven"}"#), &session, &CancellationToken::new(), 1)
            .await;
        assert!(outcome.is_failure());
        assert!(outcome.model_text().contains("count"));
        assert_eq!(gateway.repair_count(), 1);
        assert_eq!(events.kinds(), vec!["tool-call-start", "tool-call-error"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_skips_repair() {
        let (dispatcher, _events, session) = setup();
        let gateway = Arc::new(ScriptGateway::new(vec![]).with_repairs(vec!["{}"]));
        let dispatcher = dispatcher.with_repairer(Arc::new(ToolCallRepairer::new(gateway.clone())));
        dispatcher
            .dispatch(call("c1", "nope", "{}"), &session, &CancellationToken::new(), 1)
            .await;
        assert_eq!(gateway.repair_count(), 0);
    }

    #[tokio::test]
    async fn test_rejection_reaches_model_as_text() {
        let (dispatcher, events, session) = setup();
        let gate = Arc::new(ApprovalGate::new(Arc::new(AutoRejectApproval::new("not today"))));
        let session = session.with_approval_gate(gate);

        let outcome = dispatcher
            .dispatch(call("c1", "mutate", "{}"), &session, &CancellationToken::new(), 1)
            .await;
        assert_eq!(
            outcome,
            ToolOutcome::failed("User rejected the command. Reason: not today")
        );
        assert_eq!(events.kinds(), vec!["tool-call-start", "tool-call-error"]);
    }

    #[tokio::test]
    async fn test_duplicate_open_id_is_refused() {
        let (dispatcher, events, session) = setup();
        let dispatcher = Arc::new(dispatcher);
        let cancel = CancellationToken::new();

        let first = {
            let dispatcher = dispatcher.clone();
            let session = session.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                dispatcher.dispatch(call("dup", "sleep", "{}"), &session, &cancel, 1).await
            })
        };
        while dispatcher.pending_count() == 0 {
            tokio::task::yield_now().await;
        }

        let second = dispatcher
            .dispatch(call("dup", "echo", "{}"), &session, &cancel, 1)
            .await;
        assert!(second.model_text().contains("already in flight"));

        cancel.cancel();
        first.await.unwrap();
        assert_eq!(events.kinds(), vec!["tool-call-start", "tool-call-error"]);
    }

    #[tokio::test]
    async fn test_concurrent_calls_keep_per_id_order() {
        let (dispatcher, events, session) = setup();
        let cancel = CancellationToken::new();
        let calls = vec![
            call("a", "progress", "{}"),
            call("b", "echo", r#"{"text":"b"}"#),
            call("c", "fail", "{}"),
            call("d", "nope", "{}"),
            call("e", "progress", "{}"),
            call("f", "panic", "{}"),
        ];

        let outcomes = futures::future::join_all(
            calls
                .into_iter()
                .map(|c| dispatcher.dispatch(c, &session, &cancel, 1)),
        )
        .await;

        assert_eq!(outcomes.len(), 6);
        let recorded = events.events();
        assert!(check_tool_call_ordering(&recorded).is_ok());
        let starts = recorded.iter().filter(|e| e.kind() == "tool-call-start").count();
        let closes = recorded.iter().filter(|e| e.closes_tool_call()).count();
        assert_eq!((starts, closes), (6, 6));
        assert_eq!(dispatcher.pending_count(), 0);
    }
}
