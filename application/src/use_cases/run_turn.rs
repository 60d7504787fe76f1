//! StreamCoordinator: drives one conversational turn.
//!
//! ```text
//! Idle ──▶ Streaming ──▶ Draining ──▶ (next step | Idle)
//!   ▲          │             │
//!   └──────────┴── cancel ───┘
//! ```
//!
//! Each step streams one model response. Text chunks become `message`
//! events; tool-call chunks are dispatched as soon as they arrive and run
//! concurrently with the rest of the stream. Once the stream ends the
//! coordinator drains the in-flight calls, folds every outcome back into the
//! conversation and starts the next step, until a step requests no tools or
//! the step limit is reached.
//!
//! Cancelling aborts the model stream and propagates through the shared
//! token to every running tool, which the dispatcher terminates rather than
//! awaits. A model stream error stops only the current step's calls; they are
//! still folded into the conversation before the turn fails.

use super::dispatch_tool_call::ToolCallDispatcher;
use crate::config::ExecutionParams;
use crate::context::SessionContext;
use crate::ports::event_sink::AgentEventSink;
use crate::ports::llm_gateway::{LlmGateway, StreamHandle};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use warden_domain::{
    AgentEvent, Conversation, Message, ModelChunk, StopReason, TokenUsage, ToolCall, ToolOutcome,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Streaming,
    Draining,
}

/// Result of one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutput {
    pub stop_reason: StopReason,
    /// Model steps started
    pub steps: usize,
    /// Text of the last model step
    pub final_text: String,
    pub usage: TokenUsage,
}

/// What one model step produced.
struct StepResult {
    text: String,
    calls: Vec<ToolCall>,
    outcomes: HashMap<String, ToolOutcome>,
    stream_error: Option<String>,
}

pub struct StreamCoordinator {
    gateway: Arc<dyn LlmGateway>,
    dispatcher: Arc<ToolCallDispatcher>,
    session: SessionContext,
    params: ExecutionParams,
    state: Mutex<CoordinatorState>,
    current: Mutex<Option<CancellationToken>>,
}

impl StreamCoordinator {
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        dispatcher: Arc<ToolCallDispatcher>,
        session: SessionContext,
        params: ExecutionParams,
    ) -> Self {
        Self {
            gateway,
            dispatcher,
            session,
            params,
            state: Mutex::new(CoordinatorState::Idle),
            current: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn dispatcher(&self) -> &Arc<ToolCallDispatcher> {
        &self.dispatcher
    }

    /// Whether a turn is currently running.
    pub fn is_running(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Cancel the running turn. Safe to call repeatedly or with no turn.
    pub fn cancel(&self) {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        match current.as_ref() {
            Some(token) if !token.is_cancelled() => {
                info!("Cancelling turn");
                token.cancel();
                self.set_state(CoordinatorState::Idle);
            }
            Some(_) => debug!("Turn already cancelling"),
            None => debug!("No turn to cancel"),
        }
    }

    /// Run one turn for `input`, appending everything to `conversation`.
    pub async fn run_turn(&self, conversation: &mut Conversation, input: &str) -> TurnOutput {
        let cancel = CancellationToken::new();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel.clone());

        conversation.push(Message::user(input));
        self.events().emit(&AgentEvent::AgentStart);

        let output = self.run_steps(conversation, &cancel).await;

        self.set_state(CoordinatorState::Idle);
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.events().emit(&AgentEvent::AgentStop {
            reason: output.stop_reason.clone(),
        });

        let dangling = self.dispatcher.pending_snapshot();
        if !dangling.is_empty() {
            let ids: Vec<&str> = dangling.iter().map(|e| e.tool_call_id.as_str()).collect();
            error!(ids = ?ids, "Tool calls still pending at agent-stop");
        }

        info!(
            steps = output.steps,
            reason = ?output.stop_reason,
            tokens = output.usage.total(),
            "Turn finished"
        );
        output
    }

    async fn run_steps(&self, conversation: &mut Conversation, cancel: &CancellationToken) -> TurnOutput {
        let definitions = self.dispatcher.registry().definitions();
        let mut usage = TokenUsage::default();
        let mut final_text = String::new();

        for step in 1..=self.params.max_steps {
            if cancel.is_cancelled() {
                return turn_output(StopReason::Cancelled, step - 1, final_text, usage);
            }

            self.set_state(CoordinatorState::Streaming);
            self.events().emit(&AgentEvent::StepStart { step });
            if let Some(gate) = self.session.approval_gate() {
                gate.begin_batch();
            }

            let handle = tokio::select! {
                handle = self.gateway.stream(conversation, &definitions) => handle,
                _ = cancel.cancelled() => {
                    return turn_output(StopReason::Cancelled, step, final_text, usage);
                }
            };
            let handle = match handle {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(step, error = %e, "Model stream failed to start");
                    return turn_output(StopReason::Failed(e.to_string()), step, final_text, usage);
                }
            };

            let result = self.run_step(step, handle, cancel, &mut usage).await;
            final_text = result.text.clone();

            if result.stream_error.is_none() && cancel.is_cancelled() {
                return turn_output(StopReason::Cancelled, step, final_text, usage);
            }

            let has_calls = !result.calls.is_empty();
            fold_into_conversation(conversation, result.text, result.calls, result.outcomes);

            if let Some(message) = result.stream_error {
                return turn_output(StopReason::Failed(message), step, final_text, usage);
            }
            if !has_calls {
                return turn_output(StopReason::Completed, step, final_text, usage);
            }
        }

        info!(max_steps = self.params.max_steps, "Step limit reached");
        turn_output(StopReason::MaxSteps, self.params.max_steps, final_text, usage)
    }

    /// Stream one model response, dispatching tool calls as they arrive,
    /// then drain whatever is still running.
    ///
    /// A stream error stops this step's calls through a child token; the
    /// turn token is only cancelled by the caller.
    async fn run_step(
        &self,
        step: usize,
        mut handle: StreamHandle,
        cancel: &CancellationToken,
        usage: &mut TokenUsage,
    ) -> StepResult {
        let step_cancel = cancel.child_token();
        let dispatcher = &self.dispatcher;
        let session = &self.session;
        let calls_cancel = &step_cancel;
        let launch = |call: ToolCall| async move {
            let id = call.id.clone();
            let outcome = dispatcher.dispatch(call, session, calls_cancel, step).await;
            (id, outcome)
        };

        let mut in_flight = FuturesUnordered::new();
        let mut result = StepResult {
            text: String::new(),
            calls: Vec::new(),
            outcomes: HashMap::new(),
            stream_error: None,
        };

        self.events().emit(&AgentEvent::MessageStart { step });
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some((id, outcome)) = in_flight.next(), if !in_flight.is_empty() => {
                    result.outcomes.insert(id, outcome);
                }
                chunk = handle.receiver.recv() => match chunk {
                    Some(ModelChunk::Text { text }) => {
                        result.text.push_str(&text);
                        self.events().emit(&AgentEvent::Message { step, text });
                    }
                    Some(ModelChunk::ToolCall(call)) => {
                        debug!(step, tool_call_id = %call.id, tool = %call.tool_name, "Tool call received");
                        result.calls.push(call.clone());
                        in_flight.push(launch(call));
                    }
                    Some(ModelChunk::Usage(step_usage)) => usage.add(step_usage),
                    Some(ModelChunk::Error { message }) => {
                        warn!(step, error = %message, "Model stream failed");
                        result.stream_error = Some(message);
                        step_cancel.cancel();
                        break;
                    }
                    Some(ModelChunk::Finished) | None => break,
                }
            }
        }
        // Closing the receiver aborts the producer side of the stream
        drop(handle);
        self.events().emit(&AgentEvent::MessageEnd {
            step,
            text: result.text.clone(),
        });

        // cancel() already moved the coordinator to Idle
        if !in_flight.is_empty() && !cancel.is_cancelled() {
            self.set_state(CoordinatorState::Draining);
            debug!(step, count = in_flight.len(), "Draining tool calls");
        }
        // Cancelled calls resolve promptly: the dispatcher stops waiting on them
        while let Some((id, outcome)) = in_flight.next().await {
            result.outcomes.insert(id, outcome);
        }
        result
    }

    fn events(&self) -> &Arc<dyn AgentEventSink> {
        self.dispatcher.events()
    }

    fn set_state(&self, state: CoordinatorState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

fn turn_output(stop_reason: StopReason, steps: usize, final_text: String, usage: TokenUsage) -> TurnOutput {
    TurnOutput {
        stop_reason,
        steps,
        final_text,
        usage,
    }
}

/// Append the assistant message and one tool message per call, in the
/// order the model issued them.
fn fold_into_conversation(
    conversation: &mut Conversation,
    text: String,
    calls: Vec<ToolCall>,
    mut outcomes: HashMap<String, ToolOutcome>,
) {
    conversation.push(Message::assistant(text, calls.clone()));
    for call in &calls {
        let outcome = outcomes
            .remove(&call.id)
            .unwrap_or_else(|| ToolOutcome::failed("Tool call produced no result"));
        conversation.push(Message::tool_result(
            call,
            outcome.model_text(),
            outcome.is_failure(),
        ));
    }
}
