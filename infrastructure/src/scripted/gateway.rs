//! Scripted LLM Gateway implementation
//!
//! Replays a [`ModelScript`] through the [`LlmGateway`] port: each call to
//! `stream` hands out the next step's chunks, and each repair session gets
//! the next canned reply. Drives the `replay` subcommand and end-to-end
//! tests without a live provider.

use super::script::{ModelScript, ScriptError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use warden_application::{GatewayError, LlmGateway, LlmSession, StreamHandle};
use warden_domain::{Conversation, ModelChunk, ModelInfo, ToolDefinition};

pub struct ScriptedLlmGateway {
    steps: Mutex<VecDeque<Vec<ModelChunk>>>,
    repairs: Mutex<VecDeque<String>>,
    chunk_delay: Duration,
    info: ModelInfo,
    streamed: AtomicUsize,
}

impl ScriptedLlmGateway {
    pub fn new(script: &ModelScript, base_info: ModelInfo) -> Result<Self, ScriptError> {
        Ok(Self {
            steps: Mutex::new(script.model_steps()?.into()),
            repairs: Mutex::new(script.repairs.iter().cloned().collect()),
            chunk_delay: Duration::from_millis(script.chunk_delay_ms),
            info: script.model_info(base_info),
            streamed: AtomicUsize::new(0),
        })
    }

    /// Steps not yet streamed.
    pub fn remaining_steps(&self) -> usize {
        self.steps.lock().map(|s| s.len()).unwrap_or(0)
    }
}

/// Session answering one repair request with a canned reply.
struct ScriptedSession {
    reply: Option<String>,
}

#[async_trait]
impl LlmSession for ScriptedSession {
    async fn send(&self, _content: &str) -> Result<String, GatewayError> {
        self.reply
            .clone()
            .ok_or_else(|| GatewayError::Other("No repair reply left in script".to_string()))
    }
}

#[async_trait]
impl LlmGateway for ScriptedLlmGateway {
    fn model_info(&self) -> ModelInfo {
        self.info.clone()
    }

    async fn stream(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<StreamHandle, GatewayError> {
        let step = self.streamed.fetch_add(1, Ordering::SeqCst) + 1;
        let chunks = self
            .steps
            .lock()
            .map_err(|_| GatewayError::Other("script lock poisoned".to_string()))?
            .pop_front()
            .ok_or(GatewayError::ScriptExhausted(step))?;
        debug!(
            step,
            chunks = chunks.len(),
            messages = conversation.len(),
            tools = tools.len(),
            "Streaming scripted step"
        );

        if self.chunk_delay.is_zero() {
            return Ok(StreamHandle::from_chunks(chunks));
        }

        let (tx, rx) = mpsc::channel(16);
        let delay = self.chunk_delay;
        tokio::spawn(async move {
            for chunk in chunks {
                tokio::time::sleep(delay).await;
                if tx.send(chunk).await.is_err() {
                    // Receiver dropped: the turn was cancelled
                    break;
                }
            }
        });
        Ok(StreamHandle::new(rx))
    }

    async fn create_session(
        &self,
        _system_prompt: &str,
    ) -> Result<Box<dyn LlmSession>, GatewayError> {
        let reply = self
            .repairs
            .lock()
            .map_err(|_| GatewayError::Other("script lock poisoned".to_string()))?
            .pop_front();
        Ok(Box::new(ScriptedSession { reply }))
    }
}
