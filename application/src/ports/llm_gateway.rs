//! LLM Gateway port
//!
//! Defines the interface for communicating with model providers: a streaming
//! call for conversational steps and a plain request/response session for
//! auxiliary work such as argument repair.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use warden_domain::{Conversation, ModelChunk, ModelInfo, ToolDefinition};

/// Errors that can occur during LLM gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Script exhausted: no response left for step {0}")]
    ScriptExhausted(usize),

    #[error("Timeout")]
    Timeout,

    #[error("Transport closed")]
    TransportClosed,

    #[error("Other error: {0}")]
    Other(String),
}

/// Handle for receiving streaming chunks from one model step.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<ModelChunk>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<ModelChunk>) -> Self {
        Self { receiver }
    }

    /// Build a handle that yields the given chunks and then closes.
    pub fn from_chunks(chunks: Vec<ModelChunk>) -> Self {
        let (tx, rx) = mpsc::channel(chunks.len().max(1));
        for chunk in chunks {
            // Capacity covers every chunk
            let _ = tx.try_send(chunk);
        }
        Self::new(rx)
    }

    /// Consume the stream and collect all text into a single string.
    pub async fn collect_text(mut self) -> Result<String, GatewayError> {
        let mut full_text = String::new();
        while let Some(chunk) = self.receiver.recv().await {
            match chunk {
                ModelChunk::Text { text } => full_text.push_str(&text),
                ModelChunk::Finished => break,
                ModelChunk::Error { message } => return Err(GatewayError::RequestFailed(message)),
                ModelChunk::ToolCall(_) | ModelChunk::Usage(_) => {}
            }
        }
        Ok(full_text)
    }
}

/// Gateway for LLM communication
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Capabilities of the model behind this gateway
    fn model_info(&self) -> ModelInfo;

    /// Start one streaming model step over the conversation so far.
    async fn stream(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<StreamHandle, GatewayError>;

    /// Open a request/response session with a system prompt.
    async fn create_session(&self, system_prompt: &str)
    -> Result<Box<dyn LlmSession>, GatewayError>;
}

/// An active LLM session
#[async_trait]
pub trait LlmSession: Send + Sync {
    /// Send a message and get a response
    async fn send(&self, content: &str) -> Result<String, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_text_stops_at_finished() {
        let handle = StreamHandle::from_chunks(vec![
            ModelChunk::text("hello "),
            ModelChunk::text("world"),
            ModelChunk::Finished,
            ModelChunk::text("ignored"),
        ]);
        assert_eq!(handle.collect_text().await.unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_collect_text_error() {
        let handle = StreamHandle::from_chunks(vec![ModelChunk::Error {
            message: "overloaded".into(),
        }]);
        assert!(matches!(
            handle.collect_text().await,
            Err(GatewayError::RequestFailed(m)) if m == "overloaded"
        ));
    }
}
