//! Chunks yielded by a streaming model response.

use crate::tool::ToolCall;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// One chunk of a streaming model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelChunk {
    /// A text delta.
    Text { text: String },
    /// A complete tool call parsed from the stream.
    ToolCall(ToolCall),
    Usage(TokenUsage),
    /// End of this model step.
    Finished,
    /// The provider failed mid-stream.
    Error { message: String },
}

impl ModelChunk {
    pub fn text(text: impl Into<String>) -> Self {
        ModelChunk::Text { text: text.into() }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ModelChunk::Finished | ModelChunk::Error { .. })
    }
}
