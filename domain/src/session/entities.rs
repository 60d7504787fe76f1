//! Conversation history exchanged with the model layer.

use crate::tool::ToolCall;
use serde::{Deserialize, Serialize};

/// A message in a conversation (Entity)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// A tool outcome folded back into the conversation.
    Tool {
        tool_call_id: String,
        tool_name: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool_result(
        call: &ToolCall,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Message::Tool {
            tool_call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            content: content.into(),
            is_error,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }
}

/// Ordered message history for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Model capabilities used to size budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    /// Context window in tokens, when known.
    #[serde(default)]
    pub context_window: Option<usize>,
    #[serde(default = "default_true")]
    pub supports_tool_calling: bool,
    #[serde(default)]
    pub supports_reasoning: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            name: "scripted".to_string(),
            context_window: None,
            supports_tool_calling: true,
            supports_reasoning: false,
        }
    }
}

impl ModelInfo {
    /// Largest tool output allowed into this model's context:
    /// a quarter of the window, capped by `tool_ceiling`.
    pub fn output_token_limit(&self, tool_ceiling: usize) -> usize {
        match self.context_window {
            Some(window) => tool_ceiling.min(window / 4),
            None => tool_ceiling,
        }
    }
}
