//! On-disk format of a model script.
//!
//! ```json
//! {
//!   "input": "find the TODOs",
//!   "model": { "context_window": 32000 },
//!   "steps": [
//!     [
//!       { "type": "text", "text": "Searching." },
//!       { "type": "tool_call", "id": "c1", "tool_name": "run_command",
//!         "arguments": { "command": "rg TODO src" } },
//!       { "type": "finished" }
//!     ],
//!     [ { "type": "text", "text": "Done." }, { "type": "finished" } ]
//!   ],
//!   "repairs": ["{\"command\": \"ls\"}"]
//! }
//! ```
//!
//! A tool call carries either `arguments` (any JSON value) or the verbatim
//! `raw_arguments` string, which may be malformed on purpose.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use warden_domain::{ModelChunk, ModelInfo, TokenUsage, ToolCall};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Failed to read script {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid script: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Tool call '{0}' has both 'arguments' and 'raw_arguments'")]
    AmbiguousArguments(String),
}

/// One chunk as written in a script file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptChunk {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        tool_name: String,
        #[serde(default)]
        arguments: Option<serde_json::Value>,
        #[serde(default)]
        raw_arguments: Option<String>,
    },
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
    Finished,
    Error {
        message: String,
    },
}

impl ScriptChunk {
    fn into_model_chunk(self) -> Result<ModelChunk, ScriptError> {
        Ok(match self {
            ScriptChunk::Text { text } => ModelChunk::Text { text },
            ScriptChunk::ToolCall {
                id,
                tool_name,
                arguments,
                raw_arguments,
            } => {
                let raw = match (arguments, raw_arguments) {
                    (Some(_), Some(_)) => return Err(ScriptError::AmbiguousArguments(id)),
                    (Some(value), None) => value.to_string(),
                    (None, Some(raw)) => raw,
                    (None, None) => "{}".to_string(),
                };
                ModelChunk::ToolCall(ToolCall::new(id, tool_name, raw))
            }
            ScriptChunk::Usage {
                input_tokens,
                output_tokens,
            } => ModelChunk::Usage(TokenUsage {
                input_tokens,
                output_tokens,
            }),
            ScriptChunk::Finished => ModelChunk::Finished,
            ScriptChunk::Error { message } => ModelChunk::Error { message },
        })
    }
}

/// Model metadata overrides carried by a script.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScriptModel {
    pub name: Option<String>,
    pub context_window: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelScript {
    /// User input that starts the turn
    pub input: String,
    pub system: Option<String>,
    pub model: ScriptModel,
    /// One chunk list per model step
    pub steps: Vec<Vec<ScriptChunk>>,
    /// Replies handed out, in order, to repair requests
    pub repairs: Vec<String>,
    /// Pause before each streamed chunk
    pub chunk_delay_ms: u64,
}

impl ModelScript {
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let json = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Steps converted to stream chunks.
    pub fn model_steps(&self) -> Result<Vec<Vec<ModelChunk>>, ScriptError> {
        self.steps
            .iter()
            .map(|step| {
                step.iter()
                    .cloned()
                    .map(ScriptChunk::into_model_chunk)
                    .collect()
            })
            .collect()
    }

    pub fn model_info(&self, base: ModelInfo) -> ModelInfo {
        let mut info = base;
        if let Some(name) = &self.model.name {
            info.name = name.clone();
        }
        if self.model.context_window.is_some() {
            info.context_window = self.model.context_window;
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let script = ModelScript::from_json(
            r#"{
                "input": "list files",
                "steps": [[
                    {"type": "text", "text": "Looking."},
                    {"type": "tool_call", "id": "c1", "tool_name": "run_command",
                     "arguments": {"command": "ls"}},
                    {"type": "tool_call", "id": "c2", "tool_name": "read_file",
                     "raw_arguments": "{\"path\": "},
                    {"type": "usage", "input_tokens": 10, "output_tokens": 5},
                    {"type": "finished"}
                ]]
            }"#,
        )
        .unwrap();
        assert_eq!(script.input, "list files");

        let steps = script.model_steps().unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].len(), 5);
        match &steps[0][1] {
            ModelChunk::ToolCall(call) => {
                assert_eq!(call.tool_name, "run_command");
                assert_eq!(call.raw_arguments, r#"{"command":"ls"}"#);
            }
            other => panic!("expected tool call, got {other:?}"),
        }
        match &steps[0][2] {
            ModelChunk::ToolCall(call) => assert_eq!(call.raw_arguments, "{\"path\": "),
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn test_ambiguous_arguments_rejected() {
        let script = ModelScript::from_json(
            r#"{"steps": [[{"type": "tool_call", "id": "c1", "tool_name": "x",
                "arguments": {}, "raw_arguments": "{}"}]]}"#,
        )
        .unwrap();
        assert!(matches!(
            script.model_steps(),
            Err(ScriptError::AmbiguousArguments(id)) if id == "c1"
        ));
    }

    #[test]
    fn test_model_overrides() {
        let script =
            ModelScript::from_json(r#"{"model": {"context_window": 4000}, "steps": []}"#).unwrap();
        let info = script.model_info(ModelInfo::default());
        assert_eq!(info.context_window, Some(4000));
        assert_eq!(info.name, "scripted");
    }
}
