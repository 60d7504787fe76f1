//! ToolCallRepairer: one attempt to fix malformed tool arguments.
//!
//! An auxiliary (usually cheaper) model gets the tool's JSON schema and the
//! arguments that failed validation, and answers with a corrected argument
//! object. The repaired call keeps the original id and tool name.

use crate::ports::llm_gateway::LlmGateway;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use warden_domain::{SchemaError, ToolCall, ToolDefinition};

const REPAIR_SYSTEM_PROMPT: &str = "You fix malformed tool-call arguments. \
Reply with a single JSON object that satisfies the given schema and nothing else.";

/// Why a call needs repair.
#[derive(Debug, Clone, Copy)]
pub enum RepairCause<'a> {
    /// The tool name does not exist; nothing to repair.
    NoSuchTool,
    InvalidArguments {
        definition: &'a ToolDefinition,
        error: &'a SchemaError,
    },
}

pub struct ToolCallRepairer {
    gateway: Arc<dyn LlmGateway>,
}

impl ToolCallRepairer {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }

    /// Ask the auxiliary model for corrected arguments.
    ///
    /// Returns `None` for unknown tools, on cancellation, or when the model
    /// reply holds no JSON object. The caller validates the result and does
    /// not ask again.
    pub async fn repair(
        &self,
        call: &ToolCall,
        cause: RepairCause<'_>,
        cancel: &CancellationToken,
    ) -> Option<ToolCall> {
        let (definition, error) = match cause {
            RepairCause::NoSuchTool => return None,
            RepairCause::InvalidArguments { definition, error } => (definition, error),
        };

        let prompt = build_repair_prompt(call, definition, error);
        let request = async {
            let session = self.gateway.create_session(REPAIR_SYSTEM_PROMPT).await?;
            session.send(&prompt).await
        };

        let reply = tokio::select! {
            reply = request => reply,
            _ = cancel.cancelled() => {
                debug!(tool_call_id = %call.id, "Repair abandoned on cancel");
                return None;
            }
        };

        match reply {
            Ok(text) => match extract_json_object(&text) {
                Some(arguments) => {
                    debug!(tool_call_id = %call.id, tool = %call.tool_name, "Repaired arguments");
                    Some(call.with_raw_arguments(arguments))
                }
                None => {
                    warn!(tool_call_id = %call.id, "Repair reply contained no JSON object");
                    None
                }
            },
            Err(e) => {
                warn!(tool_call_id = %call.id, error = %e, "Repair request failed");
                None
            }
        }
    }
}

fn build_repair_prompt(call: &ToolCall, definition: &ToolDefinition, error: &SchemaError) -> String {
    let schema = serde_json::to_string_pretty(&definition.to_json_schema())
        .unwrap_or_else(|_| definition.to_json_schema().to_string());
    format!(
        "Tool: {}\n\nParameter schema:\n{}\n\nArguments received:\n{}\n\nValidation error: {}\n\n\
         Return the corrected arguments as one JSON object.",
        definition.name, schema, call.raw_arguments, error
    )
}

/// First balanced `{...}` object in `text` that parses as JSON, re-serialized.
pub fn extract_json_object(text: &str) -> Option<String> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = matching_brace(&text[start..]) {
            let candidate = &text[start..start + end + 1];
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate)
                && value.is_object()
            {
                return Some(value.to_string());
            }
        }
        search_from = start + 1;
    }
    None
}

/// Index of the brace closing the one at position 0, honouring strings.
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::llm_gateway::{GatewayError, LlmSession, StreamHandle};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use warden_domain::{
        Conversation, DefaultToolValidator, ModelInfo, ParamType, RiskLevel, ToolParameter,
        ToolValidator,
    };

    struct CannedGateway {
        reply: Result<String, String>,
        delay: Duration,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    struct CannedSession {
        reply: Result<String, String>,
        delay: Duration,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl LlmSession for CannedSession {
        async fn send(&self, content: &str) -> Result<String, GatewayError> {
            self.prompts.lock().unwrap().push(content.to_string());
            tokio::time::sleep(self.delay).await;
            self.reply.clone().map_err(GatewayError::RequestFailed)
        }
    }

    #[async_trait]
    impl LlmGateway for CannedGateway {
        fn model_info(&self) -> ModelInfo {
            ModelInfo::default()
        }

        async fn stream(
            &self,
            _conversation: &Conversation,
            _tools: &[ToolDefinition],
        ) -> Result<StreamHandle, GatewayError> {
            Err(GatewayError::Other("not used".into()))
        }

        async fn create_session(
            &self,
            _system_prompt: &str,
        ) -> Result<Box<dyn LlmSession>, GatewayError> {
            Ok(Box::new(CannedSession {
                reply: self.reply.clone(),
                delay: self.delay,
                prompts: self.prompts.clone(),
            }))
        }
    }

    fn repairer(reply: Result<&str, &str>, delay: Duration) -> (ToolCallRepairer, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let gateway = CannedGateway {
            reply: reply.map(str::to_string).map_err(str::to_string),
            delay,
            prompts: prompts.clone(),
        };
        (ToolCallRepairer::new(Arc::new(gateway)), prompts)
    }

    fn read_file() -> ToolDefinition {
        ToolDefinition::new("read_file", "Read a file", RiskLevel::Low).with_parameter(
            ToolParameter::new("path", "File to read", true).with_type(ParamType::Path),
        )
    }

    fn invalid<'a>(definition: &'a ToolDefinition, error: &'a SchemaError) -> RepairCause<'a> {
        RepairCause::InvalidArguments { definition, error }
    }

    fn schema_error(call: &ToolCall) -> SchemaError {
        DefaultToolValidator
            .validate(call, &read_file())
            .unwrap_err()
    }

    #[tokio::test]
    async fn test_repairs_arguments_keeping_id() {
        let (repairer, prompts) = repairer(
            Ok("Here you go:\n```json\n{\"path\": \"src/main.rs\"}\n```"),
            Duration::ZERO,
        );
        let call = ToolCall::new("call-7", "read_file", r#"{"file": "src/main.rs"}"#);
        let error = schema_error(&call);
        let definition = read_file();

        let repaired = repairer
            .repair(&call, invalid(&definition, &error), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(repaired.id, "call-7");
        assert_eq!(repaired.tool_name, "read_file");
        assert!(DefaultToolValidator.validate(&repaired, &definition).is_ok());

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("\"file\""));
        assert!(prompts[0].contains("\"path\""));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_repaired() {
        let (repairer, prompts) = repairer(Ok("{}"), Duration::ZERO);
        let call = ToolCall::new("c1", "nope", "{}");
        let result = repairer
            .repair(&call, RepairCause::NoSuchTool, &CancellationToken::new())
            .await;
        assert!(result.is_none());
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reply_without_json() {
        let (repairer, _) = repairer(Ok("I cannot help with that."), Duration::ZERO);
        let call = ToolCall::new("c1", "read_file", "{");
        let error = schema_error(&call);
        let definition = read_file();
        let result = repairer
            .repair(&call, invalid(&definition, &error), &CancellationToken::new())
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_gateway_failure() {
        let (repairer, _) = repairer(Err("overloaded"), Duration::ZERO);
        let call = ToolCall::new("c1", "read_file", "{}");
        let error = schema_error(&call);
        let definition = read_file();
        let result = repairer
            .repair(&call, invalid(&definition, &error), &CancellationToken::new())
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_cancel_abandons_repair() {
        let (repairer, _) = repairer(Ok("{\"path\":\"a\"}"), Duration::from_secs(30));
        let call = ToolCall::new("c1", "read_file", "{}");
        let error = schema_error(&call);
        let definition = read_file();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = repairer
            .repair(&call, invalid(&definition, &error), &cancel)
            .await;
        assert!(result.is_none());
    }

    #[test]
    fn test_extract_json_object() {
        assert_eq!(
            extract_json_object(r#"noise {"a": "}"} tail"#).as_deref(),
            Some(r#"{"a":"}"}"#)
        );
        assert_eq!(
            extract_json_object(r#"{bad} then {"ok": {"nested": 1}}"#).as_deref(),
            Some(r#"{"ok":{"nested":1}}"#)
        );
        assert_eq!(extract_json_object("no json"), None);
        assert_eq!(extract_json_object("[1, 2]"), None);
    }
}
