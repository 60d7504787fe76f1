//! Infrastructure layer for warden
//!
//! Adapters behind the application ports:
//!
//! - [`sandbox`]: process-group-contained subprocess execution with a hard timer
//! - [`tools`]: the built-in tools and the [`ToolRegistry`]
//! - [`config`]: figment-based TOML/env loading into [`ToolPolicy`](warden_application::ToolPolicy)
//! - [`logging`]: the JSONL event log observer
//! - [`scripted`]: a model gateway that replays a JSON script

pub mod config;
pub mod logging;
pub mod sandbox;
pub mod scripted;
pub mod tools;

// Re-export commonly used types
pub use config::{ConfigError, ConfigLoader, ConfigSource, FileConfig};
pub use logging::JsonlEventLog;
pub use sandbox::{ExecOutput, ExecutorError, ExitKind, RunOptions, SandboxedExecutor};
pub use scripted::{ModelScript, ScriptError, ScriptedLlmGateway};
pub use tools::{BUILTIN_ALIASES, ToolRegistry};

#[cfg(all(test, unix))]
mod replay_tests {
    use super::*;
    use std::sync::Arc;
    use warden_application::{
        ExecutionParams, RecordingEventSink, SessionContext, StreamCoordinator,
        ToolCallDispatcher, ToolCallRepairer, ToolPolicy,
    };
    use warden_domain::{AgentEvent, Conversation, Message, StopReason, check_tool_call_ordering};

    fn coordinator(
        dir: &std::path::Path,
        script: &str,
    ) -> (StreamCoordinator, Arc<RecordingEventSink>) {
        let script = ModelScript::from_json(script).unwrap();
        let gateway: Arc<dyn warden_application::LlmGateway> = Arc::new(
            ScriptedLlmGateway::new(&script, Default::default()).unwrap(),
        );
        let events = Arc::new(RecordingEventSink::new());
        let dispatcher = ToolCallDispatcher::new(Arc::new(ToolRegistry::builtin()), events.clone())
            .with_repairer(Arc::new(ToolCallRepairer::new(gateway.clone())))
            .with_model_info(gateway.model_info());
        let session = SessionContext::new(dir, Arc::new(ToolPolicy::default()));
        let coordinator =
            StreamCoordinator::new(gateway, Arc::new(dispatcher), session, ExecutionParams::default());
        (coordinator, events)
    }

    #[tokio::test]
    async fn test_replay_runs_tools_and_folds_results_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "TODO: write docs\n").unwrap();
        let (coordinator, events) = coordinator(
            dir.path(),
            r#"{"steps": [
                [
                    {"type": "text", "text": "Reading."},
                    {"type": "tool_call", "id": "c1", "tool_name": "view", "arguments": {"path": "notes.txt"}},
                    {"type": "tool_call", "id": "c2", "tool_name": "bash", "arguments": {"command": "rm -rf / ; echo pwned"}},
                    {"type": "finished"}
                ],
                [ {"type": "text", "text": "All done."}, {"type": "finished"} ]
            ]}"#,
        );

        let mut conversation = Conversation::new();
        let output = coordinator.run_turn(&mut conversation, "check notes").await;
        assert_eq!(output.stop_reason, StopReason::Completed);
        assert_eq!(output.steps, 2);
        assert_eq!(output.final_text, "All done.");

        let recorded = events.events();
        check_tool_call_ordering(&recorded).unwrap();
        assert!(matches!(recorded.last(), Some(AgentEvent::AgentStop { .. })));
        assert_eq!(coordinator.dispatcher().pending_count(), 0);

        let results: Vec<(&str, bool)> = conversation
            .messages()
            .iter()
            .filter_map(|m| match m {
                Message::Tool {
                    tool_call_id,
                    is_error,
                    ..
                } => Some((tool_call_id.as_str(), *is_error)),
                _ => None,
            })
            .collect();
        assert_eq!(results.len(), 2);
        assert!(results.contains(&("c1", false)));
        assert!(results.contains(&("c2", true)));
    }

    #[tokio::test]
    async fn test_replay_repairs_malformed_arguments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "fixed").unwrap();
        let (coordinator, events) = coordinator(
            dir.path(),
            r#"{
                "steps": [
                    [ {"type": "tool_call", "id": "c1", "tool_name": "read_file", "arguments": {"file": "a.txt"}},
                      {"type": "finished"} ],
                    [ {"type": "finished"} ]
                ],
                "repairs": ["{\"path\": \"a.txt\"}"]
            }"#,
        );

        let mut conversation = Conversation::new();
        coordinator.run_turn(&mut conversation, "read it").await;

        let ended = events.events().into_iter().any(|e| {
            matches!(e, AgentEvent::ToolCallEnd { ref tool_call_id, .. } if tool_call_id == "c1")
        });
        assert!(ended, "{:?}", events.kinds());
    }
}
