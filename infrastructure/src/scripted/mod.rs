//! Scripted model provider: replays canned model output from a JSON file.

mod gateway;
mod script;

pub use gateway::ScriptedLlmGateway;
pub use script::{ModelScript, ScriptChunk, ScriptError, ScriptModel};
