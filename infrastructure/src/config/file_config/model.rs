//! Model metadata from TOML (`[model]` section)

use serde::{Deserialize, Serialize};
use warden_domain::ModelInfo;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileModelConfig {
    pub name: Option<String>,
    /// Context window in tokens; tool output is capped at a quarter of it
    pub context_window: Option<usize>,
    pub supports_tool_calling: bool,
    pub supports_reasoning: bool,
}

impl Default for FileModelConfig {
    fn default() -> Self {
        let info = ModelInfo::default();
        Self {
            name: None,
            context_window: info.context_window,
            supports_tool_calling: info.supports_tool_calling,
            supports_reasoning: info.supports_reasoning,
        }
    }
}

impl FileModelConfig {
    pub fn to_model_info(&self) -> ModelInfo {
        let mut info = ModelInfo {
            context_window: self.context_window,
            supports_tool_calling: self.supports_tool_calling,
            supports_reasoning: self.supports_reasoning,
            ..ModelInfo::default()
        };
        if let Some(name) = &self.name {
            info.name = name.clone();
        }
        info
    }
}
