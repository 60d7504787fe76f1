//! Session settings from TOML (`[session]` section)

use serde::{Deserialize, Serialize};
use warden_application::ExecutionParams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSessionConfig {
    /// Maximum model steps per turn
    pub max_steps: usize,
    /// Attach the terminal approval prompt
    pub interactive: bool,
}

impl Default for FileSessionConfig {
    fn default() -> Self {
        let params = ExecutionParams::default();
        Self {
            max_steps: params.max_steps,
            interactive: params.interactive,
        }
    }
}

impl FileSessionConfig {
    pub fn to_execution_params(&self) -> ExecutionParams {
        ExecutionParams::default()
            .with_max_steps(self.max_steps)
            .with_interactive(self.interactive)
    }
}
