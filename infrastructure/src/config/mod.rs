//! Configuration file loading for warden
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `WARDEN_` environment variables (`__` for nesting)
//! 2. `--config <path>` specified file
//! 3. Project root: `./warden.toml` or `./.warden.toml`
//! 4. Global: `$XDG_CONFIG_HOME/warden/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigError, FileConfig, FileModelConfig, FileSessionConfig, FileToolsConfig,
};
pub use loader::{ConfigLoader, ConfigSource};
