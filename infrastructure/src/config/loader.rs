//! Configuration file loader with multi-source merging

use super::file_config::{ConfigError, FileConfig};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// Project-level config file names, first match wins
const PROJECT_FILES: &[&str] = &["warden.toml", ".warden.toml"];

/// Environment variable prefix; `__` separates nested keys
/// (`WARDEN_TOOLS__PIPE_POLICY=validated`).
const ENV_PREFIX: &str = "WARDEN_";

/// Where a configuration layer came from, for `--show-config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub label: &'static str,
    pub path: Option<PathBuf>,
    pub found: bool,
}

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `WARDEN_` environment variables
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./warden.toml` or `./.warden.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/warden/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, ConfigError> {
        let config: FileConfig = Self::figment(config_path)
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// The merged provider stack, before extraction.
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(path));
        }

        // An explicit path that doesn't exist is an error, not a silent no-op
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file_exact(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load only default configuration
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// `$XDG_CONFIG_HOME/warden/config.toml`, falling back to the platform
    /// config directory.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("warden").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Every source in priority order, highest first.
    pub fn config_sources(config_path: Option<&Path>) -> Vec<ConfigSource> {
        let mut sources = Vec::new();
        let env_found = std::env::vars().any(|(key, _)| key.starts_with(ENV_PREFIX));
        sources.push(ConfigSource {
            label: "Env",
            path: None,
            found: env_found,
        });
        if let Some(path) = config_path {
            sources.push(ConfigSource {
                label: "Explicit",
                path: Some(path.to_path_buf()),
                found: path.exists(),
            });
        }
        let project = Self::project_config_path();
        sources.push(ConfigSource {
            label: "Project",
            found: project.is_some(),
            path: project,
        });
        if let Some(path) = Self::global_config_path() {
            sources.push(ConfigSource {
                label: "Global",
                found: path.exists(),
                path: Some(path),
            });
        }
        sources.push(ConfigSource {
            label: "Default",
            path: None,
            found: true,
        });
        sources
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources(config_path: Option<&Path>) {
        println!("Configuration sources (in priority order):");
        for source in Self::config_sources(config_path) {
            let marker = if source.found { "FOUND" } else { "     " };
            let location = match (&source.path, source.label) {
                (Some(path), _) => path.display().to_string(),
                (None, "Env") => format!("{}* variables", ENV_PREFIX),
                (None, "Project") => PROJECT_FILES.join(" or "),
                (None, _) => "built-in defaults".to_string(),
            };
            println!("  [{}] {:<8} {}", marker, format!("{}:", source.label), location);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::time::Duration;
    use warden_domain::PipePolicy;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.session.max_steps, 10);
        assert_eq!(config.tools.default_timeout_ms, 60_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path().unwrap();
        assert!(path.ends_with("warden/config.toml"));
    }

    #[test]
    fn test_project_file_and_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "warden.toml",
                r#"
                [tools]
                allowed_programs = ["rg", "ls"]
                default_timeout_ms = 5000

                [session]
                max_steps = 3
                "#,
            )?;
            jail.set_env("WARDEN_TOOLS__DEFAULT_TIMEOUT_MS", "1500");
            jail.set_env("WARDEN_TOOLS__PIPE_POLICY", "validated");

            let config: FileConfig = ConfigLoader::figment(None).extract()?;
            assert_eq!(config.tools.allowed_programs, vec!["rg", "ls"]);
            assert_eq!(config.tools.default_timeout_ms, 1500);
            assert_eq!(config.tools.pipe_policy, PipePolicy::Validated);
            assert_eq!(config.session.max_steps, 3);

            let policy = config.to_tool_policy(Path::new("/work"));
            assert_eq!(policy.default_timeout, Duration::from_millis(1500));
            Ok(())
        });
    }

    #[test]
    fn test_hidden_project_file_and_explicit_override() {
        Jail::expect_with(|jail| {
            jail.create_file(".warden.toml", "[model]\ncontext_window = 8000\n")?;
            jail.create_file("override.toml", "[model]\ncontext_window = 4000\n")?;

            let config: FileConfig =
                ConfigLoader::figment(Some(Path::new("override.toml"))).extract()?;
            assert_eq!(config.model.context_window, Some(4000));
            assert_eq!(config.to_model_info().output_token_limit(20_000), 1000);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        Jail::expect_with(|_jail| {
            let result = ConfigLoader::load(Some(Path::new("nope.toml")));
            assert!(matches!(result, Err(ConfigError::Load(_))));
            Ok(())
        });
    }

    #[test]
    fn test_zero_timeout_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("warden.toml", "[tools]\ncode_timeout_ms = 0\n")?;
            let err = ConfigLoader::load(None).unwrap_err();
            assert_eq!(err.to_string(), "tools.code_timeout_ms cannot be 0");
            Ok(())
        });
    }
}
