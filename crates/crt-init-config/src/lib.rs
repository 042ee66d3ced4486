//! # crt-init-config
//!
//! Configuration for the crt-init C runtime hand-off.
//!
//! Nothing is read from the environment or from well-known paths: the
//! host runtime decides where a config comes from (usually nowhere, the
//! defaults are what a normal process wants) and calls [`install`] before
//! it hands control to the C runtime.

pub mod logging;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;
use tracing::debug;

pub use logging::{init_logging, init_logging_from, Component, LogLevel};

/// Global config instance
static CONFIG: Lazy<RwLock<StartupConfig>> = Lazy::new(|| RwLock::new(StartupConfig::default()));

/// Smallest stack accepted for the startup worker. The platform startup
/// call and every static initializer run on it.
pub const MIN_WORKER_STACK: usize = 64 * 1024;

/// Snapshot of the active config
pub fn config() -> StartupConfig {
    CONFIG
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Replace the active config after validating it
pub fn install(config: StartupConfig) -> Result<(), ConfigError> {
    config.validate()?;
    *CONFIG.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which side walks the static initializers during the hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConventionChoice {
    /// Decide from the compilation target.
    #[default]
    Auto,
    /// The platform calls the init callback it is handed.
    CallerSupplied,
    /// The platform walks the init array itself and ignores the callback.
    PlatformRuns,
}

/// Startup hand-off configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    pub convention: ConventionChoice,
    /// Name of the thread the platform startup call runs on
    pub worker_name: String,
    /// Stack size for that thread; the std default when unset
    pub worker_stack_size: Option<usize>,
    /// Write bootstrap diagnostics to stderr
    pub diagnostics: bool,
    /// Level applied by [`init_logging_from`]
    pub log_level: LogLevel,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            convention: ConventionChoice::Auto,
            worker_name: "crt-startup".to_string(),
            worker_stack_size: None,
            diagnostics: false,
            log_level: LogLevel::Info,
        }
    }
}

impl StartupConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: StartupConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading startup config from {:?}", path);
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_name.is_empty() {
            return Err(ConfigError::Invalid("worker_name is empty".into()));
        }
        // std refuses thread names with interior NULs by panicking at spawn.
        if self.worker_name.contains('\0') {
            return Err(ConfigError::Invalid(
                "worker_name contains a NUL byte".into(),
            ));
        }
        if let Some(size) = self.worker_stack_size {
            if size < MIN_WORKER_STACK {
                return Err(ConfigError::Invalid(format!(
                    "worker_stack_size {} is below the {} byte minimum",
                    size, MIN_WORKER_STACK
                )));
            }
        }
        Ok(())
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        toml::to_string_pretty(&StartupConfig::default()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StartupConfig::default();
        assert_eq!(config.convention, ConventionChoice::Auto);
        assert_eq!(config.worker_name, "crt-startup");
        assert!(config.worker_stack_size.is_none());
        assert!(!config.diagnostics);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = StartupConfig::from_toml_str(
            r#"
convention = "platform-runs"
diagnostics = true
"#,
        )
        .unwrap();
        assert_eq!(config.convention, ConventionChoice::PlatformRuns);
        assert!(config.diagnostics);
        assert_eq!(config.worker_name, "crt-startup");
    }

    #[test]
    fn test_unknown_convention_rejected() {
        let err = StartupConfig::from_toml_str(r#"convention = "both""#).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_small_stack_rejected() {
        let config = StartupConfig {
            worker_stack_size: Some(4096),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_nul_in_worker_name_rejected() {
        let config = StartupConfig {
            worker_name: "crt\0startup".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_toml_round_trips() {
        let toml_str = StartupConfig::default_toml();
        assert!(toml_str.contains("convention = \"auto\""));
        let parsed = StartupConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed, StartupConfig::default());
    }
}
