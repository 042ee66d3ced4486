//! Structured logging for crt-init components.
//!
//! Events carry a `component` field so hosts can filter startup noise
//! separately from their own output.
//!
//! # Usage
//!
//! ```ignore
//! use crt_init_config::log_startup_debug;
//!
//! log_startup_debug!("Startup worker spawned", argc = 3);
//! ```
//!
//! None of these install a subscriber. During bootstrap there usually is
//! none, so the events are dropped; hosts that want them call
//! [`init_logging`] before handing off to the C runtime.

use serde::{Deserialize, Serialize};

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const STARTUP: &'static str = "STARTUP";
    pub const CLEANUP: &'static str = "CLEANUP";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// === STARTUP logging macros ===

#[macro_export]
macro_rules! log_startup_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "STARTUP", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_startup_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "STARTUP", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_startup_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "STARTUP", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_startup_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "STARTUP", $($key = $value,)* $msg)
    };
}

// === CLEANUP logging macros ===

#[macro_export]
macro_rules! log_cleanup_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "CLEANUP", $($key = $value,)* $msg)
    };
}

/// Initialize logging with the given level filter.
///
/// `RUST_LOG` wins over `level` when set. Calling this more than once is
/// harmless; only the first subscriber is kept.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Initialize logging at the level a [`StartupConfig`] asks for.
pub fn init_logging_from(config: &crate::StartupConfig) {
    init_logging(config.log_level);
}
