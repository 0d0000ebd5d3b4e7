//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events; embedding applications either
//! install their own subscriber or call [`init_tracing`].

use crate::config::LoggingConfig;
use std::env;
use tracing_subscriber::EnvFilter;

/// Overrides `LoggingConfig::level` when set
pub const LOG_ENV_VAR: &str = "DOCPART_LOG";

/// Filter directive in effect for `config`, after the env override
pub fn effective_level(config: &LoggingConfig) -> String {
    env::var(LOG_ENV_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| config.level.clone())
}

/// Install a global fmt subscriber. Returns `false` when one was already
/// installed, in which case nothing changes.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let level = effective_level(config);
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    let base = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(true);

    let installed = if config.format == "json" {
        base.json().try_init().is_ok()
    } else {
        base.compact().try_init().is_ok()
    };

    if installed {
        tracing::debug!(level = %level, format = %config.format, "tracing_initialized");
    }
    installed
}
