//! Configuration loading utilities for the coordinator.
//!
//! This module provides functions for reading and parsing
//! configuration files from disk.

use std::path::Path;

use eyre::WrapErr as _;
use tokio::fs;

use crate::config::ControllerConfig;

/// Reads and parses the coordinator config from a TOML file.
///
/// # Arguments
///
/// * `path` - File path to the TOML configuration file.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or parsed, or holds unusable values.
pub(crate) async fn load<P: AsRef<Path>>(path: P) -> eyre::Result<ControllerConfig> {
    let path_ref = path.as_ref();
    let content = fs::read_to_string(&path).await.wrap_err(format!(
        "Failed to read config file at: {}",
        path_ref.display()
    ))?;
    let config: ControllerConfig = toml::from_str(&content).wrap_err(format!(
        "Failed to parse config as TOML at: {}",
        path_ref.display()
    ))?;
    validate(&config).wrap_err(format!("Invalid config at: {}", path_ref.display()))?;
    Ok(config)
}

/// Rejects values that parse but cannot work, such as zero-length timers.
fn validate(config: &ControllerConfig) -> eyre::Result<()> {
    let notifications = &config.notifications;
    let durations = [
        ("server.request_timeout_secs", config.server.request_timeout_secs),
        (
            "notifications.keepalive_interval_secs",
            notifications.keepalive_interval_secs,
        ),
        (
            "notifications.write_deadline_secs",
            notifications.write_deadline_secs,
        ),
        (
            "notifications.read_deadline_secs",
            notifications.read_deadline_secs,
        ),
    ];
    for (key, secs) in durations {
        eyre::ensure!(secs > 0, "{key} must be at least 1 second");
    }
    Ok(())
}
