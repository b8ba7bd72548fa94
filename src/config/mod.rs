// Configuration module for edgecam-recorder
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - The operator panel settings file (fixed-order integer list)

pub mod panel;
pub mod types;
mod loader;

pub use loader::ConfigLoader;
pub use panel::PanelSettings;
pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
    let mut config = load_config(path)?;

    // Allow environment variables to override config values
    if let Ok(device_id) = std::env::var("DEVICE_ID") {
        config.recorder.device_id = device_id;
    }

    if let Ok(volatile) = std::env::var("EDGECAM_VOLATILE_PATH") {
        config.storage.volatile_path = volatile;
    }

    if let Ok(persistent) = std::env::var("EDGECAM_PERSISTENT_PATH") {
        config.storage.persistent_path = persistent;
    }

    Ok(config)
}
