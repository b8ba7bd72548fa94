// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        // Substitute environment variables
        let content = Self::substitute_env_vars(&content);

        // Parse YAML
        let config: RecorderConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

        // Validate configuration
        Self::validate(&config)?;

        Ok(config)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${DEVICE_ID:-edgecam-001} -> edgecam-001 (if DEVICE_ID not set)
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]+))?\}").unwrap();

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if let Some(default) = default_value {
                        default.to_string()
                    } else {
                        // Keep original if no default and var not found
                        format!("${{{}}}", var_name)
                    }
                }
            }
        })
        .to_string()
    }

    /// Validate configuration
    pub(crate) fn validate(config: &RecorderConfig) -> Result<()> {
        if config.recorder.device_id.is_empty() {
            bail!("recorder.device_id cannot be empty");
        }

        if config.recorder.fps == 0 {
            bail!("recorder.fps must be > 0");
        }

        let threshold = config.recorder.detection_threshold;
        if !(0.0..1.0).contains(&threshold) {
            bail!("recorder.detection_threshold must be in [0, 1)");
        }

        if config.recorder.watch_list.is_empty() {
            bail!("recorder.watch_list cannot be empty");
        }

        if config.storage.mover_interval_seconds == 0 {
            bail!("storage.mover_interval_seconds must be > 0");
        }

        if config.storage.min_free_bytes == 0 {
            bail!("storage.min_free_bytes must be > 0");
        }

        let used = config.storage.removable_used_threshold;
        if !(0.0..=1.0).contains(&used) {
            bail!("storage.removable_used_threshold must be in [0, 1]");
        }

        if config.storage.volatile_path == config.storage.persistent_path {
            bail!("volatile and persistent tiers must be distinct paths");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_EDGECAM_VAR", "test_value");

        let input = "path: ${TEST_EDGECAM_VAR}";
        let output = ConfigLoader::substitute_env_vars(input);
        assert_eq!(output, "path: test_value");

        std::env::remove_var("TEST_EDGECAM_VAR");
    }

    #[test]
    fn test_env_var_with_default() {
        std::env::remove_var("TEST_EDGECAM_VAR2");

        let input = "device_id: ${TEST_EDGECAM_VAR2:-edgecam-dev}";
        let output = ConfigLoader::substitute_env_vars(input);
        assert_eq!(output, "device_id: edgecam-dev");
    }

    #[test]
    fn test_validation_threshold_range() {
        let mut config = RecorderConfig::default();
        config.recorder.detection_threshold = 1.0;

        let result = ConfigLoader::validate(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("detection_threshold"));
    }

    #[test]
    fn test_validation_empty_watch_list() {
        let mut config = RecorderConfig::default();
        config.recorder.watch_list.clear();

        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validation_tiers_must_differ() {
        let mut config = RecorderConfig::default();
        config.storage.volatile_path = "/same".to_string();
        config.storage.persistent_path = "/same".to_string();

        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_defaults_validate() {
        assert!(ConfigLoader::validate(&RecorderConfig::default()).is_ok());
    }
}
