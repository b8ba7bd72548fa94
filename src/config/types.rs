// Copyright 2025 edgecam-recorder contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Configuration types for edgecam-recorder

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecorderConfig {
    pub recorder: RecorderSettings,
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            recorder: RecorderSettings::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Recorder-specific settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecorderSettings {
    pub device_id: String,

    /// Control loop cadence; also the frame rate of the capture feed.
    #[serde(default = "default_fps")]
    pub fps: u16,

    /// Detections at or below this confidence never trigger.
    #[serde(default = "default_threshold")]
    pub detection_threshold: f32,

    /// Class names that trigger a recording, in tie-break order.
    #[serde(default = "default_watch_list")]
    pub watch_list: Vec<String>,

    /// Operator panel settings file (fixed-order integer list).
    #[serde(default = "default_panel_file")]
    pub panel_file: String,

    /// Append qualifying triggers to a plain-text detection log.
    #[serde(default)]
    pub detection_log: Option<String>,

    #[serde(default = "default_indicator_queue")]
    pub indicator_queue: usize,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            device_id: "edgecam-001".to_string(),
            fps: default_fps(),
            detection_threshold: default_threshold(),
            watch_list: default_watch_list(),
            panel_file: default_panel_file(),
            detection_log: None,
            indicator_queue: default_indicator_queue(),
        }
    }
}

/// Storage tier configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Memory-backed live recording target (small, fast).
    #[serde(default = "default_volatile_path")]
    pub volatile_path: String,

    /// Local persistent tier root; holds `Pictures/` and `Videos/`.
    #[serde(default = "default_persistent_path")]
    pub persistent_path: String,

    /// Directory under which removable media mounts appear.
    #[serde(default = "default_removable_base")]
    pub removable_base: String,

    /// Skip promotion to removable above this used-capacity fraction.
    #[serde(default = "default_removable_threshold")]
    pub removable_used_threshold: f64,

    #[serde(default = "default_mover_interval")]
    pub mover_interval_seconds: u64,

    /// Space-critical floor on the volatile tier.
    #[serde(default = "default_min_free_bytes")]
    pub min_free_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            volatile_path: default_volatile_path(),
            persistent_path: default_persistent_path(),
            removable_base: default_removable_base(),
            removable_used_threshold: default_removable_threshold(),
            mover_interval_seconds: default_mover_interval(),
            min_free_bytes: default_min_free_bytes(),
        }
    }
}

impl StorageConfig {
    pub fn mover_interval(&self) -> Duration {
        Duration::from_secs(self.mover_interval_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String, // "text", "json"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_fps() -> u16 { 30 }
fn default_threshold() -> f32 { 0.5 }
fn default_watch_list() -> Vec<String> {
    vec!["cat".to_string(), "bear".to_string(), "dog".to_string()]
}
fn default_panel_file() -> String { "det_config.txt".to_string() }
fn default_indicator_queue() -> usize { 64 }
fn default_volatile_path() -> String { "/run/shm".to_string() }
fn default_persistent_path() -> String { "/home/pi".to_string() }
fn default_removable_base() -> String { "/media/pi".to_string() }
fn default_removable_threshold() -> f64 { 0.90 }
fn default_mover_interval() -> u64 { 10 }
fn default_min_free_bytes() -> u64 { 150 * 1024 * 1024 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
