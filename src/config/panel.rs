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

// Operator panel settings file: sixteen integers, one per line, fixed order.
//
// The touch-panel surface owns most of these values (camera tuning,
// shutdown time); the core only consumes pre-roll and minimum recording
// seconds. The on-disk form is a serialization boundary: loaded once,
// rewritten whole on every change.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::info;

pub const MIN_PRE_ROLL_SECS: i64 = 1;
pub const MIN_VIDEO_SECS: i64 = 5;

const FIELD_COUNT: usize = 16;

/// The full settings record, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSettings {
    pub camera_mode: i64,
    pub shutter_speed: i64,
    pub gain: i64,
    pub meter_mode: i64,
    pub brightness: i64,
    pub contrast: i64,
    pub ev: i64,
    pub sharpness: i64,
    pub saturation: i64,
    pub awb_mode: i64,
    pub red_x10: i64,
    pub blue_x10: i64,
    pub shutdown_hour: i64,
    pub shutdown_minute: i64,
    pub pre_roll_secs: i64,
    pub min_video_secs: i64,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            camera_mode: 1,
            shutter_speed: 1000,
            gain: 0,
            meter_mode: 2,
            brightness: 0,
            contrast: 8,
            ev: 0,
            sharpness: 10,
            saturation: 10,
            awb_mode: 0,
            red_x10: 10,
            blue_x10: 10,
            shutdown_hour: 0,
            shutdown_minute: 0,
            pre_roll_secs: 5,
            min_video_secs: 15,
        }
    }
}

impl PanelSettings {
    /// Load the settings file, writing defaults first if it does not exist.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            let defaults = Self::default();
            defaults.store(path)?;
            info!("Wrote default panel settings to {}", path.display());
            return Ok(defaults);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read panel settings: {}", path.display()))?;

        let values: Vec<i64> = content
            .lines()
            .map(|line| line.trim().parse::<i64>())
            .collect::<std::result::Result<_, _>>()
            .context("Panel settings file contains a non-integer line")?;

        if values.len() != FIELD_COUNT {
            bail!(
                "Panel settings file has {} lines, expected {}",
                values.len(),
                FIELD_COUNT
            );
        }

        Ok(Self::from_values(&values))
    }

    /// Rewrite the full settings file atomically (temp file + rename),
    /// so a crash mid-write never leaves a truncated file behind.
    pub fn store(&self, path: &Path) -> Result<()> {
        let mut content = String::new();
        for value in self.to_values() {
            content.push_str(&value.to_string());
            content.push('\n');
        }

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Pre-roll duration in whole seconds, clamped to the documented minimum.
    pub fn pre_roll_secs(&self) -> u64 {
        self.pre_roll_secs.max(MIN_PRE_ROLL_SECS) as u64
    }

    /// Minimum recording duration in whole seconds, clamped likewise.
    pub fn min_video_secs(&self) -> u64 {
        self.min_video_secs.max(MIN_VIDEO_SECS) as u64
    }

    fn from_values(v: &[i64]) -> Self {
        Self {
            camera_mode: v[0],
            shutter_speed: v[1],
            gain: v[2],
            meter_mode: v[3],
            brightness: v[4],
            contrast: v[5],
            ev: v[6],
            sharpness: v[7],
            saturation: v[8],
            awb_mode: v[9],
            red_x10: v[10],
            blue_x10: v[11],
            shutdown_hour: v[12],
            shutdown_minute: v[13],
            pre_roll_secs: v[14],
            min_video_secs: v[15],
        }
    }

    fn to_values(&self) -> [i64; FIELD_COUNT] {
        [
            self.camera_mode,
            self.shutter_speed,
            self.gain,
            self.meter_mode,
            self.brightness,
            self.contrast,
            self.ev,
            self.sharpness,
            self.saturation,
            self.awb_mode,
            self.red_x10,
            self.blue_x10,
            self.shutdown_hour,
            self.shutdown_minute,
            self.pre_roll_secs,
            self.min_video_secs,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_run_writes_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("det_config.txt");

        let settings = PanelSettings::load_or_init(&path).unwrap();
        assert_eq!(settings, PanelSettings::default());
        assert!(path.exists());

        // Sixteen lines, one integer each.
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 16);
    }

    #[test]
    fn test_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("det_config.txt");

        let mut settings = PanelSettings::default();
        settings.ev = -7;
        settings.pre_roll_secs = 3;
        settings.shutdown_hour = 23;
        settings.store(&path).unwrap();

        let loaded = PanelSettings::load_or_init(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_clamps_apply_to_reads_only() {
        let mut settings = PanelSettings::default();
        settings.pre_roll_secs = 0;
        settings.min_video_secs = -10;

        // The stored values are tolerated as-is; the accessors clamp.
        assert_eq!(settings.pre_roll_secs(), 1);
        assert_eq!(settings.min_video_secs(), 5);
    }

    #[test]
    fn test_rejects_short_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("det_config.txt");
        std::fs::write(&path, "1\n2\n3\n").unwrap();

        assert!(PanelSettings::load_or_init(&path).is_err());
    }

    #[test]
    fn test_rejects_garbage_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("det_config.txt");
        std::fs::write(&path, "1\n2\nthree\n4\n5\n6\n7\n8\n9\n10\n11\n12\n13\n14\n15\n16\n")
            .unwrap();

        assert!(PanelSettings::load_or_init(&path).is_err());
    }

    #[test]
    fn test_store_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("det_config.txt");
        PanelSettings::default().store(&path).unwrap();

        assert!(!path.with_extension("tmp").exists());
    }
}
