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

// Volatile-tier capacity sampling and the space-critical signal

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use sysinfo::Disks;
use tracing::warn;

/// Source of filesystem capacity readings.
///
/// Abstracted so tests can inject readings; production uses [`DiskProbe`].
pub trait SpaceProbe: Send + Sync {
    /// Bytes available on the filesystem holding `path`.
    fn available_bytes(&self, path: &Path) -> Option<u64>;

    /// Used fraction (0.0..=1.0) of the filesystem holding `path`.
    fn used_fraction(&self, path: &Path) -> Option<f64>;
}

/// Probe backed by the OS mount table. Readings are refreshed on every
/// call since removable media may appear or disappear at any time.
pub struct DiskProbe {
    disks: Mutex<Disks>,
}

impl DiskProbe {
    pub fn new() -> Self {
        Self {
            disks: Mutex::new(Disks::new_with_refreshed_list()),
        }
    }

    fn with_disk<T>(&self, path: &Path, f: impl Fn(u64, u64) -> T) -> Option<T> {
        let mut disks = self.disks.lock().expect("disk probe poisoned");
        disks.refresh_list();

        // Longest mount-point prefix wins, so /media/usb beats /.
        disks
            .list()
            .iter()
            .filter(|d| path.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .map(|d| f(d.available_space(), d.total_space()))
    }
}

impl Default for DiskProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SpaceProbe for DiskProbe {
    fn available_bytes(&self, path: &Path) -> Option<u64> {
        self.with_disk(path, |available, _| available)
    }

    fn used_fraction(&self, path: &Path) -> Option<f64> {
        self.with_disk(path, |available, total| {
            if total == 0 {
                return 1.0;
            }
            1.0 - (available as f64 / total as f64)
        })
    }
}

/// Samples available space on the volatile tier and reports the
/// space-critical condition.
///
/// Plain threshold test re-evaluated every tick, no hysteresis: a value
/// oscillating around the floor flips the signal on consecutive ticks and
/// can bounce the state machine between Recording and Stopping. That
/// matches the deployed behavior and is covered by a test.
pub struct ResourceMonitor {
    probe: Box<dyn SpaceProbe>,
    volatile_path: PathBuf,
    floor_bytes: u64,
}

impl ResourceMonitor {
    pub fn new(probe: Box<dyn SpaceProbe>, volatile_path: PathBuf, floor_bytes: u64) -> Self {
        Self {
            probe,
            volatile_path,
            floor_bytes,
        }
    }

    /// True when free space on the volatile tier is at or below the floor.
    /// An unreadable filesystem is treated as critical.
    pub fn space_critical(&self) -> bool {
        match self.probe.available_bytes(&self.volatile_path) {
            Some(available) => available <= self.floor_bytes,
            None => {
                warn!(
                    "Cannot sample free space on {}; treating as critical",
                    self.volatile_path.display()
                );
                true
            }
        }
    }
}
