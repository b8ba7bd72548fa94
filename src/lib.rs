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

// Detection-triggered edge video recorder with tiered storage
//
// A continuously sampling recorder for camera edge devices that:
// - Keeps a rolling pre-roll window so recordings start before the trigger
// - Opens one recording session per qualifying detection or manual trigger
// - Writes length-prefixed frame segments with a derived-duration header
// - Promotes completed segments volatile -> persistent -> removable
// - Consolidates segment runs into a single archival file on request
// - Exposes admin operations over a request-response control channel

pub mod capture;
pub mod config;
pub mod container;
pub mod control;
pub mod detect;
pub mod error;
pub mod monitor;
pub mod mover;
pub mod protocol;
pub mod segment;
pub mod session;

// Re-export main types
pub use capture::{CaptureSink, Frame, PreRollBuffer, SegmentFileSink};
pub use config::{load_config, load_config_with_env, PanelSettings, RecorderConfig};
pub use control::{ControlHandle, ControlInterface};
pub use detect::{DetectionEvent, DetectionFeed, StubFeed, WatchList};
pub use error::{RecorderError, Result};
pub use monitor::{DiskProbe, ResourceMonitor, SpaceProbe};
pub use mover::StorageMover;
pub use protocol::{
    AdminCommand, AdminRequest, AdminResponse, IndicatorSink, NullIndicator, QueueIndicator,
    StatusEvent,
};
pub use segment::{Segment, SegmentId, SegmentStore, Tier, TierLayout};
pub use session::{EngineConfig, RecorderEngine, RecorderState};
