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

// Core error taxonomy

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the recording engine and storage mover.
///
/// Sink failures abort the in-flight session and return the state machine
/// to Idle. Mover failures skip the affected move; the next interval
/// retries it by filename. None of these are fatal to the control loop.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("capture sink failed to open: {reason}")]
    SinkOpenFailure { reason: String },

    #[error("capture sink write failed: {reason}")]
    SinkWriteFailure { reason: String },

    #[error("capture sink failed to close: {reason}")]
    SinkCloseFailure { reason: String },

    #[error("storage tier unavailable: {0}")]
    StorageUnavailable(PathBuf),

    #[error("destination not confirmed after copy: {dst}")]
    MoveVerificationFailure { dst: PathBuf },

    #[error("capacity exceeded on {tier}: {used_fraction:.2} used")]
    CapacityExceeded { tier: String, used_fraction: f64 },

    #[error("consolidation failed: {reason}")]
    Consolidation { reason: String },

    #[error("recording in flight, storage operation deferred")]
    RecordingInFlight,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RecorderError>;
