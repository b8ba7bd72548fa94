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

// Capture sink contract, pre-roll buffering, and the volatile-tier file sink

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use tracing::debug;

use crate::container::SegmentWriter;
use crate::error::{RecorderError, Result};
use crate::segment::{SegmentId, TierLayout};

/// One encoded frame as handed over by the encoder. Opaque to the core.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// Continuously maintained rolling window of recent frames.
///
/// The buffer is warm in every state, including Idle, so a sink opened at
/// trigger time already contains footage from before the trigger moment.
pub struct PreRollBuffer {
    frames: VecDeque<Frame>,
    capacity: usize,
}

impl PreRollBuffer {
    pub fn new(pre_roll_secs: u64, fps: u16) -> Self {
        let capacity = (pre_roll_secs as usize * fps as usize).max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, frame: Frame) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Most recent frame, used for the trigger thumbnail.
    pub fn latest(&self) -> Option<&Frame> {
        self.frames.back()
    }

    /// Copy of the window contents in arrival order.
    pub fn snapshot(&self) -> Vec<Frame> {
        self.frames.iter().cloned().collect()
    }
}

/// Capture sink contract: open seeded with the pre-roll window, append
/// live frames, close to obtain the finished file path.
///
/// At most one sink is open at a time; the state machine's singleton
/// in-flight session enforces this.
#[async_trait]
pub trait CaptureSink: Send {
    /// Open a sink for `id`, pre-seeded with the pre-roll frames.
    async fn open(&mut self, id: &SegmentId, pre_roll: Vec<Frame>) -> Result<()>;

    /// Append one live frame. No-op when the sink is not open.
    async fn append(&mut self, frame: Frame) -> Result<()>;

    /// Close the sink and return the path of the produced file.
    async fn close(&mut self) -> Result<PathBuf>;

    fn is_open(&self) -> bool;
}

/// Extension of the scratch file an open sink writes to. Catalog scans
/// match only on the video extension, so an in-flight segment is never
/// visible to the mover until `close()` renames it.
const SCRATCH_EXT: &str = "tmp";

struct ActiveSegment {
    writer: SegmentWriter,
    scratch: PathBuf,
    dest: PathBuf,
}

/// Sink that writes segment containers onto the volatile tier.
pub struct SegmentFileSink {
    volatile: TierLayout,
    fps: u16,
    active: Option<ActiveSegment>,
}

impl SegmentFileSink {
    pub fn new(volatile: TierLayout, fps: u16) -> Self {
        Self {
            volatile,
            fps,
            active: None,
        }
    }
}

#[async_trait]
impl CaptureSink for SegmentFileSink {
    async fn open(&mut self, id: &SegmentId, pre_roll: Vec<Frame>) -> Result<()> {
        if self.active.is_some() {
            return Err(RecorderError::SinkOpenFailure {
                reason: "sink already open".to_string(),
            });
        }

        let dest = self.volatile.video_path(id);
        let scratch = dest.with_extension(SCRATCH_EXT);
        let mut writer = SegmentWriter::create(&scratch, self.fps).map_err(|e| {
            RecorderError::SinkOpenFailure {
                reason: e.to_string(),
            }
        })?;

        for frame in &pre_roll {
            writer
                .write_frame(&frame.data)
                .map_err(|e| RecorderError::SinkOpenFailure {
                    reason: e.to_string(),
                })?;
        }

        debug!(
            "Opened sink {} with {} pre-roll frames",
            scratch.display(),
            pre_roll.len()
        );
        self.active = Some(ActiveSegment {
            writer,
            scratch,
            dest,
        });
        Ok(())
    }

    async fn append(&mut self, frame: Frame) -> Result<()> {
        if let Some(active) = self.active.as_mut() {
            active
                .writer
                .write_frame(&frame.data)
                .map_err(|e| RecorderError::SinkWriteFailure {
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<PathBuf> {
        let ActiveSegment {
            writer,
            scratch,
            dest,
        } = self
            .active
            .take()
            .ok_or_else(|| RecorderError::SinkCloseFailure {
                reason: "sink not open".to_string(),
            })?;

        writer
            .finish()
            .map_err(|e| RecorderError::SinkCloseFailure {
                reason: e.to_string(),
            })?;

        // The segment takes its catalog name only now that it is sealed.
        std::fs::rename(&scratch, &dest).map_err(|e| RecorderError::SinkCloseFailure {
            reason: e.to_string(),
        })?;

        debug!("Closed sink {}", dest.display());
        Ok(dest)
    }

    fn is_open(&self) -> bool {
        self.active.is_some()
    }
}
