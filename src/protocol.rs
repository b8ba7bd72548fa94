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

use crossbeam::queue::ArrayQueue;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Administrative commands exposed to the operator surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AdminCommand {
    ForceTrigger,
    DeleteSegment,
    DeleteAll,
    Consolidate,
    MoveToRemovable,
    MoveAllToRemovable,
}

/// Request message for administrative operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRequest {
    pub command: AdminCommand,
    /// Segment id for per-segment commands (delete one, move one).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<String>,
}

/// Response message for administrative operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminResponse {
    pub success: bool,
    pub message: String,
    /// Number of files affected, when meaningful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected: Option<usize>,
}

impl AdminResponse {
    pub fn ok(message: impl Into<String>, affected: Option<usize>) -> Self {
        Self {
            success: true,
            message: message.into(),
            affected,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            affected: None,
        }
    }
}

/// State-machine transition events for the indicator surface (activity
/// LED, on-screen status). Fire-and-forget; no acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum StatusEvent {
    RecordingStarted {
        segment_id: String,
        trigger_class: String,
    },
    RecordingStopped {
        segment_id: String,
    },
    SpaceCritical {
        active: bool,
    },
}

/// Receiver of status events. Implementations must not block the tick.
pub trait IndicatorSink: Send + Sync {
    fn notify(&self, event: StatusEvent);
}

/// Indicator backed by a bounded queue the display task drains. Events
/// are dropped, not awaited, when the consumer falls behind.
pub struct QueueIndicator {
    queue: Arc<ArrayQueue<StatusEvent>>,
}

impl QueueIndicator {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity)),
        }
    }

    pub fn queue(&self) -> Arc<ArrayQueue<StatusEvent>> {
        self.queue.clone()
    }
}

impl IndicatorSink for QueueIndicator {
    fn notify(&self, event: StatusEvent) {
        if self.queue.push(event).is_err() {
            warn!("Indicator queue full, dropping status event");
        }
    }
}

/// Indicator that discards everything. Headless deployments.
pub struct NullIndicator;

impl IndicatorSink for NullIndicator {
    fn notify(&self, _event: StatusEvent) {}
}
