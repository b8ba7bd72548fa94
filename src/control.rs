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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

use crate::mover::StorageMover;
use crate::protocol::{AdminCommand, AdminRequest, AdminResponse};
use crate::segment::SegmentId;

/// One in-flight admin request with its reply slot.
struct ControlRequest {
    request: AdminRequest,
    reply: oneshot::Sender<AdminResponse>,
}

/// Cloneable submission handle for the control interface.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlRequest>,
}

impl ControlHandle {
    /// Submit a request and wait for the response. A closed interface
    /// yields an error response rather than a panic.
    pub async fn submit(&self, request: AdminRequest) -> AdminResponse {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = ControlRequest {
            request,
            reply: reply_tx,
        };
        if self.tx.send(envelope).await.is_err() {
            return AdminResponse::error("Control interface unavailable");
        }
        match reply_rx.await {
            Ok(response) => response,
            Err(_) => AdminResponse::error("Control interface dropped request"),
        }
    }
}

/// Control interface dispatching administrative commands to the storage
/// mover and the recording engine's manual trigger.
pub struct ControlInterface {
    rx: mpsc::Receiver<ControlRequest>,
    mover: Arc<StorageMover>,
    manual_trigger: Arc<AtomicBool>,
}

impl ControlInterface {
    pub fn channel(
        mover: Arc<StorageMover>,
        manual_trigger: Arc<AtomicBool>,
        capacity: usize,
    ) -> (ControlHandle, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            ControlHandle { tx },
            Self {
                rx,
                mover,
                manual_trigger,
            },
        )
    }

    /// Serve requests until every handle is dropped.
    pub async fn run(mut self) {
        info!("Control interface ready");
        while let Some(envelope) = self.rx.recv().await {
            let response = self.dispatch(envelope.request).await;
            if !response.success {
                error!("Admin command failed: {}", response.message);
            }
            let _ = envelope.reply.send(response);
        }
        info!("Control interface stopped");
    }

    async fn dispatch(&self, request: AdminRequest) -> AdminResponse {
        info!("Processing admin command: {:?}", request.command);

        match request.command {
            AdminCommand::ForceTrigger => {
                self.manual_trigger.store(true, Ordering::Release);
                AdminResponse::ok("Manual trigger armed", None)
            }
            AdminCommand::DeleteSegment => {
                let id = match Self::required_id(&request) {
                    Ok(id) => id,
                    Err(response) => return response,
                };
                match self.mover.delete_segment(&id).await {
                    Ok(0) => AdminResponse::error(format!("Segment {} not found", id)),
                    Ok(n) => AdminResponse::ok(format!("Deleted segment {}", id), Some(n)),
                    Err(e) => AdminResponse::error(e.to_string()),
                }
            }
            AdminCommand::DeleteAll => match self.mover.delete_all().await {
                Ok(n) => AdminResponse::ok("Deleted all segments", Some(n)),
                Err(e) => AdminResponse::error(e.to_string()),
            },
            AdminCommand::Consolidate => match self.mover.consolidate().await {
                Ok(Some(id)) => AdminResponse::ok(format!("Consolidated into {}", id), None),
                Ok(None) => AdminResponse::ok("Nothing to consolidate", Some(0)),
                Err(e) => AdminResponse::error(e.to_string()),
            },
            AdminCommand::MoveToRemovable => {
                let id = match Self::required_id(&request) {
                    Ok(id) => id,
                    Err(response) => return response,
                };
                match self.mover.promote_removable_one(&id).await {
                    Ok(0) => AdminResponse::error(format!("Segment {} not found", id)),
                    Ok(n) => AdminResponse::ok(format!("Moved segment {}", id), Some(n)),
                    Err(e) => AdminResponse::error(e.to_string()),
                }
            }
            AdminCommand::MoveAllToRemovable => match self.mover.promote_removable_all().await {
                Ok(n) => AdminResponse::ok("Moved segments to removable tier", Some(n)),
                Err(e) => AdminResponse::error(e.to_string()),
            },
        }
    }

    fn required_id(request: &AdminRequest) -> Result<SegmentId, AdminResponse> {
        let raw = request
            .segment_id
            .as_deref()
            .ok_or_else(|| AdminResponse::error("Missing segment_id"))?;
        SegmentId::parse(raw)
            .ok_or_else(|| AdminResponse::error(format!("Invalid segment id '{}'", raw)))
    }
}
