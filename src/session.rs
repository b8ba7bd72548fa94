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

//! Detection-triggered recording state machine
//!
//! Drives the Idle -> Triggered -> Recording -> Stopping -> Idle
//! lifecycle once per scheduling tick. The in-flight session lives in an
//! `Option` owned by the engine, which is what enforces the
//! singleton-in-flight invariant: there is nowhere to put a second one.
//!
//! Abort semantics: a failed sink open and a space-critical signal are
//! handled identically (back to Idle, nothing retried within the tick);
//! the next tick re-evaluates from scratch.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::capture::{CaptureSink, Frame, PreRollBuffer};
use crate::detect::{DetectionFeed, WatchList, MANUAL_CLASS};
use crate::monitor::ResourceMonitor;
use crate::protocol::{IndicatorSink, StatusEvent};
use crate::segment::{SegmentId, TierLayout};

/// Lifecycle states of a recording attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Triggered,
    Recording,
    Stopping,
}

/// The unit of one recording attempt. Exactly one may exist at a time.
#[derive(Debug)]
pub struct RecordingSession {
    pub id: SegmentId,
    pub trigger_class: String,
    pub trigger_confidence: f32,
    pub state: RecorderState,
    trigger_time: Instant,
}

impl RecordingSession {
    fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.trigger_time)
    }
}

/// Timing and qualification parameters, resolved from the YAML config
/// and the operator panel settings at construction time.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub detection_threshold: f32,
    pub pre_roll: Duration,
    pub min_video: Duration,
    pub fps: u16,
}

pub struct RecorderEngine {
    config: EngineConfig,
    watch_list: WatchList,
    feed: Box<dyn DetectionFeed>,
    sink: Box<dyn CaptureSink>,
    indicator: Arc<dyn IndicatorSink>,
    monitor: ResourceMonitor,
    persistent: TierLayout,
    pre_roll: PreRollBuffer,
    in_flight: Option<RecordingSession>,
    manual_flag: Arc<AtomicBool>,
    recording_active: Arc<AtomicBool>,
    last_space_critical: bool,
    detection_log: Option<PathBuf>,
}

impl RecorderEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        watch_list: WatchList,
        feed: Box<dyn DetectionFeed>,
        sink: Box<dyn CaptureSink>,
        indicator: Arc<dyn IndicatorSink>,
        monitor: ResourceMonitor,
        persistent: TierLayout,
        detection_log: Option<PathBuf>,
    ) -> Self {
        let pre_roll = PreRollBuffer::new(config.pre_roll.as_secs(), config.fps);
        Self {
            config,
            watch_list,
            feed,
            sink,
            indicator,
            monitor,
            persistent,
            pre_roll,
            in_flight: None,
            manual_flag: Arc::new(AtomicBool::new(false)),
            recording_active: Arc::new(AtomicBool::new(false)),
            last_space_critical: false,
            detection_log,
        }
    }

    /// Flag the control surface sets to force a recording; consumed on
    /// the next tick.
    pub fn manual_trigger_handle(&self) -> Arc<AtomicBool> {
        self.manual_flag.clone()
    }

    /// True while a session holds the capture sink. The storage mover
    /// reads this to stay off the volatile tier during recording.
    pub fn recording_active_handle(&self) -> Arc<AtomicBool> {
        self.recording_active.clone()
    }

    pub fn state(&self) -> RecorderState {
        self.in_flight
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(RecorderState::Idle)
    }

    pub fn current_session_id(&self) -> Option<&SegmentId> {
        self.in_flight.as_ref().map(|s| &s.id)
    }

    /// Advance the state machine by one tick.
    ///
    /// `frame` is the newest encoded frame from the camera; `now` is the
    /// monotonic instant of this tick. Errors abort the session but never
    /// escape: the loop must keep sampling.
    pub async fn tick(&mut self, frame: Frame, now: Instant) {
        // Keep the sink fed first so live frames are not lost to trigger
        // evaluation latency.
        if self.sink.is_open() {
            if let Err(e) = self.sink.append(frame.clone()).await {
                error!("Sink append failed: {}", e);
            }
        }
        // The pre-roll window stays warm in every state.
        self.pre_roll.push(frame);

        let space_critical = self.monitor.space_critical();
        if space_critical != self.last_space_critical {
            self.indicator.notify(StatusEvent::SpaceCritical {
                active: space_critical,
            });
            self.last_space_critical = space_critical;
        }

        let detections = self.feed.poll();
        let manual = self.manual_flag.swap(false, Ordering::AcqRel);

        match self.in_flight.as_mut() {
            None => {
                let trigger = if manual {
                    Some((MANUAL_CLASS.to_string(), 0.0))
                } else {
                    self.watch_list
                        .qualify(&detections, self.config.detection_threshold)
                        .map(|d| (d.class_name.clone(), d.confidence))
                };

                if let Some((class, confidence)) = trigger {
                    self.start_session(class, confidence, space_critical, now)
                        .await;
                }
            }
            Some(session) => {
                // A manual trigger mid-recording forces a fresh minimum
                // window; ordinary detections never move the clock, which
                // bounds worst-case recording length.
                if manual {
                    session.trigger_time = now;
                    info!("Manual re-trigger, minimum window restarted");
                }

                let window = self.config.min_video + self.config.pre_roll;
                if session.elapsed(now) > window || space_critical {
                    if space_critical {
                        warn!("Space critical, stopping recording early");
                    }
                    self.stop_session().await;
                }
            }
        }
    }

    /// Close any in-flight session. Called once at process teardown so
    /// the open segment is finished rather than abandoned.
    pub async fn shutdown(&mut self) {
        if self.in_flight.is_some() {
            info!("Shutting down with a session in flight, closing it");
            self.stop_session().await;
        }
    }

    async fn start_session(
        &mut self,
        trigger_class: String,
        trigger_confidence: f32,
        space_critical: bool,
        now: Instant,
    ) {
        let id = SegmentId::from_timestamp(chrono::Local::now().naive_local());

        if space_critical {
            warn!(
                "Trigger '{}' ignored, volatile tier space critical",
                trigger_class
            );
            return;
        }

        let mut session = RecordingSession {
            id: id.clone(),
            trigger_class: trigger_class.clone(),
            trigger_confidence,
            state: RecorderState::Triggered,
            trigger_time: now,
        };

        // The sink is opened pre-seeded with the rolling window, so the
        // file starts before the trigger moment.
        if let Err(e) = self.sink.open(&id, self.pre_roll.snapshot()).await {
            warn!("Sink open failed, returning to idle: {}", e);
            return;
        }

        session.state = RecorderState::Recording;
        session.trigger_time = now;

        if let Err(e) = self.write_thumbnail(&id).await {
            // Not fatal: the segment is still valid without its still.
            warn!("Thumbnail write failed for {}: {}", id, e);
        }

        self.log_detection(&id, &trigger_class);

        info!(
            "Recording started: {} triggered by '{}' ({:.2})",
            id, trigger_class, trigger_confidence
        );
        self.indicator.notify(StatusEvent::RecordingStarted {
            segment_id: id.to_string(),
            trigger_class,
        });

        self.recording_active.store(true, Ordering::Release);
        self.in_flight = Some(session);
    }

    async fn stop_session(&mut self) {
        let Some(mut session) = self.in_flight.take() else {
            return;
        };
        session.state = RecorderState::Stopping;

        match self.sink.close().await {
            Ok(path) => {
                info!("Recording stopped: {} at {}", session.id, path.display());
            }
            Err(e) => {
                // The session is torn down either way; a half-written
                // container reads back as zero frames.
                error!("Sink close failed for {}: {}", session.id, e);
            }
        }

        self.indicator.notify(StatusEvent::RecordingStopped {
            segment_id: session.id.to_string(),
        });
        self.recording_active.store(false, Ordering::Release);
    }

    async fn write_thumbnail(&self, id: &SegmentId) -> anyhow::Result<()> {
        let Some(frame) = self.pre_roll.latest() else {
            anyhow::bail!("No frame available for thumbnail");
        };
        let path = self.persistent.thumbnail_path(id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &frame.data).await?;
        Ok(())
    }

    fn log_detection(&self, id: &SegmentId, class: &str) {
        let Some(path) = &self.detection_log else {
            return;
        };
        use std::io::Write;
        let line = format!("{} {}\n", id, class);
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = result {
            warn!("Detection log append failed: {}", e);
        }
    }
}
