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

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod capture;
mod config;
mod container;
mod control;
mod detect;
mod error;
mod monitor;
mod mover;
mod protocol;
mod segment;
mod session;

use capture::{Frame, SegmentFileSink};
use config::{load_config_with_env, PanelSettings};
use control::ControlInterface;
use detect::{StubFeed, WatchList};
use monitor::{DiskProbe, ResourceMonitor};
use mover::StorageMover;
use protocol::QueueIndicator;
use segment::TierLayout;
use session::{EngineConfig, RecorderEngine};

/// Edgecam Recorder - Detection-triggered recording with tiered storage
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.yaml")]
    config: PathBuf,

    /// Device ID (overrides config file)
    #[arg(short, long)]
    device_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration from file
    let mut recorder_config = load_config_with_env(&args.config)?;

    // Apply CLI overrides
    if let Some(device_id) = args.device_id {
        recorder_config.recorder.device_id = device_id;
    }

    // Initialize tracing with configured level
    let log_level = match recorder_config.logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Edgecam Recorder");
    info!("Loaded configuration from: {:?}", args.config);
    info!("Device ID: {}", recorder_config.recorder.device_id);

    // Storage tiers
    let volatile = TierLayout::volatile(&recorder_config.storage.volatile_path);
    let persistent = TierLayout::persistent(&recorder_config.storage.persistent_path);
    volatile.ensure_dirs()?;
    persistent.ensure_dirs()?;

    // Operator panel settings, created with defaults on first run
    let panel_path = PathBuf::from(&recorder_config.storage.persistent_path)
        .join(&recorder_config.recorder.panel_file);
    let panel = PanelSettings::load_or_init(&panel_path)?;
    info!(
        "Panel settings: pre-roll {}s, minimum video {}s",
        panel.pre_roll_secs(),
        panel.min_video_secs()
    );

    let monitor = ResourceMonitor::new(
        Box::new(DiskProbe::new()),
        PathBuf::from(&recorder_config.storage.volatile_path),
        recorder_config.storage.min_free_bytes,
    );

    let indicator = Arc::new(QueueIndicator::new(recorder_config.recorder.indicator_queue));
    let indicator_queue = indicator.queue();

    // Recording engine
    let fps = recorder_config.recorder.fps;
    let engine_config = EngineConfig {
        detection_threshold: recorder_config.recorder.detection_threshold,
        pre_roll: Duration::from_secs(panel.pre_roll_secs()),
        min_video: Duration::from_secs(panel.min_video_secs()),
        fps,
    };
    let watch_list = WatchList::new(recorder_config.recorder.watch_list.clone());
    let detection_log = recorder_config
        .recorder
        .detection_log
        .as_ref()
        .map(PathBuf::from);

    let mut engine = RecorderEngine::new(
        engine_config,
        watch_list,
        Box::new(StubFeed),
        Box::new(SegmentFileSink::new(volatile.clone(), fps)),
        indicator,
        monitor,
        persistent.clone(),
        detection_log,
    );
    let manual_trigger = engine.manual_trigger_handle();
    let recording_active = engine.recording_active_handle();

    // Storage mover
    let mover = Arc::new(StorageMover::new(
        volatile,
        persistent,
        PathBuf::from(&recorder_config.storage.removable_base),
        recorder_config.storage.removable_used_threshold,
        Arc::new(DiskProbe::new()),
        recording_active,
    ));
    tokio::spawn(mover.clone().run(recorder_config.storage.mover_interval()));

    // Control interface
    let (_control_handle, control_interface) =
        ControlInterface::channel(mover.clone(), manual_trigger, 16);
    tokio::spawn(control_interface.run());

    // Indicator drain; a deployment with an activity LED replaces this.
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(100));
        loop {
            ticker.tick().await;
            while let Some(event) = indicator_queue.pop() {
                info!("Status: {:?}", event);
            }
        }
    });

    // Tick loop at frame cadence. Frames arrive here from the camera
    // encoder; this build carries a synthetic feed in its place.
    let frame_interval = Duration::from_millis(1000 / fps.max(1) as u64);
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut frame_counter: u64 = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = Frame::new(frame_counter.to_be_bytes().to_vec());
                frame_counter = frame_counter.wrapping_add(1);
                engine.tick(frame, Instant::now()).await;
            }
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    // Finish any open segment, then run one final promotion pass so the
    // volatile tier is drained before power-off.
    engine.shutdown().await;
    mover.run_interval().await;

    info!("Edgecam Recorder shut down successfully");
    Ok(())
}
