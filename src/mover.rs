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

//! Tiered storage lifecycle manager
//!
//! Promotes completed segments volatile -> persistent -> removable.
//! Promotion is monotonic and idempotent: a same-named destination file
//! means the segment already migrated, and every move follows
//! copy, verify destination, then delete source, so a crash at any step
//! leaves the source intact and the move retryable by filename.
//!
//! The mover runs on its own interval and stays off the filesystem while
//! a recording is in flight to keep I/O away from the live sink.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{RecorderError, Result};
use crate::monitor::SpaceProbe;
use crate::segment::{SegmentId, SegmentStore, TierLayout};

/// Outcome of a single file move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    /// Destination already carried the filename; treated as migrated.
    AlreadyPresent,
}

/// Move `src` to `dst` with the copy-verify-delete discipline.
///
/// Never leaves a state where both files are absent, or where the source
/// is gone while the destination copy is incomplete.
pub async fn move_file(src: &Path, dst: &Path) -> Result<MoveOutcome> {
    if fs::try_exists(dst).await? {
        debug!("Skipping {}, already at destination", src.display());
        return Ok(MoveOutcome::AlreadyPresent);
    }

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    let src_len = fs::metadata(src).await?.len();
    fs::copy(src, dst).await?;
    finish_move(src, dst, src_len).await
}

/// Confirm the destination copy, then and only then remove the source.
async fn finish_move(src: &Path, dst: &Path, expected_len: u64) -> Result<MoveOutcome> {
    match fs::metadata(dst).await {
        Ok(meta) if meta.len() == expected_len => {}
        _ => {
            // Drop the partial copy so the skip-if-present check cannot
            // mistake it for a completed migration next interval.
            let _ = fs::remove_file(dst).await;
            return Err(RecorderError::MoveVerificationFailure {
                dst: dst.to_path_buf(),
            });
        }
    }

    fs::remove_file(src).await?;
    Ok(MoveOutcome::Moved)
}

pub struct StorageMover {
    volatile: TierLayout,
    persistent: TierLayout,
    removable_base: PathBuf,
    removable_used_threshold: f64,
    probe: Arc<dyn SpaceProbe>,
    recording_active: Arc<AtomicBool>,
}

impl StorageMover {
    pub fn new(
        volatile: TierLayout,
        persistent: TierLayout,
        removable_base: PathBuf,
        removable_used_threshold: f64,
        probe: Arc<dyn SpaceProbe>,
        recording_active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            volatile,
            persistent,
            removable_base,
            removable_used_threshold,
            probe,
            recording_active,
        }
    }

    /// Fixed-interval promotion loop. Never returns.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_interval().await;
        }
    }

    /// One promotion pass, deferred entirely while a recording is in
    /// flight. Per-segment failures are skipped and retried next
    /// interval; nothing here is fatal.
    pub async fn run_interval(&self) {
        if self.recording_active.load(Ordering::Acquire) {
            debug!("Recording in progress, mover interval skipped");
            return;
        }

        match self.promote_volatile().await {
            Ok(0) => {}
            Ok(n) => info!("Promoted {} segment file(s) to persistent tier", n),
            Err(e) => warn!("Volatile promotion pass failed: {}", e),
        }

        match self.promote_removable_all().await {
            Ok(0) => {}
            Ok(n) => info!("Promoted {} file(s) to removable tier", n),
            // Absent or full media suppresses promotion; not operator-facing.
            Err(RecorderError::StorageUnavailable(_))
            | Err(RecorderError::CapacityExceeded { .. }) => {}
            Err(e) => warn!("Removable promotion pass failed: {}", e),
        }
    }

    /// Move every completed segment file off the volatile tier.
    pub async fn promote_volatile(&self) -> Result<usize> {
        let segments = SegmentStore::snapshot(&self.volatile);
        let mut moved = 0;

        for segment in segments {
            let dst = self.persistent.video_path(&segment.id);
            match move_file(&segment.video_path, &dst).await {
                Ok(MoveOutcome::Moved) => moved += 1,
                Ok(MoveOutcome::AlreadyPresent) => {
                    // Same name at destination: already migrated. Clear
                    // the leftover source so it is not re-examined.
                    if let Err(e) = fs::remove_file(&segment.video_path).await {
                        warn!("Cannot remove migrated source: {}", e);
                    }
                }
                Err(e) => warn!("Promotion of {} skipped: {}", segment.id, e),
            }
        }

        Ok(moved)
    }

    /// The mounted removable tier, polled fresh on every call since
    /// media may appear or disappear at any time.
    pub async fn removable_layout(&self) -> Option<TierLayout> {
        let mut entries = fs::read_dir(&self.removable_base).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_dir() {
                return Some(TierLayout::removable(path));
            }
        }
        None
    }

    /// Admin-facing operations refuse to run while a session holds the
    /// capture sink, so they never contend with the live recording.
    fn ensure_quiescent(&self) -> Result<()> {
        if self.recording_active.load(Ordering::Acquire) {
            return Err(RecorderError::RecordingInFlight);
        }
        Ok(())
    }

    async fn removable_checked(&self) -> Result<TierLayout> {
        let layout = self
            .removable_layout()
            .await
            .ok_or_else(|| RecorderError::StorageUnavailable(self.removable_base.clone()))?;

        let used = self.probe.used_fraction(layout.root()).unwrap_or(1.0);
        if used >= self.removable_used_threshold {
            return Err(RecorderError::CapacityExceeded {
                tier: "removable".to_string(),
                used_fraction: used,
            });
        }
        Ok(layout)
    }

    /// Promote every persistent-tier segment and thumbnail to removable.
    pub async fn promote_removable_all(&self) -> Result<usize> {
        self.ensure_quiescent()?;
        let removable = self.removable_checked().await?;
        let mut moved = 0;

        for segment in SegmentStore::snapshot(&self.persistent) {
            let dst = removable.video_path(&segment.id);
            match move_file(&segment.video_path, &dst).await {
                Ok(MoveOutcome::Moved) => moved += 1,
                Ok(MoveOutcome::AlreadyPresent) => {}
                Err(e) => warn!("Removable promotion of {} skipped: {}", segment.id, e),
            }
        }

        for (id, archive) in SegmentStore::archives(&self.persistent) {
            let dst = removable.archive_path(&id);
            match move_file(&archive, &dst).await {
                Ok(MoveOutcome::Moved) => moved += 1,
                Ok(MoveOutcome::AlreadyPresent) => {}
                Err(e) => warn!("Removable promotion of archive {} skipped: {}", id, e),
            }
        }

        for (id, thumb) in SegmentStore::thumbnails(&self.persistent) {
            let dst = removable.thumbnail_path(&id);
            match move_file(&thumb, &dst).await {
                Ok(MoveOutcome::Moved) => moved += 1,
                Ok(MoveOutcome::AlreadyPresent) => {}
                Err(e) => warn!("Removable promotion of {} skipped: {}", id, e),
            }
        }

        Ok(moved)
    }

    /// Promote one segment (video plus thumbnail) to removable.
    pub async fn promote_removable_one(&self, id: &SegmentId) -> Result<usize> {
        self.ensure_quiescent()?;
        let removable = self.removable_checked().await?;
        let mut moved = 0;

        let video = self.persistent.video_path(id);
        if fs::try_exists(&video).await? {
            if move_file(&video, &removable.video_path(id)).await? == MoveOutcome::Moved {
                moved += 1;
            }
        }

        let thumb = self.persistent.thumbnail_path(id);
        if fs::try_exists(&thumb).await? {
            if move_file(&thumb, &removable.thumbnail_path(id)).await? == MoveOutcome::Moved {
                moved += 1;
            }
        }

        Ok(moved)
    }

    /// Concatenate the current run of completed segments into one
    /// archival file named after the first constituent, keeping only that
    /// segment's thumbnail. Earlier archives (already carrying the `f`
    /// marker) are left alone and never re-consolidated. Returns the
    /// archive id, or `None` when there is nothing to consolidate.
    pub async fn consolidate(&self) -> Result<Option<SegmentId>> {
        self.ensure_quiescent()?;

        // Pull any stragglers off the volatile tier first so the archive
        // covers everything recorded so far.
        self.promote_volatile().await?;

        let segments = SegmentStore::snapshot(&self.persistent);
        if segments.is_empty() {
            return Ok(None);
        }

        let first_id = segments[0].id.clone();
        let sources: Vec<PathBuf> = segments.iter().map(|s| s.video_path.clone()).collect();

        // The marker stem is unparseable as an id, so a crash mid-build
        // leaves a file no segment scan picks up, and a retry simply
        // rebuilds it from the still-present constituents.
        let archive = self.persistent.archive_path(&first_id);

        let archive_for_task = archive.clone();
        let sources_for_task = sources.clone();
        tokio::task::spawn_blocking(move || {
            let refs: Vec<&Path> = sources_for_task.iter().map(|p| p.as_path()).collect();
            crate::container::concatenate(&refs, &archive_for_task)
        })
        .await
        .map_err(|e| RecorderError::Consolidation {
            reason: e.to_string(),
        })?
        .map_err(|e| RecorderError::Consolidation {
            reason: e.to_string(),
        })?;

        if !fs::try_exists(&archive).await? {
            return Err(RecorderError::MoveVerificationFailure { dst: archive });
        }

        // Output confirmed present: now the constituents may go.
        for source in &sources {
            fs::remove_file(source).await?;
        }

        for (id, thumb) in SegmentStore::thumbnails(&self.persistent) {
            if id != first_id {
                if let Err(e) = fs::remove_file(&thumb).await {
                    warn!("Cannot remove constituent thumbnail {}: {}", id, e);
                }
            }
        }

        info!(
            "Consolidated {} segments into archive {}",
            sources.len(),
            first_id
        );
        Ok(Some(first_id))
    }

    /// Delete one segment's video and thumbnail from the local tiers.
    /// Missing files are tolerated.
    pub async fn delete_segment(&self, id: &SegmentId) -> Result<usize> {
        self.ensure_quiescent()?;
        let mut removed = 0;
        for path in [
            self.volatile.video_path(id),
            self.persistent.video_path(id),
            self.persistent.thumbnail_path(id),
        ] {
            if fs::try_exists(&path).await? {
                fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Deleted segment {}", id);
        }
        Ok(removed)
    }

    /// Administrative bulk delete of every segment and thumbnail on the
    /// local tiers. Never triggered automatically.
    pub async fn delete_all(&self) -> Result<usize> {
        self.ensure_quiescent()?;
        let mut removed = 0;

        for segment in SegmentStore::snapshot(&self.volatile)
            .into_iter()
            .chain(SegmentStore::snapshot(&self.persistent))
        {
            fs::remove_file(&segment.video_path).await?;
            removed += 1;
        }

        for (_, archive) in SegmentStore::archives(&self.persistent) {
            fs::remove_file(&archive).await?;
            removed += 1;
        }

        for (_, thumb) in SegmentStore::thumbnails(&self.persistent) {
            fs::remove_file(&thumb).await?;
            removed += 1;
        }

        info!("Deleted all segments ({} files)", removed);
        Ok(removed)
    }
}
