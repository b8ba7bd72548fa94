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

// Segment catalog: timestamp-derived ids, tier layout, directory snapshots

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const VIDEO_EXT: &str = "mp4";
pub const THUMBNAIL_EXT: &str = "jpg";

const ID_FORMAT: &str = "%y%m%d_%H%M%S";
const ARCHIVE_MARKER: &str = "f";

/// Timestamp-derived segment key, e.g. `250829_143052`.
///
/// Lexicographic order equals chronological order, which the mover and
/// consolidation rely on. One id names both the video and its thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(String);

impl SegmentId {
    pub fn from_timestamp(ts: NaiveDateTime) -> Self {
        Self(ts.format(ID_FORMAT).to_string())
    }

    /// Parse a file stem back into an id. Rejects anything that is not a
    /// `YYMMDD_HHMMSS` stamp, which also filters out in-progress
    /// consolidation outputs (`{id}f`).
    pub fn parse(stem: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(stem, ID_FORMAT)
            .ok()
            .map(|_| Self(stem.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn video_file(&self) -> String {
        format!("{}.{}", self.0, VIDEO_EXT)
    }

    pub fn thumbnail_file(&self) -> String {
        format!("{}.{}", self.0, THUMBNAIL_EXT)
    }

    /// Filename of a consolidated archive. The `f` marker keeps the stem
    /// unparseable as an id, so archives never re-enter consolidation.
    pub fn archive_file(&self) -> String {
        format!("{}{}.{}", self.0, ARCHIVE_MARKER, VIDEO_EXT)
    }

    /// Parse an archive stem (`{id}f`) back to the id it was named after.
    pub fn parse_archive(stem: &str) -> Option<Self> {
        Self::parse(stem.strip_suffix(ARCHIVE_MARKER)?)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage tier with distinct durability and removability characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Volatile,
    Persistent,
    Removable,
}

impl Tier {
    pub fn name(&self) -> &'static str {
        match self {
            Tier::Volatile => "volatile",
            Tier::Persistent => "persistent",
            Tier::Removable => "removable",
        }
    }
}

/// A completed recording's durable artifact as seen on one tier.
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: SegmentId,
    pub tier: Tier,
    pub video_path: PathBuf,
}

impl Segment {
    /// Duration in seconds, derived from the container header on demand.
    pub fn duration_secs(&self) -> Result<f64> {
        crate::container::probe_duration(&self.video_path)
    }
}

/// Directory layout of one storage tier.
///
/// The volatile tier is flat (live recording target); persistent and
/// removable tiers mirror the `Pictures/` + `Videos/` split.
#[derive(Debug, Clone)]
pub struct TierLayout {
    kind: Tier,
    root: PathBuf,
}

impl TierLayout {
    pub fn volatile(root: impl Into<PathBuf>) -> Self {
        Self {
            kind: Tier::Volatile,
            root: root.into(),
        }
    }

    pub fn persistent(root: impl Into<PathBuf>) -> Self {
        Self {
            kind: Tier::Persistent,
            root: root.into(),
        }
    }

    pub fn removable(root: impl Into<PathBuf>) -> Self {
        Self {
            kind: Tier::Removable,
            root: root.into(),
        }
    }

    pub fn kind(&self) -> Tier {
        self.kind
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn videos_dir(&self) -> PathBuf {
        match self.kind {
            Tier::Volatile => self.root.clone(),
            _ => self.root.join("Videos"),
        }
    }

    pub fn pictures_dir(&self) -> PathBuf {
        match self.kind {
            Tier::Volatile => self.root.clone(),
            _ => self.root.join("Pictures"),
        }
    }

    pub fn video_path(&self, id: &SegmentId) -> PathBuf {
        self.videos_dir().join(id.video_file())
    }

    pub fn archive_path(&self, id: &SegmentId) -> PathBuf {
        self.videos_dir().join(id.archive_file())
    }

    pub fn thumbnail_path(&self, id: &SegmentId) -> PathBuf {
        self.pictures_dir().join(id.thumbnail_file())
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.videos_dir())
            .with_context(|| format!("Failed to create {}", self.videos_dir().display()))?;
        std::fs::create_dir_all(self.pictures_dir())
            .with_context(|| format!("Failed to create {}", self.pictures_dir().display()))?;
        Ok(())
    }
}

/// Append-only catalog of segments, discovered by directory listing.
///
/// The filesystem is the source of truth; callers take one snapshot per
/// mover interval and operate against that list.
pub struct SegmentStore;

impl SegmentStore {
    /// Snapshot the completed segments on a tier, in chronological order.
    pub fn snapshot(layout: &TierLayout) -> Vec<Segment> {
        let mut segments: Vec<Segment> = Self::scan(&layout.videos_dir(), VIDEO_EXT)
            .into_iter()
            .map(|(id, video_path)| Segment {
                id,
                tier: layout.kind(),
                video_path,
            })
            .collect();
        segments.sort_by(|a, b| a.id.cmp(&b.id));
        segments
    }

    /// Snapshot the thumbnails on a tier, in chronological order.
    pub fn thumbnails(layout: &TierLayout) -> Vec<(SegmentId, PathBuf)> {
        let mut thumbs = Self::scan(&layout.pictures_dir(), THUMBNAIL_EXT);
        thumbs.sort_by(|a, b| a.0.cmp(&b.0));
        thumbs
    }

    /// Snapshot consolidated archives on a tier, in chronological order
    /// of the id each archive was named after.
    pub fn archives(layout: &TierLayout) -> Vec<(SegmentId, PathBuf)> {
        let entries = match std::fs::read_dir(layout.videos_dir()) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut archives: Vec<(SegmentId, PathBuf)> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(VIDEO_EXT) {
                    return None;
                }
                let stem = path.file_stem()?.to_str()?;
                let id = SegmentId::parse_archive(stem)?;
                Some((id, path))
            })
            .collect();
        archives.sort_by(|a, b| a.0.cmp(&b.0));
        archives
    }

    fn scan(dir: &Path, ext: &str) -> Vec<(SegmentId, PathBuf)> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot scan {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                    return None;
                }
                let stem = path.file_stem()?.to_str()?;
                let id = SegmentId::parse(stem)?;
                Some((id, path))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, 29)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_id_format_round_trip() {
        let id = SegmentId::from_timestamp(ts(14, 30, 52));
        assert_eq!(id.as_str(), "250829_143052");
        assert_eq!(SegmentId::parse("250829_143052"), Some(id));
    }

    #[test]
    fn test_id_rejects_non_timestamps() {
        assert_eq!(SegmentId::parse("notanid"), None);
        assert_eq!(SegmentId::parse("250829_143052f"), None);
        assert_eq!(SegmentId::parse(""), None);
    }

    #[test]
    fn test_archive_stem_round_trip() {
        let id = SegmentId::from_timestamp(ts(14, 30, 52));
        assert_eq!(id.archive_file(), "250829_143052f.mp4");
        assert_eq!(SegmentId::parse_archive("250829_143052f"), Some(id));
        assert_eq!(SegmentId::parse_archive("250829_143052"), None);
    }

    #[test]
    fn test_id_order_is_chronological() {
        let early = SegmentId::from_timestamp(ts(9, 0, 0));
        let late = SegmentId::from_timestamp(ts(17, 5, 3));
        assert!(early < late);
    }

    #[test]
    fn test_layout_paths() {
        let volatile = TierLayout::volatile("/run/shm");
        let persistent = TierLayout::persistent("/home/pi");
        let id = SegmentId::from_timestamp(ts(12, 0, 0));

        assert_eq!(
            volatile.video_path(&id),
            PathBuf::from("/run/shm/250829_120000.mp4")
        );
        assert_eq!(
            persistent.video_path(&id),
            PathBuf::from("/home/pi/Videos/250829_120000.mp4")
        );
        assert_eq!(
            persistent.thumbnail_path(&id),
            PathBuf::from("/home/pi/Pictures/250829_120000.jpg")
        );
    }

    #[test]
    fn test_snapshot_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        let layout = TierLayout::volatile(temp.path());

        std::fs::write(temp.path().join("250829_120010.mp4"), b"b").unwrap();
        std::fs::write(temp.path().join("250829_120001.mp4"), b"a").unwrap();
        std::fs::write(temp.path().join("250829_120001f.mp4"), b"tmp").unwrap();
        std::fs::write(temp.path().join("notes.txt"), b"x").unwrap();

        let segments = SegmentStore::snapshot(&layout);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].id.as_str(), "250829_120001");
        assert_eq!(segments[1].id.as_str(), "250829_120010");

        // The archive shows up only in the archive listing.
        let archives = SegmentStore::archives(&layout);
        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].0.as_str(), "250829_120001");
    }

    #[test]
    fn test_snapshot_missing_dir_is_empty() {
        let layout = TierLayout::persistent("/nonexistent/path/for/test");
        assert!(SegmentStore::snapshot(&layout).is_empty());
    }
}
