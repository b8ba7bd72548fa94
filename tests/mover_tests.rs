// Integration tests for the tiered storage mover: promotion between
// tiers, move idempotence, capacity gating, and consolidation.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use edgecam_recorder::container::{SegmentReader, SegmentWriter};
use edgecam_recorder::monitor::SpaceProbe;
use edgecam_recorder::mover::StorageMover;
use edgecam_recorder::segment::{SegmentId, SegmentStore, TierLayout};

const FPS: u16 = 10;

struct FixedProbe {
    used: f64,
}

impl SpaceProbe for FixedProbe {
    fn available_bytes(&self, _path: &Path) -> Option<u64> {
        Some(u64::MAX)
    }
    fn used_fraction(&self, _path: &Path) -> Option<f64> {
        Some(self.used)
    }
}

struct Fixture {
    _temp: TempDir,
    volatile: TierLayout,
    persistent: TierLayout,
    removable_base: PathBuf,
    recording: Arc<AtomicBool>,
    mover: StorageMover,
}

fn fixture_with_probe(used: f64) -> Fixture {
    let temp = TempDir::new().unwrap();
    let volatile = TierLayout::volatile(temp.path().join("shm"));
    let persistent = TierLayout::persistent(temp.path().join("home"));
    let removable_base = temp.path().join("media");
    volatile.ensure_dirs().unwrap();
    persistent.ensure_dirs().unwrap();
    std::fs::create_dir_all(&removable_base).unwrap();

    let recording = Arc::new(AtomicBool::new(false));
    let mover = StorageMover::new(
        volatile.clone(),
        persistent.clone(),
        removable_base.clone(),
        0.90,
        Arc::new(FixedProbe { used }),
        recording.clone(),
    );

    Fixture {
        _temp: temp,
        volatile,
        persistent,
        removable_base,
        recording,
        mover,
    }
}

fn fixture() -> Fixture {
    fixture_with_probe(0.5)
}

fn write_segment(layout: &TierLayout, id: &str, frames: &[&[u8]]) -> SegmentId {
    let id = SegmentId::parse(id).unwrap();
    let mut writer = SegmentWriter::create(&layout.video_path(&id), FPS).unwrap();
    for frame in frames {
        writer.write_frame(frame).unwrap();
    }
    writer.finish().unwrap();
    id
}

fn write_thumbnail(layout: &TierLayout, id: &SegmentId) {
    std::fs::write(layout.thumbnail_path(id), b"jpeg").unwrap();
}

fn mount_stick(fixture: &Fixture) -> TierLayout {
    let mount = fixture.removable_base.join("usb0");
    std::fs::create_dir_all(&mount).unwrap();
    TierLayout::removable(mount)
}

#[tokio::test]
async fn test_volatile_promotion_moves_segments() {
    let f = fixture();
    let a = write_segment(&f.volatile, "250829_100000", &[b"a1", b"a2"]);
    let b = write_segment(&f.volatile, "250829_100100", &[b"b1"]);

    let moved = f.mover.promote_volatile().await.unwrap();
    assert_eq!(moved, 2);

    // Source tier drained, destination holds both.
    assert!(SegmentStore::snapshot(&f.volatile).is_empty());
    assert!(f.persistent.video_path(&a).exists());
    assert!(f.persistent.video_path(&b).exists());

    // Payload survived the move intact.
    let mut reader = SegmentReader::open(&f.persistent.video_path(&a)).unwrap();
    assert_eq!(reader.next_frame().unwrap().unwrap(), b"a1");
    assert_eq!(reader.next_frame().unwrap().unwrap(), b"a2");
    assert!(reader.next_frame().unwrap().is_none());
}

#[tokio::test]
async fn test_volatile_promotion_skips_already_migrated() {
    let f = fixture();
    let id = write_segment(&f.volatile, "250829_100000", &[b"stale"]);
    // Same name already promoted earlier with different content.
    write_segment(&f.persistent, "250829_100000", &[b"canonical"]);

    let moved = f.mover.promote_volatile().await.unwrap();
    assert_eq!(moved, 0);

    // The destination copy is authoritative and untouched, the leftover
    // source is cleared.
    assert!(!f.volatile.video_path(&id).exists());
    let mut reader = SegmentReader::open(&f.persistent.video_path(&id)).unwrap();
    assert_eq!(reader.next_frame().unwrap().unwrap(), b"canonical");
}

#[tokio::test]
async fn test_promotion_is_idempotent_across_intervals() {
    let f = fixture();
    write_segment(&f.volatile, "250829_100000", &[b"x"]);

    assert_eq!(f.mover.promote_volatile().await.unwrap(), 1);
    assert_eq!(f.mover.promote_volatile().await.unwrap(), 0);
    assert_eq!(SegmentStore::snapshot(&f.persistent).len(), 1);
}

#[tokio::test]
async fn test_removable_promotion_requires_mounted_media() {
    let f = fixture();
    write_segment(&f.persistent, "250829_100000", &[b"x"]);

    // No mount under the removable base: promotion refuses.
    assert!(f.mover.promote_removable_all().await.is_err());
    assert_eq!(SegmentStore::snapshot(&f.persistent).len(), 1);
}

#[tokio::test]
async fn test_removable_promotion_moves_videos_and_thumbnails() {
    let f = fixture();
    let stick = mount_stick(&f);
    let id = write_segment(&f.persistent, "250829_100000", &[b"x"]);
    write_thumbnail(&f.persistent, &id);

    let moved = f.mover.promote_removable_all().await.unwrap();
    assert_eq!(moved, 2);

    assert!(stick.video_path(&id).exists());
    assert!(stick.thumbnail_path(&id).exists());
    assert!(!f.persistent.video_path(&id).exists());
    assert!(!f.persistent.thumbnail_path(&id).exists());
}

#[tokio::test]
async fn test_removable_promotion_includes_archives() {
    let f = fixture();
    let stick = mount_stick(&f);
    write_segment(&f.persistent, "250829_100000", &[b"a"]);
    write_segment(&f.persistent, "250829_110000", &[b"b"]);
    let archive_id = f.mover.consolidate().await.unwrap().unwrap();

    let moved = f.mover.promote_removable_all().await.unwrap();
    assert_eq!(moved, 1);
    assert!(stick.archive_path(&archive_id).exists());
    assert!(SegmentStore::archives(&f.persistent).is_empty());
}

#[tokio::test]
async fn test_removable_promotion_respects_capacity_gate() {
    let f = fixture_with_probe(0.95);
    mount_stick(&f);
    let id = write_segment(&f.persistent, "250829_100000", &[b"x"]);

    assert!(f.mover.promote_removable_all().await.is_err());
    // Nothing left the persistent tier.
    assert!(f.persistent.video_path(&id).exists());
}

#[tokio::test]
async fn test_removable_promotion_single_segment() {
    let f = fixture();
    let stick = mount_stick(&f);
    let kept = write_segment(&f.persistent, "250829_100000", &[b"keep"]);
    let moved_id = write_segment(&f.persistent, "250829_100100", &[b"go"]);
    write_thumbnail(&f.persistent, &moved_id);

    let moved = f.mover.promote_removable_one(&moved_id).await.unwrap();
    assert_eq!(moved, 2);

    assert!(stick.video_path(&moved_id).exists());
    assert!(f.persistent.video_path(&kept).exists());
    assert!(!stick.video_path(&kept).exists());
}

#[tokio::test]
async fn test_consolidate_merges_in_chronological_order() {
    let f = fixture();
    // One segment still on the volatile tier, two already promoted.
    write_segment(&f.volatile, "250829_120000", &[b"late1", b"late2"]);
    let first = write_segment(&f.persistent, "250829_100000", &[b"f1"]);
    write_segment(&f.persistent, "250829_110000", &[b"mid"]);
    write_thumbnail(&f.persistent, &first);
    write_thumbnail(&f.persistent, &SegmentId::parse("250829_110000").unwrap());

    let archive = f.mover.consolidate().await.unwrap().unwrap();
    assert_eq!(archive, first);

    // Constituents are gone; one marked archive remains with frames in
    // id order across all of them.
    assert!(SegmentStore::snapshot(&f.persistent).is_empty());
    let archives = SegmentStore::archives(&f.persistent);
    assert_eq!(archives.len(), 1);
    assert_eq!(archives[0].0, first);

    let mut reader = SegmentReader::open(&archives[0].1).unwrap();
    let mut frames = Vec::new();
    while let Some(frame) = reader.next_frame().unwrap() {
        frames.push(frame);
    }
    assert_eq!(frames, vec![b"f1".to_vec(), b"mid".to_vec(), b"late1".to_vec(), b"late2".to_vec()]);

    // Only the first constituent's thumbnail survives, and no residual
    // constituent file is left anywhere.
    let thumbs = SegmentStore::thumbnails(&f.persistent);
    assert_eq!(thumbs.len(), 1);
    assert_eq!(thumbs[0].0, first);
    assert!(SegmentStore::snapshot(&f.volatile).is_empty());
    let leftovers: Vec<_> = std::fs::read_dir(f.persistent.videos_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(leftovers, vec!["250829_100000f.mp4".to_string()]);
}

#[tokio::test]
async fn test_consolidate_excludes_prior_archives() {
    let f = fixture();
    write_segment(&f.persistent, "250829_100000", &[b"a"]);
    write_segment(&f.persistent, "250829_110000", &[b"b"]);
    f.mover.consolidate().await.unwrap().unwrap();

    // New segments arrive after the first consolidation.
    let later = write_segment(&f.persistent, "250829_120000", &[b"c"]);
    write_segment(&f.persistent, "250829_130000", &[b"d"]);

    let second = f.mover.consolidate().await.unwrap().unwrap();
    assert_eq!(second, later);

    // Two independent archives; the earlier one was not swallowed.
    let archives = SegmentStore::archives(&f.persistent);
    assert_eq!(archives.len(), 2);
    let mut reader = SegmentReader::open(&archives[0].1).unwrap();
    assert_eq!(reader.next_frame().unwrap().unwrap(), b"a");
    assert_eq!(reader.next_frame().unwrap().unwrap(), b"b");
    assert!(reader.next_frame().unwrap().is_none());
}

#[tokio::test]
async fn test_consolidate_single_segment_still_archives() {
    let f = fixture();
    let id = write_segment(&f.persistent, "250829_100000", &[b"only"]);

    let archive = f.mover.consolidate().await.unwrap().unwrap();
    assert_eq!(archive, id);
    assert!(SegmentStore::snapshot(&f.persistent).is_empty());
    assert!(f.persistent.archive_path(&id).exists());
}

#[tokio::test]
async fn test_consolidate_with_no_segments_is_a_no_op() {
    let f = fixture();
    assert!(f.mover.consolidate().await.unwrap().is_none());
}

#[tokio::test]
async fn test_admin_operations_reject_while_recording() {
    let f = fixture();
    mount_stick(&f);
    let id = write_segment(&f.persistent, "250829_100000", &[b"x"]);
    write_segment(&f.volatile, "250829_110000", &[b"y"]);

    f.recording.store(true, Ordering::Release);
    assert!(f.mover.consolidate().await.is_err());
    assert!(f.mover.delete_all().await.is_err());
    assert!(f.mover.delete_segment(&id).await.is_err());
    assert!(f.mover.promote_removable_all().await.is_err());
    assert!(f.mover.promote_removable_one(&id).await.is_err());

    // Nothing moved or disappeared.
    assert_eq!(SegmentStore::snapshot(&f.volatile).len(), 1);
    assert_eq!(SegmentStore::snapshot(&f.persistent).len(), 1);

    // Once the session ends the same operations go through.
    f.recording.store(false, Ordering::Release);
    assert!(f.mover.consolidate().await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_segment_clears_video_and_thumbnail() {
    let f = fixture();
    let id = write_segment(&f.persistent, "250829_100000", &[b"x"]);
    write_thumbnail(&f.persistent, &id);
    let survivor = write_segment(&f.persistent, "250829_110000", &[b"y"]);

    let removed = f.mover.delete_segment(&id).await.unwrap();
    assert_eq!(removed, 2);
    assert!(!f.persistent.video_path(&id).exists());
    assert!(f.persistent.video_path(&survivor).exists());

    // Deleting again is a no-op, not an error.
    assert_eq!(f.mover.delete_segment(&id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_all_clears_both_local_tiers() {
    let f = fixture();
    write_segment(&f.volatile, "250829_100000", &[b"a"]);
    let id = write_segment(&f.persistent, "250829_110000", &[b"b"]);
    write_thumbnail(&f.persistent, &id);

    let removed = f.mover.delete_all().await.unwrap();
    assert_eq!(removed, 3);
    assert!(SegmentStore::snapshot(&f.volatile).is_empty());
    assert!(SegmentStore::snapshot(&f.persistent).is_empty());
    assert!(SegmentStore::thumbnails(&f.persistent).is_empty());
}
