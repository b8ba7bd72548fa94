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

//! Segment container: lightweight framing for encoded video segments
//!
//! # Format Structure
//!
//! - 16-byte header: magic `ECSG`, format version (u16), frame rate (u16),
//!   frame count (u64, patched on close)
//! - Length-prefixed frames: u32 payload length followed by the encoder's
//!   opaque bytes
//!
//! Duration is `frame_count / fps`, derived from the header on demand and
//! never stored anywhere else. Concatenating containers in id order
//! concatenates their timelines.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

const MAGIC: &[u8; 4] = b"ECSG";
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: u64 = 16;

/// Writer for one segment container file.
///
/// Frames are appended as they arrive; `finish()` patches the frame count
/// into the header and flushes. A file that never reaches `finish()` keeps
/// a zero count and reads back as an empty segment.
pub struct SegmentWriter {
    writer: BufWriter<File>,
    fps: u16,
    frame_count: u64,
}

impl SegmentWriter {
    pub fn create(path: &Path, fps: u16) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create segment file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&fps.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            writer,
            fps,
            frame_count: 0,
        })
    }

    pub fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let len = u32::try_from(payload.len()).context("Frame payload exceeds u32 length")?;
        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(payload)?;
        self.frame_count += 1;
        Ok(())
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn fps(&self) -> u16 {
        self.fps
    }

    /// Patch the frame count into the header and flush to disk.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush()?;
        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| e.into_error())
            .context("Failed to flush segment")?;
        file.seek(SeekFrom::Start(8))?;
        file.write_all(&self.frame_count.to_le_bytes())?;
        file.sync_all()?;
        debug!("Finished segment container with {} frames", self.frame_count);
        Ok(self.frame_count)
    }
}

/// Reader for a segment container file.
pub struct SegmentReader {
    reader: BufReader<File>,
    fps: u16,
    frame_count: u64,
}

impl SegmentReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open segment file: {}", path.display()))?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            bail!("Not a segment container: {}", path.display());
        }

        let mut version = [0u8; 2];
        reader.read_exact(&mut version)?;
        let version = u16::from_le_bytes(version);
        if version != FORMAT_VERSION {
            bail!("Unsupported container version {}", version);
        }

        let mut fps = [0u8; 2];
        reader.read_exact(&mut fps)?;
        let fps = u16::from_le_bytes(fps);

        let mut count = [0u8; 8];
        reader.read_exact(&mut count)?;
        let frame_count = u64::from_le_bytes(count);

        Ok(Self {
            reader,
            fps,
            frame_count,
        })
    }

    pub fn fps(&self) -> u16 {
        self.fps
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn duration_secs(&self) -> f64 {
        if self.fps == 0 {
            return 0.0;
        }
        self.frame_count as f64 / self.fps as f64
    }

    /// Read the next frame payload, or `None` at end of file.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut len = [0u8; 4];
        match self.reader.read_exact(&mut len) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_le_bytes(len) as usize;
        let mut payload = vec![0u8; len];
        self.reader
            .read_exact(&mut payload)
            .context("Truncated frame in segment container")?;
        Ok(Some(payload))
    }
}

/// Duration in seconds of the container at `path`, from its header.
pub fn probe_duration(path: &Path) -> Result<f64> {
    Ok(SegmentReader::open(path)?.duration_secs())
}

/// Concatenate `sources` into one archival container at `dest`,
/// in the order given. Frame rate is taken from the first source.
pub fn concatenate(sources: &[&Path], dest: &Path) -> Result<u64> {
    let Some(first) = sources.first() else {
        bail!("Nothing to concatenate");
    };

    let fps = SegmentReader::open(first)?.fps();
    let mut writer = SegmentWriter::create(dest, fps)?;

    for source in sources {
        let mut reader = SegmentReader::open(source)?;
        while let Some(frame) = reader.next_frame()? {
            writer.write_frame(&frame)?;
        }
    }

    writer.finish()
}
