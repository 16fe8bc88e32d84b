//! Shared fixtures: synthetic frame sources and an in-memory clip sink.
//!
//! The sink still creates real files in the output directory so that the
//! recorder's rename and delete steps operate on something tangible.

#![allow(dead_code)]

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use image::{Rgb, RgbImage};
use stillcut::{
    FrameSource, ResampledFrame, SinkFactory, SinkSpec, SourceVideo, StillcutError, VideoSink,
};

pub const DARK: u8 = 20;
pub const BRIGHT: u8 = 200;

/// Uniform gray 4x4 frame.
pub fn solid(level: u8) -> RgbImage {
    RgbImage::from_pixel(4, 4, Rgb([level, level, level]))
}

/// A normalized frame as the resampler would stamp it.
pub fn frame(index: u64, rate: u32) -> ResampledFrame {
    ResampledFrame {
        image: solid(0),
        index,
        elapsed: Duration::from_secs_f64(index as f64 / f64::from(rate)),
    }
}

/// Fixed-camera footage that is uniformly dark except for the `active`
/// stretch, where a bright vertical bar scrolls 4 px per frame. The motion
/// survives frame blending, so consecutive normalized frames keep differing
/// for as long as the stretch lasts.
pub fn scene_frames(count: usize, active: Range<usize>) -> Vec<RgbImage> {
    let (width, height) = (64u32, 48u32);
    (0..count)
        .map(|index| {
            let mut image = RgbImage::from_pixel(width, height, Rgb([DARK, DARK, DARK]));
            if active.contains(&index) {
                let bar = (index as u32 * 4) % width;
                for y in 0..height {
                    for step in 0..16 {
                        image.put_pixel((bar + step) % width, y, Rgb([BRIGHT, BRIGHT, BRIGHT]));
                    }
                }
            }
            image
        })
        .collect()
}

/// The recording every test pretends to cut: channel 3, declared 30 fps,
/// started 2021-03-01 13:05:00.
pub fn test_video() -> SourceVideo {
    SourceVideo {
        path: PathBuf::from("2021-03-01T13:05:00-3-r30.ogv"),
        start: NaiveDate::from_ymd_opt(2021, 3, 1)
            .expect("date")
            .and_hms_opt(13, 5, 0)
            .expect("time"),
        channel: 3,
        declared_rate: 30,
    }
}

/// Frame source backed by a prepared frame list.
pub struct SyntheticSource {
    frames: Vec<RgbImage>,
    rate: f64,
    cursor: usize,
    fail_at: Option<usize>,
}

impl SyntheticSource {
    pub fn new(rate: f64, frames: Vec<RgbImage>) -> Self {
        Self {
            frames,
            rate,
            cursor: 0,
            fail_at: None,
        }
    }

    /// One uniform gray frame per level.
    pub fn from_levels(rate: f64, levels: &[u8]) -> Self {
        Self::new(rate, levels.iter().map(|&level| solid(level)).collect())
    }

    /// Fail the decode that reaches frame `index`, then recover.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }
}

impl FrameSource for SyntheticSource {
    fn native_rate(&self) -> f64 {
        self.rate
    }

    fn dimensions(&self) -> (u32, u32) {
        self.frames
            .first()
            .map(RgbImage::dimensions)
            .unwrap_or((0, 0))
    }

    fn frame_count(&self) -> u64 {
        self.frames.len() as u64
    }

    fn decode_next(&mut self) -> Result<Option<RgbImage>, StillcutError> {
        if self.fail_at == Some(self.cursor) {
            self.fail_at = None;
            self.cursor += 1;
            return Err(StillcutError::VideoDecodeError(
                "synthetic decode failure".to_string(),
            ));
        }
        let frame = self.frames.get(self.cursor).cloned();
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }

    fn skip_next(&mut self) -> Result<bool, StillcutError> {
        if self.cursor < self.frames.len() {
            self.cursor += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Sink that records appended frame indices and persists them on close, one
/// per line, at the path it was opened with.
pub struct MemorySink {
    path: PathBuf,
    indices: Vec<u64>,
    closed: bool,
}

impl VideoSink for MemorySink {
    fn append(&mut self, frame: &ResampledFrame) -> Result<(), StillcutError> {
        self.indices.push(frame.index);
        Ok(())
    }

    fn close(&mut self) -> Result<(), StillcutError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let lines: Vec<String> = self.indices.iter().map(u64::to_string).collect();
        fs::write(&self.path, lines.join("\n"))?;
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct MemorySinkFactory {
    pub opened: Arc<Mutex<Vec<PathBuf>>>,
}

impl SinkFactory for MemorySinkFactory {
    type Sink = MemorySink;

    fn open(&mut self, path: &Path, _spec: &SinkSpec) -> Result<MemorySink, StillcutError> {
        fs::write(path, b"")?;
        self.opened.lock().expect("opened paths").push(path.to_path_buf());
        Ok(MemorySink {
            path: path.to_path_buf(),
            indices: Vec::new(),
            closed: false,
        })
    }
}

/// Frame indices a [`MemorySink`] persisted at `path`.
pub fn written_indices(path: &Path) -> Vec<u64> {
    fs::read_to_string(path)
        .expect("read sink file")
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| line.parse().expect("index line"))
        .collect()
}
