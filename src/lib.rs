//! # stillcut
//!
//! Cut long fixed-camera recordings down to the moments where something
//! happens.
//!
//! `stillcut` reads a recording, normalizes its frame rate, watches the
//! normalized stream for visual change, and writes each active stretch out
//! as its own clip with quiet padding on both sides, powered by FFmpeg via
//! the [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use stillcut::{ClipCutter, CutOptions};
//!
//! let cutter = ClipCutter::new(CutOptions::new());
//! let clips = cutter.process_file("2021-03-01T13:05:00-3-r30.ogv", "clips").unwrap();
//! for clip in &clips {
//!     println!("{} ({:.1} s)", clip.path.display(), clip.duration.as_secs_f64());
//! }
//! ```
//!
//! ### Tuning
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use stillcut::{ClipCutter, CutOptions, DetectorMode};
//!
//! let options = CutOptions::new()
//!     .with_target_rate(10)
//!     .with_pre_roll(Duration::from_secs(5))
//!     .with_detector_mode(DetectorMode::FrameDifference);
//! let cutter = ClipCutter::new(options);
//! ```
//!
//! ## How it works
//!
//! - **Normalization** — [`FrameResampler`] converts the source's native
//!   frame rate to a fixed target rate, blending neighbouring frames where
//!   the sampling grid lands between them.
//! - **Detection** — [`ChangeDetector`] scores each normalized frame against
//!   a running background model (or the previous frame) and flags the ones
//!   that changed.
//! - **Recording** — [`ClipRecorder`] keeps a backlog of recent frames; when
//!   a flagged frame arrives it opens a clip, replays the backlog as
//!   pre-roll, and records until the scene stays quiet for the same window.
//!   Clips with too little activity are dropped.
//!
//! ## File names
//!
//! Recordings carry their own placement in time:
//! `{start}-{channel}-r{rate}.{ext}`, e.g. `2021-03-01T13:05:00-3-r30.ogv`.
//! Clips are named `{start}-{channel:02}-r{rate}-d{duration:06}.{ext}` with
//! the duration in centiseconds; the `-d` suffix is only added once a clip
//! is complete, so interrupted runs can tell finished clips from partial
//! ones and resume without re-cutting. See [`SourceVideo`] and [`ClipName`].
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod backlog;
pub mod clip;
pub mod cutter;
pub mod detector;
pub mod error;
pub mod ffmpeg;
pub mod options;
pub mod progress;
pub mod recorder;
pub mod resampler;
pub mod sink;
pub mod source;

pub use backlog::Backlog;
pub use clip::{ClipName, ClipSummary, SourceVideo};
pub use cutter::{ClipCutter, archive_processed};
pub use detector::{ChangeDetector, DetectorMode, DetectorOptions};
pub use error::StillcutError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use options::CutOptions;
pub use progress::{ProgressCallback, ProgressInfo};
pub use recorder::{ClipRecorder, RecorderEvent};
pub use resampler::{FrameResampler, ResampledFrame, SkipOutcome};
pub use sink::{ClipCodec, ClipEncoder, ClipEncoderFactory, SinkFactory, SinkSpec, VideoSink};
pub use source::{FrameSource, VideoSource};
