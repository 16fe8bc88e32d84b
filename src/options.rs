//! Configuration for a cutting run.
//!
//! [`CutOptions`] bundles every knob the pipeline takes: target frame rate,
//! padding windows, clip codec and extension, detector tuning, and progress
//! reporting. Options are built fluently and passed to
//! [`ClipCutter::new`](crate::ClipCutter::new).
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use stillcut::{CutOptions, DetectorMode};
//!
//! let options = CutOptions::new()
//!     .with_target_rate(10)
//!     .with_pre_roll(Duration::from_secs(5))
//!     .with_detector_mode(DetectorMode::FrameDifference);
//!
//! assert_eq!(options.target_rate, 10);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use crate::detector::{DetectorMode, DetectorOptions};
use crate::progress::{NoOpProgress, ProgressCallback};
use crate::sink::ClipCodec;

/// Options controlling how recordings are cut into clips.
pub struct CutOptions {
    /// Frame rate every clip is normalized to.
    pub target_rate: u32,
    /// Quiet time included before the first significant frame of a clip.
    /// Also sets the quiet window that ends a clip.
    pub pre_roll: Duration,
    /// Clips whose significant span is shorter than this are discarded.
    pub min_clip_span: Duration,
    /// Codec clips are encoded with.
    pub codec: ClipCodec,
    /// Extension (and thus container) for clip files.
    pub clip_extension: String,
    /// Extension recordings are discovered by when scanning a directory.
    pub source_extension: String,
    /// Change detector tuning.
    pub detector: DetectorOptions,
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// How often to fire the progress callback (every N frames).
    pub(crate) batch_size: u64,
}

impl Debug for CutOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CutOptions")
            .field("target_rate", &self.target_rate)
            .field("pre_roll", &self.pre_roll)
            .field("min_clip_span", &self.min_clip_span)
            .field("codec", &self.codec)
            .field("clip_extension", &self.clip_extension)
            .field("source_extension", &self.source_extension)
            .field("detector", &self.detector)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for CutOptions {
    fn default() -> Self {
        Self {
            target_rate: 15,
            pre_roll: Duration::from_secs(10),
            min_clip_span: Duration::from_secs(5),
            codec: ClipCodec::default(),
            clip_extension: "avi".to_string(),
            source_extension: "ogv".to_string(),
            detector: DetectorOptions::default(),
            progress: Arc::new(NoOpProgress),
            batch_size: 1,
        }
    }
}

impl CutOptions {
    /// Create options with the defaults: 15 fps clips, 10 s of padding,
    /// 5 s minimum span, MPEG-4 into `.avi`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target frame rate, clamped to at least 1.
    #[must_use]
    pub fn with_target_rate(mut self, rate: u32) -> Self {
        self.target_rate = rate.max(1);
        self
    }

    /// Set the pre-roll and quiet-out padding window.
    #[must_use]
    pub fn with_pre_roll(mut self, pre_roll: Duration) -> Self {
        self.pre_roll = pre_roll;
        self
    }

    /// Set the minimum significant span below which clips are discarded.
    #[must_use]
    pub fn with_min_clip_span(mut self, span: Duration) -> Self {
        self.min_clip_span = span;
        self
    }

    /// Set the clip codec.
    #[must_use]
    pub fn with_codec(mut self, codec: ClipCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the clip file extension (no leading dot).
    #[must_use]
    pub fn with_clip_extension<S: Into<String>>(mut self, extension: S) -> Self {
        self.clip_extension = extension.into();
        self
    }

    /// Set the extension recordings are discovered by.
    #[must_use]
    pub fn with_source_extension<S: Into<String>>(mut self, extension: S) -> Self {
        self.source_extension = extension.into();
        self
    }

    /// Replace the full detector tuning.
    #[must_use]
    pub fn with_detector(mut self, detector: DetectorOptions) -> Self {
        self.detector = detector;
        self
    }

    /// Set just the detection strategy, keeping the default tuning.
    #[must_use]
    pub fn with_detector_mode(mut self, mode: DetectorMode) -> Self {
        self.detector.mode = mode;
        self
    }

    /// Set a progress callback.
    ///
    /// The callback is invoked every
    /// [`batch_size`](CutOptions::with_batch_size) frames, and once per
    /// finalized clip.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Set how many frames pass between progress reports. Clamped to ≥ 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Frames of quiet that end a clip: `pre_roll × target_rate`.
    pub(crate) fn quiet_limit(&self) -> u64 {
        (self.pre_roll.as_secs_f64() * f64::from(self.target_rate)).round() as u64
    }
}
