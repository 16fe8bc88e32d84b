//! Temporal change detection over resampled frames.
//!
//! [`ChangeDetector`] classifies each frame of a fixed-camera stream as
//! significant (something moved) or not. Two strategies are available:
//!
//! - [`DetectorMode::BackgroundModel`] (default) keeps a per-pixel running
//!   estimate of the static background and measures how many pixels sit far
//!   from it. Robust against slow lighting drift.
//! - [`DetectorMode::FrameDifference`] compares each frame against the
//!   previous one in grayscale. Cheaper, but blind to slow movement.
//!
//! The very first frame only initialises the chosen model and is never
//! significant.
//!
//! # Example
//!
//! ```
//! use image::RgbImage;
//! use stillcut::{ChangeDetector, DetectorOptions};
//!
//! let mut detector = ChangeDetector::new(DetectorOptions::default());
//! let quiet = RgbImage::new(64, 64);
//!
//! assert!(!detector.is_significant(&quiet)); // first frame: baseline only
//! assert!(!detector.is_significant(&quiet));
//!
//! let bright = RgbImage::from_pixel(64, 64, image::Rgb([255, 255, 255]));
//! assert!(detector.is_significant(&bright));
//! ```

use image::RgbImage;

/// Which change detection strategy [`ChangeDetector`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorMode {
    /// Per-pixel adaptive background model (the default).
    #[default]
    BackgroundModel,
    /// Grayscale difference against the previous frame.
    FrameDifference,
}

/// Tuning knobs for [`ChangeDetector`].
///
/// The defaults are calibrated for overhead fixed-camera footage: a fast
/// learning rate so that completed movements get absorbed into the
/// background within about a second, and a 1% foreground ratio so sensor
/// noise alone does not trigger.
#[derive(Debug, Clone)]
pub struct DetectorOptions {
    /// The strategy to run.
    pub mode: DetectorMode,
    /// Frames over which the background model warms up.
    pub history: u32,
    /// Squared RGB distance beyond which a pixel counts as foreground.
    pub distance_threshold: f32,
    /// Per-frame blend factor pulling the background toward the current frame.
    pub learning_rate: f32,
    /// Fraction of foreground pixels above which a frame is significant.
    pub foreground_ratio: f64,
    /// Grayscale delta beyond which a pixel counts as changed
    /// ([`DetectorMode::FrameDifference`] only).
    pub intensity_delta: u8,
    /// Fraction of changed pixels above which a frame is significant
    /// ([`DetectorMode::FrameDifference`] only).
    pub difference_ratio: f64,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            mode: DetectorMode::default(),
            history: 15,
            distance_threshold: 800.0,
            learning_rate: 0.7,
            foreground_ratio: 0.01,
            intensity_delta: 5,
            difference_ratio: 0.03,
        }
    }
}

impl DetectorOptions {
    /// Create options with the default tuning.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the detection strategy.
    #[must_use]
    pub fn with_mode(mut self, mode: DetectorMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the background model warm-up window, in frames.
    #[must_use]
    pub fn with_history(mut self, history: u32) -> Self {
        self.history = history.max(1);
        self
    }

    /// Set the squared-distance foreground threshold.
    #[must_use]
    pub fn with_distance_threshold(mut self, threshold: f32) -> Self {
        self.distance_threshold = threshold;
        self
    }

    /// Set the background learning rate, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn with_learning_rate(mut self, rate: f32) -> Self {
        self.learning_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set the foreground pixel ratio that makes a frame significant.
    #[must_use]
    pub fn with_foreground_ratio(mut self, ratio: f64) -> Self {
        self.foreground_ratio = ratio;
        self
    }

    /// Set the grayscale delta for the frame difference strategy.
    #[must_use]
    pub fn with_intensity_delta(mut self, delta: u8) -> Self {
        self.intensity_delta = delta;
        self
    }

    /// Set the changed pixel ratio for the frame difference strategy.
    #[must_use]
    pub fn with_difference_ratio(mut self, ratio: f64) -> Self {
        self.difference_ratio = ratio;
        self
    }
}

enum DetectorState {
    Background {
        /// Per-subpixel running background estimate; `None` until the first
        /// frame arrives.
        model: Option<Vec<f32>>,
        frames_seen: u64,
    },
    Difference {
        /// Grayscale plane of the previous frame.
        previous: Option<Vec<u8>>,
    },
}

/// Stateful change classifier for one stream.
///
/// Not reusable across streams: create one detector per recording, or call
/// [`reset`](ChangeDetector::reset) in between.
pub struct ChangeDetector {
    options: DetectorOptions,
    state: DetectorState,
}

impl ChangeDetector {
    /// Create a detector with the given tuning.
    pub fn new(options: DetectorOptions) -> Self {
        let state = match options.mode {
            DetectorMode::BackgroundModel => DetectorState::Background {
                model: None,
                frames_seen: 0,
            },
            DetectorMode::FrameDifference => DetectorState::Difference { previous: None },
        };
        Self { options, state }
    }

    /// Classify `frame` and fold it into the detector's state.
    ///
    /// Returns `true` when the frame differs enough from the model. The
    /// first frame of a stream always returns `false`.
    pub fn is_significant(&mut self, frame: &RgbImage) -> bool {
        match &mut self.state {
            DetectorState::Background { model, frames_seen } => {
                Self::score_background(&self.options, frame, model, frames_seen)
            }
            DetectorState::Difference { previous } => {
                Self::score_difference(&self.options, frame, previous)
            }
        }
    }

    /// Drop all learned state, as if freshly constructed.
    pub fn reset(&mut self) {
        *self = Self::new(self.options.clone());
    }

    fn score_background(
        options: &DetectorOptions,
        frame: &RgbImage,
        model: &mut Option<Vec<f32>>,
        frames_seen: &mut u64,
    ) -> bool {
        let Some(background) = model else {
            *model = Some(frame.iter().map(|&value| f32::from(value)).collect());
            *frames_seen = 1;
            return false;
        };

        if background.len() != frame.as_raw().len() {
            // Dimension change mid-stream; start over from this frame.
            *background = frame.iter().map(|&value| f32::from(value)).collect();
            *frames_seen = 1;
            return false;
        }

        // Classify against the model as it stood before this frame.
        let mut foreground = 0usize;
        for (pixel, estimate) in frame.pixels().zip(background.chunks_exact(3)) {
            let dr = f32::from(pixel[0]) - estimate[0];
            let dg = f32::from(pixel[1]) - estimate[1];
            let db = f32::from(pixel[2]) - estimate[2];
            if dr * dr + dg * dg + db * db > options.distance_threshold {
                foreground += 1;
            }
        }

        // Adapt faster while the history window is still filling.
        let alpha = if *frames_seen < u64::from(options.history) {
            options.learning_rate.max(1.0 / *frames_seen as f32)
        } else {
            options.learning_rate
        };
        for (&value, estimate) in frame.iter().zip(background.iter_mut()) {
            *estimate += alpha * (f32::from(value) - *estimate);
        }
        *frames_seen += 1;

        let total = frame.width() as usize * frame.height() as usize;
        total > 0 && foreground as f64 / total as f64 > options.foreground_ratio
    }

    fn score_difference(
        options: &DetectorOptions,
        frame: &RgbImage,
        previous: &mut Option<Vec<u8>>,
    ) -> bool {
        let gray: Vec<u8> = frame
            .pixels()
            .map(|pixel| {
                let luma = u32::from(pixel[0]) * 299
                    + u32::from(pixel[1]) * 587
                    + u32::from(pixel[2]) * 114;
                (luma / 1000) as u8
            })
            .collect();

        let significant = match previous {
            Some(last) if last.len() == gray.len() => {
                let changed = gray
                    .iter()
                    .zip(last.iter())
                    .filter(|(a, b)| a.abs_diff(**b) > options.intensity_delta)
                    .count();
                !gray.is_empty() && changed as f64 / gray.len() as f64 > options.difference_ratio
            }
            _ => false,
        };

        *previous = Some(gray);
        significant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn flat(value: u8) -> RgbImage {
        RgbImage::from_pixel(32, 32, Rgb([value, value, value]))
    }

    #[test]
    fn first_frame_is_never_significant() {
        for mode in [DetectorMode::BackgroundModel, DetectorMode::FrameDifference] {
            let mut detector = ChangeDetector::new(DetectorOptions::default().with_mode(mode));
            assert!(!detector.is_significant(&flat(255)));
        }
    }

    #[test]
    fn background_model_absorbs_static_scenes() {
        let mut detector = ChangeDetector::new(DetectorOptions::default());
        for _ in 0..30 {
            assert!(!detector.is_significant(&flat(40)));
        }
    }

    #[test]
    fn background_model_flags_sudden_change_then_readapts() {
        let mut detector = ChangeDetector::new(DetectorOptions::default());
        for _ in 0..20 {
            detector.is_significant(&flat(40));
        }

        assert!(detector.is_significant(&flat(200)));

        // At a 0.7 learning rate the new scene becomes background within a
        // handful of frames.
        let mut still_significant = 0;
        for _ in 0..10 {
            if detector.is_significant(&flat(200)) {
                still_significant += 1;
            }
        }
        assert!(still_significant <= 2, "model failed to re-adapt");
    }

    #[test]
    fn frame_difference_flags_change_against_previous_frame_only() {
        let options = DetectorOptions::default().with_mode(DetectorMode::FrameDifference);
        let mut detector = ChangeDetector::new(options);

        detector.is_significant(&flat(40));
        assert!(detector.is_significant(&flat(60)));
        // Identical consecutive frames go quiet again immediately.
        assert!(!detector.is_significant(&flat(60)));
    }

    #[test]
    fn small_deltas_stay_below_the_intensity_threshold() {
        let options = DetectorOptions::default().with_mode(DetectorMode::FrameDifference);
        let mut detector = ChangeDetector::new(options);

        detector.is_significant(&flat(40));
        assert!(!detector.is_significant(&flat(43)));
    }

    #[test]
    fn reset_forgets_the_learned_background() {
        let mut detector = ChangeDetector::new(DetectorOptions::default());
        for _ in 0..20 {
            detector.is_significant(&flat(40));
        }

        detector.reset();
        // First frame after a reset is baseline again.
        assert!(!detector.is_significant(&flat(200)));
    }
}
