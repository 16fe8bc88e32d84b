//! Variable-to-fixed frame rate resampling.
//!
//! Cameras that feed long recordings rarely run at the rate the clip format
//! wants. [`FrameResampler`] sits between a [`FrameSource`] and the rest of
//! the pipeline and emits frames at a fixed target rate: it walks a virtual
//! read position through the source stream in steps of `native / target`
//! frames, consumes whole source frames to keep up, and linearly blends the
//! two neighbouring source frames whenever the position lands between them.
//!
//! Positions are centre-aligned, so downsampling by an exact factor of two
//! yields even 50/50 blends, and a source already at the target rate passes
//! through byte for byte.
//!
//! # Example
//!
//! ```no_run
//! use stillcut::{FrameResampler, VideoSource};
//!
//! let source = VideoSource::open("2021-03-01T130000-3-r30.ogv")?;
//! let mut resampler = FrameResampler::new(source, 15.0)?;
//!
//! while let Some(frame) = resampler.read()? {
//!     println!("frame {} at t+{:.2}s", frame.index, frame.elapsed.as_secs_f64());
//! }
//! # Ok::<(), stillcut::StillcutError>(())
//! ```

use std::time::Duration;

use image::RgbImage;

use crate::error::StillcutError;
use crate::source::FrameSource;

/// A single frame produced by [`FrameResampler`], stamped with its position
/// in the normalized output stream.
#[derive(Clone)]
pub struct ResampledFrame {
    /// Frame contents, RGB, at source dimensions.
    pub image: RgbImage,
    /// Zero-based index in the normalized stream.
    pub index: u64,
    /// Stream time of this frame: `index / target_rate` seconds from the
    /// start of the recording, with skipped stretches counted in full.
    pub elapsed: Duration,
}

/// Result of fast-forwarding over a stretch of the source stream.
pub struct SkipOutcome {
    /// Number of source frames actually discarded.
    pub source_frames_skipped: u64,
    /// Frames decoded from the trailing end of the skipped stretch, in
    /// stream order. Empty when no tail was requested or the stream ended.
    pub boundary: Vec<ResampledFrame>,
    /// Whether the full requested duration was covered before end of stream.
    pub completed: bool,
}

/// Normalizes a [`FrameSource`] to a fixed output frame rate.
///
/// The resampler tracks a fractional position in source-frame units that
/// advances by `native_rate / target_rate` per output frame. Integral
/// positions pass a source frame through unchanged; fractional positions
/// blend the two frames around the position, with the fractional part
/// weighting the earlier frame. Bookkeeping is quantized to two decimal
/// places so that rates like 29.97 fps do not accumulate drift into the
/// consume counts.
pub struct FrameResampler<S> {
    source: S,
    native_rate: f64,
    target_rate: f64,
    increment: f64,
    start_position: f64,
    /// Virtual position, in source-frame units, of the last emitted frame.
    position: f64,
    /// Output stream clock in target-frame units. Unlike `position` this
    /// advances exactly through skips, so `elapsed` stays honest.
    clock: f64,
    current: Option<RgbImage>,
    lookahead: Option<RgbImage>,
    frames_read: u64,
    source_frames_consumed: u64,
    finished: bool,
}

impl<S: FrameSource> FrameResampler<S> {
    /// Wrap `source` and resample it to `target_rate` frames per second.
    ///
    /// # Errors
    ///
    /// Returns [`StillcutError::InvalidRate`] when either the target rate or
    /// the source's native rate is not positive.
    pub fn new(source: S, target_rate: f64) -> Result<Self, StillcutError> {
        if target_rate <= 0.0 {
            return Err(StillcutError::InvalidRate(format!(
                "target rate must be positive, got {target_rate}"
            )));
        }
        let native_rate = source.native_rate();
        if native_rate <= 0.0 {
            return Err(StillcutError::InvalidRate(format!(
                "source rate must be positive, got {native_rate}"
            )));
        }

        let increment = native_rate / target_rate;
        // Centre the sampling grid between source frames so that integral
        // downsampling factors blend evenly instead of aliasing to every
        // n-th frame.
        let start_position = ((increment - 1.0) / 2.0).max(0.0);

        log::debug!(
            "Resampling {native_rate:.2} fps to {target_rate:.2} fps \
             (increment {increment:.4})"
        );

        Ok(Self {
            source,
            native_rate,
            target_rate,
            increment,
            start_position,
            position: 0.0,
            clock: 0.0,
            current: None,
            lookahead: None,
            frames_read: 0,
            source_frames_consumed: 0,
            finished: false,
        })
    }

    /// Produce the next output frame, or `None` once the source is drained.
    ///
    /// # Errors
    ///
    /// Propagates decode errors from the underlying source.
    pub fn read(&mut self) -> Result<Option<ResampledFrame>, StillcutError> {
        if self.finished {
            return Ok(None);
        }

        // Position of the frame to emit and the number of source frames to
        // consume to reach it. The first emit has no predecessor, so it pays
        // for every frame up to its position.
        let (next_position, steps) = if self.current.is_none() {
            let position = self.start_position;
            (position, quantize(position).floor() as u64 + 1)
        } else {
            let position = self.position + self.increment;
            let steps = (quantize(position).floor() - quantize(self.position).floor()) as u64;
            (position, steps)
        };

        for _ in 0..steps {
            match self.pull()? {
                Some(frame) => self.current = Some(frame),
                None => {
                    self.finished = true;
                    return Ok(None);
                }
            }
        }

        let weight = quantize(next_position.fract());
        let image = if weight == 0.0 {
            // The position coincides with a source frame; pass it through.
            match &self.current {
                Some(current) => current.clone(),
                None => {
                    self.finished = true;
                    return Ok(None);
                }
            }
        } else {
            if self.lookahead.is_none() {
                match self.decode_one()? {
                    Some(frame) => self.lookahead = Some(frame),
                    None if steps > 0 => {
                        // Source exhausted on the lookahead read; the last
                        // decoded frame stands in for the missing neighbour.
                    }
                    None => {
                        self.finished = true;
                        return Ok(None);
                    }
                }
            }
            match (&self.current, &self.lookahead) {
                (Some(current), Some(next)) => blend(current, next, weight),
                (Some(current), None) => current.clone(),
                _ => {
                    self.finished = true;
                    return Ok(None);
                }
            }
        };

        self.position = next_position;
        let frame = ResampledFrame {
            image,
            index: self.frames_read,
            elapsed: Duration::from_secs_f64(self.clock / self.target_rate),
        };
        self.frames_read += 1;
        self.clock += 1.0;
        Ok(Some(frame))
    }

    /// Fast-forward over `duration` of stream time, decoding only the last
    /// `tail` of it.
    ///
    /// The leading stretch is discarded with cheap skip-decodes; the trailing
    /// `tail` is read normally and returned as
    /// [`boundary`](SkipOutcome::boundary) frames so the caller can rebuild
    /// whatever context it keeps around the current position. The cached
    /// lookahead frame is dropped, since it predates the skip.
    ///
    /// Positions advance by the target-rate equivalent of the skipped time;
    /// exact source-frame alignment is not tracked across a skip, so the
    /// interpolation phase afterwards can differ from what continuous
    /// reading would have produced. Reported stream time stays exact.
    ///
    /// # Errors
    ///
    /// Propagates decode errors from the underlying source.
    pub fn skip(&mut self, duration: Duration, tail: Duration) -> Result<SkipOutcome, StillcutError> {
        let tail = tail.min(duration);
        let lead = duration.saturating_sub(tail);
        let mut skipped = 0;
        let mut completed = true;

        self.lookahead = None;

        let grabs = (lead.as_secs_f64() * self.native_rate) as u64;
        for _ in 0..grabs {
            if self.source.skip_next()? {
                self.source_frames_consumed += 1;
                skipped += 1;
            } else {
                self.finished = true;
                completed = false;
                break;
            }
        }

        let offset = lead.as_secs_f64() * self.target_rate;
        self.position += offset;
        self.clock += offset;

        let tail_frames = (tail.as_secs_f64() * self.target_rate).round() as u64;
        let mut boundary = Vec::with_capacity(tail_frames as usize);
        for _ in 0..tail_frames {
            match self.read()? {
                Some(frame) => boundary.push(frame),
                None => {
                    completed = false;
                    break;
                }
            }
        }

        log::debug!(
            "Skipped {:.2}s of stream time ({} source frames discarded, {} boundary frames)",
            duration.as_secs_f64(),
            skipped,
            boundary.len()
        );

        Ok(SkipOutcome {
            source_frames_skipped: skipped,
            boundary,
            completed,
        })
    }

    /// Number of output frames emitted so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Stream time consumed so far, in the output stream's clock.
    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.clock / self.target_rate)
    }

    /// Rough number of output frames this source will yield in total, or
    /// `None` when the source does not know its length.
    pub fn output_frames_estimate(&self) -> Option<u64> {
        let total = self.source.frame_count();
        if total == 0 {
            return None;
        }
        Some(((total + 1) as f64 / self.increment).ceil() as u64)
    }

    /// Give back the wrapped source.
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Next source frame: the cached lookahead if present, else a decode.
    fn pull(&mut self) -> Result<Option<RgbImage>, StillcutError> {
        if let Some(frame) = self.lookahead.take() {
            return Ok(Some(frame));
        }
        self.decode_one()
    }

    fn decode_one(&mut self) -> Result<Option<RgbImage>, StillcutError> {
        match self.source.decode_next()? {
            Some(frame) => {
                self.source_frames_consumed += 1;
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }
}

/// Round to two decimal places.
///
/// Consume counts and blend weights are derived from quantized positions so
/// that fractional rates (29.97 fps and friends) stay phase-stable over long
/// recordings.
fn quantize(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Weighted blend of two equally sized frames: `weight` on `earlier`, the
/// remainder on `later`.
fn blend(earlier: &RgbImage, later: &RgbImage, weight: f64) -> RgbImage {
    let w = weight as f32;
    let mut output = RgbImage::new(earlier.width(), earlier.height());
    for ((value, &a), &b) in output.iter_mut().zip(earlier.iter()).zip(later.iter()) {
        *value = (f32::from(a) * w + f32::from(b) * (1.0 - w)).round() as u8;
    }
    output
}
