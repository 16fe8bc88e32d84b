//! Progress reporting.
//!
//! This module provides [`ProgressCallback`] for monitoring a cut as it runs
//! and [`ProgressInfo`] for detailed progress snapshots. Long recordings take
//! minutes to chew through; the callback gives callers something to show
//! while that happens, plus a hook fired whenever a clip is finalized.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use stillcut::{ClipCutter, CutOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("{pct:.1}% complete");
//!         }
//!     }
//! }
//!
//! let options = CutOptions::new().with_progress(Arc::new(PrintProgress));
//! let clips = ClipCutter::new(options)
//!     .process_file("2021-03-01T130000-3-r30.ogv", Path::new("clips"))?;
//! # Ok::<(), stillcut::StillcutError>(())
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clip::ClipSummary;

/// A snapshot of cutting progress.
///
/// Delivered to [`ProgressCallback::on_progress`] at a cadence controlled by
/// [`CutOptions::with_batch_size`](crate::CutOptions::with_batch_size).
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Output frames processed so far.
    pub current: u64,
    /// Total output frames expected, if the container declares a length.
    /// Skip-based resumes can make the real count come in under this.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the cut started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Stream time of the frame most recently processed.
    pub media_time: Option<Duration>,
}

/// Trait for receiving progress updates during a cut.
///
/// Implementations must be [`Send`] and [`Sync`].
///
/// Progress callbacks are **infallible** — they observe but cannot halt the
/// operation.
pub trait ProgressCallback: Send + Sync {
    /// Called at regular intervals while frames are processed.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called once per finalized clip. The default does nothing.
    fn on_clip(&self, _summary: &ClipSummary) {}
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Internal helper that tracks progress timing and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: Option<u64>,
    current: u64,
    batch_size: u64,
    start_time: Instant,
    items_since_last_report: u64,
}

impl ProgressTracker {
    /// Create a new tracker.
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            total,
            current: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
        }
    }

    /// Record one processed frame and fire the callback if the batch
    /// threshold is reached.
    pub(crate) fn advance(&mut self, media_time: Option<Duration>) {
        self.current += 1;
        self.items_since_last_report += 1;

        if self.items_since_last_report >= self.batch_size {
            self.report(media_time);
            self.items_since_last_report = 0;
        }
    }

    /// Forward a finalized clip to the callback.
    pub(crate) fn clip(&self, summary: &ClipSummary) {
        self.callback.on_clip(summary);
    }

    /// Unconditionally emit a final progress report.
    pub(crate) fn finish(&mut self, media_time: Option<Duration>) {
        self.report(media_time);
    }

    fn report(&self, media_time: Option<Duration>) {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total
            .filter(|&t| t > 0)
            .map(|t| (self.current as f32 / t as f32).min(1.0) * 100.0);

        let estimated_remaining = if self.current > 0 {
            self.total.map(|t| {
                let remaining = t.saturating_sub(self.current);
                let per_item = elapsed / self.current as u32;
                per_item * remaining as u32
            })
        } else {
            None
        };

        let info = ProgressInfo {
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            media_time,
        };

        self.callback.on_progress(&info);
    }
}
