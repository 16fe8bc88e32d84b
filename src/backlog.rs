//! Pre-roll frame backlog.
//!
//! While the pipeline is scanning, the most recent window of resampled
//! frames is kept in a bounded FIFO so that a freshly opened clip can start
//! `pre_roll` seconds *before* the change that triggered it. The same buffer
//! is refilled from skip-boundary frames when a resume fast-forwards over an
//! already finalized clip.

use crate::error::StillcutError;
use crate::resampler::ResampledFrame;
use crate::sink::VideoSink;
use std::collections::VecDeque;

/// Bounded FIFO of the most recent resampled frames.
///
/// Holds at most `capacity` frames; admitting a frame when full evicts the
/// oldest first, so the buffer always covers the most recent stretch of the
/// stream.
pub struct Backlog {
    frames: VecDeque<ResampledFrame>,
    capacity: usize,
}

impl Backlog {
    /// Create a backlog holding up to `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Admit one frame, evicting the oldest if the backlog is full.
    ///
    /// With a capacity of zero the frame is silently dropped.
    pub fn admit(&mut self, frame: ResampledFrame) {
        if self.capacity == 0 {
            return;
        }
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// Admit a batch of frames in order. Only the newest `capacity` survive.
    pub fn bulk_admit<I>(&mut self, frames: I)
    where
        I: IntoIterator<Item = ResampledFrame>,
    {
        for frame in frames {
            self.admit(frame);
        }
    }

    /// Write every buffered frame to `sink`, oldest first, keeping the
    /// buffer contents intact.
    ///
    /// # Errors
    ///
    /// Propagates the first append error from the sink.
    pub fn replay_into<S: VideoSink>(&self, sink: &mut S) -> Result<(), StillcutError> {
        for frame in &self.frames {
            sink.append(frame)?;
        }
        Ok(())
    }

    /// Number of frames currently buffered.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the backlog holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Maximum number of frames the backlog retains.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
