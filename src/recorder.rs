//! Clip boundary tracking.
//!
//! [`ClipRecorder`] consumes the normalized frame stream one frame at a time
//! and decides where clips start and end. While scanning it keeps a bounded
//! backlog of recent frames; when a significant frame arrives it opens an
//! in-progress clip, replays the backlog into it for pre-roll padding, and
//! records until the scene has been quiet for the padding window again.
//!
//! Clips are written under a provisional name and renamed once their duration
//! is known, so a crashed run leaves either a recognizable partial file or a
//! completed clip. On restart the recorder notices both cases: partial files
//! are deleted and re-cut, finished clips are skipped over.

use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};

use crate::backlog::Backlog;
use crate::clip::{ClipName, ClipSummary, SourceVideo};
use crate::error::StillcutError;
use crate::options::CutOptions;
use crate::resampler::ResampledFrame;
use crate::sink::{SinkFactory, SinkSpec, VideoSink};

/// What the recorder did with the frame it was handed.
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// The frame changed nothing at a clip boundary.
    Continue,
    /// A significant frame opened a new in-progress clip.
    ClipOpened {
        /// Path of the in-progress file.
        path: PathBuf,
    },
    /// The clip this frame would start already exists on disk. The caller
    /// should skip forward by `skip` of media time before reading on.
    ResumeSkip {
        /// Media time already covered by the finalized clip.
        skip: Duration,
    },
    /// A clip closed and was renamed to its final name.
    Finalized(ClipSummary),
    /// A clip closed but held too little activity to keep.
    Discarded {
        /// Path of the deleted in-progress file.
        path: PathBuf,
        /// Time between the first and last significant frame.
        span: Duration,
    },
}

enum Phase<S> {
    Scanning,
    Recording(ActiveClip<S>),
}

struct ActiveClip<S> {
    sink: S,
    path: PathBuf,
    name: ClipName,
    start_offset: Duration,
    detection_time: Duration,
    last_significant: Duration,
    end_time: Duration,
    quiet_streak: u64,
    frames_written: u64,
}

/// State machine that turns a frame stream into padded clips.
pub struct ClipRecorder<F: SinkFactory> {
    factory: F,
    out_dir: PathBuf,
    start_timestamp: NaiveDateTime,
    channel: u32,
    spec: SinkSpec,
    pre_roll: Duration,
    min_span: Duration,
    clip_extension: String,
    quiet_limit: u64,
    backlog: Backlog,
    phase: Phase<F::Sink>,
}

impl<F: SinkFactory> ClipRecorder<F> {
    /// Create a recorder writing clips for `video` into `out_dir`.
    pub fn new(
        factory: F,
        out_dir: &Path,
        video: &SourceVideo,
        options: &CutOptions,
        spec: SinkSpec,
    ) -> Self {
        let quiet_limit = options.quiet_limit();
        Self {
            factory,
            out_dir: out_dir.to_path_buf(),
            start_timestamp: video.start,
            channel: video.channel,
            spec,
            pre_roll: options.pre_roll,
            min_span: options.min_clip_span,
            clip_extension: options.clip_extension.clone(),
            quiet_limit,
            backlog: Backlog::new(quiet_limit as usize),
            phase: Phase::Scanning,
        }
    }

    /// Feed one frame and its significance verdict through the state machine.
    pub fn process(
        &mut self,
        frame: ResampledFrame,
        significant: bool,
    ) -> Result<RecorderEvent, StillcutError> {
        if self.is_recording() {
            self.record(frame, significant)
        } else {
            self.scan(frame, significant)
        }
    }

    /// Whether a clip is currently open.
    pub fn is_recording(&self) -> bool {
        matches!(self.phase, Phase::Recording(_))
    }

    /// Admit frames to the backlog without writing them anywhere.
    ///
    /// Used after a resume skip to rebuild the pre-roll window from the
    /// frames decoded around the landing point.
    pub fn bulk_admit<I: IntoIterator<Item = ResampledFrame>>(&mut self, frames: I) {
        self.backlog.bulk_admit(frames);
    }

    /// Close any open clip. Call once the frame stream ends.
    pub fn finish(&mut self) -> Result<Option<RecorderEvent>, StillcutError> {
        match mem::replace(&mut self.phase, Phase::Scanning) {
            Phase::Scanning => Ok(None),
            Phase::Recording(clip) => Ok(Some(self.close_out(clip)?)),
        }
    }

    fn scan(
        &mut self,
        frame: ResampledFrame,
        significant: bool,
    ) -> Result<RecorderEvent, StillcutError> {
        let elapsed = frame.elapsed;
        let first = frame.index == 0;
        self.backlog.admit(frame);
        // The very first frame has no history to compare against, so a
        // significance verdict on it is meaningless.
        if !significant || first {
            return Ok(RecorderEvent::Continue);
        }
        let start_offset = elapsed.saturating_sub(self.pre_roll);
        let clip_start =
            self.start_timestamp + TimeDelta::milliseconds(start_offset.as_millis() as i64);
        let name = ClipName::new(clip_start, self.channel, self.spec.frame_rate);
        let in_progress = self
            .out_dir
            .join(name.in_progress_file_name(&self.clip_extension));
        if in_progress.exists() {
            log::warn!(
                "Removing stale in-progress clip {}",
                in_progress.display()
            );
            fs::remove_file(&in_progress)?;
        }
        let finalized = self.finalized_candidates(&name)?;
        match finalized.len() {
            0 => {
                let mut sink = self.factory.open(&in_progress, &self.spec)?;
                self.backlog.replay_into(&mut sink)?;
                let frames_written = self.backlog.len() as u64;
                log::debug!(
                    "Change detected at {:.2} s; recording to {}",
                    elapsed.as_secs_f64(),
                    in_progress.display()
                );
                let path = in_progress.clone();
                self.phase = Phase::Recording(ActiveClip {
                    sink,
                    path: in_progress,
                    name,
                    start_offset,
                    detection_time: elapsed,
                    last_significant: elapsed,
                    end_time: elapsed,
                    quiet_streak: 0,
                    frames_written,
                });
                Ok(RecorderEvent::ClipOpened { path })
            }
            1 => {
                let recorded = finalized[0];
                let consumed = elapsed.saturating_sub(start_offset);
                let remaining = recorded
                    .saturating_sub(consumed)
                    .saturating_sub(self.pre_roll);
                if remaining.is_zero() {
                    Ok(RecorderEvent::Continue)
                } else {
                    log::warn!(
                        "Clip {} already finalized; skipping {:.2} s of covered footage",
                        name.stem(),
                        remaining.as_secs_f64()
                    );
                    Ok(RecorderEvent::ResumeSkip { skip: remaining })
                }
            }
            count => Err(StillcutError::AmbiguousResume {
                stem: name.stem(),
                count,
            }),
        }
    }

    fn record(
        &mut self,
        frame: ResampledFrame,
        significant: bool,
    ) -> Result<RecorderEvent, StillcutError> {
        let quiet_limit = self.quiet_limit;
        let Phase::Recording(clip) = &mut self.phase else {
            return Ok(RecorderEvent::Continue);
        };
        clip.sink.append(&frame)?;
        clip.end_time = frame.elapsed;
        clip.frames_written += 1;
        if significant {
            clip.quiet_streak = 0;
            clip.last_significant = frame.elapsed;
        } else {
            clip.quiet_streak += 1;
        }
        let done = clip.quiet_streak >= quiet_limit;
        self.backlog.admit(frame);
        if !done {
            return Ok(RecorderEvent::Continue);
        }
        match mem::replace(&mut self.phase, Phase::Scanning) {
            Phase::Recording(clip) => self.close_out(clip),
            Phase::Scanning => Ok(RecorderEvent::Continue),
        }
    }

    fn close_out(&mut self, mut clip: ActiveClip<F::Sink>) -> Result<RecorderEvent, StillcutError> {
        clip.sink.close()?;
        let span = clip.last_significant.saturating_sub(clip.detection_time);
        if span < self.min_span {
            log::debug!(
                "Discarding {}: {:.2} s of activity is below the {:.2} s minimum",
                clip.path.display(),
                span.as_secs_f64(),
                self.min_span.as_secs_f64()
            );
            fs::remove_file(&clip.path)?;
            return Ok(RecorderEvent::Discarded {
                path: clip.path,
                span,
            });
        }
        let duration = clip.end_time.saturating_sub(clip.start_offset);
        let final_path = self
            .out_dir
            .join(clip.name.finalized_file_name(duration, &self.clip_extension));
        fs::rename(&clip.path, &final_path)?;
        log::info!(
            "Finalized {} ({:.2} s, {} frames)",
            final_path.display(),
            duration.as_secs_f64(),
            clip.frames_written
        );
        Ok(RecorderEvent::Finalized(ClipSummary {
            path: final_path,
            start: clip.name.start,
            start_offset: clip.start_offset,
            duration,
            frames: clip.frames_written,
        }))
    }

    fn finalized_candidates(&self, name: &ClipName) -> Result<Vec<Duration>, StillcutError> {
        let mut durations = Vec::new();
        for entry in fs::read_dir(&self.out_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(duration) = name.finalized_duration(file_name, &self.clip_extension) {
                durations.push(duration);
            }
        }
        Ok(durations)
    }
}
