//! End-to-end cutting of one recording.
//!
//! [`ClipCutter`] wires the pieces together: it opens the recording, runs the
//! decoded frames through the [`FrameResampler`], scores each normalized
//! frame with the [`ChangeDetector`](crate::ChangeDetector), and feeds the
//! verdicts to the [`ClipRecorder`], collecting a summary per finalized clip.
//!
//! # Example
//!
//! ```no_run
//! use stillcut::{ClipCutter, CutOptions};
//!
//! # fn main() -> Result<(), stillcut::StillcutError> {
//! let cutter = ClipCutter::new(CutOptions::new());
//! let clips = cutter.process_file("2021-03-01T13:05:00-3-r30.ogv", "clips")?;
//! for clip in &clips {
//!     println!("{} ({:.1} s)", clip.path.display(), clip.duration.as_secs_f64());
//! }
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::clip::{ClipSummary, SourceVideo};
use crate::detector::ChangeDetector;
use crate::error::StillcutError;
use crate::options::CutOptions;
use crate::progress::ProgressTracker;
use crate::recorder::{ClipRecorder, RecorderEvent};
use crate::resampler::FrameResampler;
use crate::sink::{ClipEncoderFactory, SinkFactory, SinkSpec};
use crate::source::{FrameSource, VideoSource};

/// Cuts recordings into clips according to a set of [`CutOptions`].
#[derive(Debug, Default)]
pub struct ClipCutter {
    options: CutOptions,
}

impl ClipCutter {
    /// Create a cutter with the given options.
    pub fn new(options: CutOptions) -> Self {
        Self { options }
    }

    /// Cut one recording, writing clips into `out_dir`.
    ///
    /// The file name must follow the `{start}-{channel}-r{rate}` convention
    /// so the recording can be placed in time; see
    /// [`SourceVideo::from_path`]. Returns a summary for every clip kept.
    ///
    /// # Errors
    ///
    /// Fails if the file name cannot be parsed, the file cannot be decoded,
    /// the stream's frame rate contradicts the one declared in the name, or
    /// if the output directory already holds more than one finalized clip
    /// for the same boundary.
    pub fn process_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        out_dir: Q,
    ) -> Result<Vec<ClipSummary>, StillcutError> {
        let input = input.as_ref();
        let out_dir = out_dir.as_ref();
        let video = SourceVideo::from_path(input)?;
        let source = VideoSource::open(input)?;
        let actual = source.native_rate();
        if actual as u32 != video.declared_rate {
            return Err(StillcutError::RateMismatch {
                path: input.to_path_buf(),
                declared: video.declared_rate,
                actual,
            });
        }
        fs::create_dir_all(out_dir)?;
        self.cut(source, ClipEncoderFactory, &video, out_dir)
    }

    /// Cut an already-open frame source, writing clips through `factory`.
    ///
    /// [`process_file`](ClipCutter::process_file) is the common entry point;
    /// this one takes the source and sink as values so other frame producers
    /// and containers can be plugged in.
    pub fn cut<S, F>(
        &self,
        source: S,
        factory: F,
        video: &SourceVideo,
        out_dir: &Path,
    ) -> Result<Vec<ClipSummary>, StillcutError>
    where
        S: FrameSource,
        F: SinkFactory,
    {
        let (width, height) = source.dimensions();
        let spec = SinkSpec::new(self.options.target_rate, width, height)
            .with_codec(self.options.codec);
        let mut resampler = FrameResampler::new(source, f64::from(self.options.target_rate))?;
        let mut detector = ChangeDetector::new(self.options.detector.clone());
        let mut recorder = ClipRecorder::new(factory, out_dir, video, &self.options, spec);
        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.options.progress),
            resampler.output_frames_estimate(),
            self.options.batch_size,
        );
        let mut clips = Vec::new();

        log::debug!(
            "Cutting {} (channel {}, {} fps declared) into {}",
            video.path.display(),
            video.channel,
            video.declared_rate,
            out_dir.display()
        );
        loop {
            let frame = match resampler.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    if recorder.is_recording() {
                        log::warn!(
                            "{}: stream ended while a clip was open; finalizing early",
                            video.path.display()
                        );
                    }
                    break;
                }
                Err(error) if recorder.is_recording() => {
                    log::warn!(
                        "{}: decode failed mid-clip ({error}); finalizing and scanning on",
                        video.path.display()
                    );
                    if let Some(event) = recorder.finish()? {
                        note_clip(event, &mut clips, &tracker);
                    }
                    continue;
                }
                Err(error) => return Err(error),
            };
            let media_time = frame.elapsed;
            let significant = detector.is_significant(&frame.image);
            match recorder.process(frame, significant)? {
                RecorderEvent::ResumeSkip { skip } => {
                    let tail = skip.min(self.options.pre_roll);
                    let outcome = resampler.skip(skip, tail)?;
                    if !outcome.completed {
                        log::warn!(
                            "{}: source ended during a resume skip",
                            video.path.display()
                        );
                    }
                    // Warm the detector back up on the frames around the
                    // landing point; their verdicts are not acted on.
                    for frame in &outcome.boundary {
                        detector.is_significant(&frame.image);
                    }
                    recorder.bulk_admit(outcome.boundary);
                }
                event => note_clip(event, &mut clips, &tracker),
            }
            tracker.advance(Some(media_time));
        }
        if let Some(event) = recorder.finish()? {
            note_clip(event, &mut clips, &tracker);
        }
        let final_time = resampler.elapsed();
        tracker.finish(Some(final_time));
        log::debug!(
            "Finished {}: {} clip(s) from {} output frames",
            video.path.display(),
            clips.len(),
            resampler.frames_read()
        );
        Ok(clips)
    }
}

fn note_clip(event: RecorderEvent, clips: &mut Vec<ClipSummary>, tracker: &ProgressTracker) {
    if let RecorderEvent::Finalized(summary) = event {
        tracker.clip(&summary);
        clips.push(summary);
    }
}

/// Mark a recording as processed by renaming it with a `.done` suffix.
///
/// Returns the new path. Callers that sweep a directory use the suffix to
/// keep already-processed recordings out of later runs.
pub fn archive_processed<P: AsRef<Path>>(path: P) -> Result<PathBuf, StillcutError> {
    let path = path.as_ref();
    let mut archived = path.as_os_str().to_os_string();
    archived.push(".done");
    let archived = PathBuf::from(archived);
    fs::rename(path, &archived)?;
    log::debug!("Archived {} as {}", path.display(), archived.display());
    Ok(archived)
}
