//! Error types for the `stillcut` crate.
//!
//! This module defines [`StillcutError`], the unified error type returned by all
//! fallible operations in the crate. Errors carry rich context to aid debugging,
//! including file paths, declared frame rates, and upstream error messages.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `stillcut` operations.
///
/// Every public method that can fail returns `Result<T, StillcutError>`.
/// Variants carry enough context to diagnose the problem without needing
/// additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StillcutError {
    /// The recording could not be opened.
    #[error("Failed to open video file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::VideoSource::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// The frame rate encoded in the file name does not match the stream.
    #[error("{path}: file name declares {declared} fps but the stream runs at {actual:.2} fps")]
    RateMismatch {
        /// Path of the offending recording.
        path: PathBuf,
        /// Frame rate parsed from the file name.
        declared: u32,
        /// Frame rate reported by the container.
        actual: f64,
    },

    /// A recording file name does not follow the expected naming scheme.
    #[error("Invalid source file name {name:?}: {reason}")]
    InvalidSourceName {
        /// The file name that failed to parse.
        name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// More than one finalized clip already exists for the same start time.
    #[error("Found {count} finalized clips named {stem}-d*; output directory is ambiguous")]
    AmbiguousResume {
        /// Shared stem of the conflicting clips.
        stem: String,
        /// Number of finalized clips that matched.
        count: usize,
    },

    /// A frame rate that must be positive was zero or negative.
    #[error("Invalid frame rate: {0}")]
    InvalidRate(String),

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// Video encoding failed.
    #[error("Video encoding error: {0}")]
    VideoEncodeError(String),

    /// The clip writer failed.
    #[error("Video write error: {0}")]
    VideoWriteError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl From<FfmpegError> for StillcutError {
    fn from(error: FfmpegError) -> Self {
        StillcutError::FfmpegError(error.to_string())
    }
}
