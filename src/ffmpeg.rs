//! FFmpeg console verbosity.
//!
//! FFmpeg logs to stderr through its own machinery, independent of the Rust
//! [`log`](https://crates.io/crates/log) crate. Long scans over aging or
//! partially corrupted recordings can produce a steady stream of decoder
//! chatter, so the cutter exposes FFmpeg's verbosity here without requiring
//! callers to depend on `ffmpeg-next` themselves.
//!
//! ```no_run
//! use stillcut::FfmpegLogLevel;
//!
//! // Keep only errors from FFmpeg itself.
//! stillcut::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! ```
//!
//! Rust-side diagnostics still go through the `log` facade and are
//! configured separately.

use ffmpeg_next::util::log::Level;

/// Verbosity of FFmpeg's internal logging, from quietest to noisiest.
///
/// Mirrors FFmpeg's `AV_LOG_*` levels; messages below the set level are
/// suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// No FFmpeg output at all.
    Quiet,
    /// Conditions the process cannot survive.
    Panic,
    /// Unrecoverable errors within one stream or file.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Suspicious but non-fatal conditions. FFmpeg's default.
    Warning,
    /// Informational messages.
    Info,
    /// Chatty informational messages.
    Verbose,
    /// Debugging output.
    Debug,
    /// Everything, including per-packet noise.
    Trace,
}

impl From<FfmpegLogLevel> for Level {
    fn from(level: FfmpegLogLevel) -> Self {
        match level {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }
}

impl From<Level> for FfmpegLogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Quiet => FfmpegLogLevel::Quiet,
            Level::Panic => FfmpegLogLevel::Panic,
            Level::Fatal => FfmpegLogLevel::Fatal,
            Level::Error => FfmpegLogLevel::Error,
            Level::Warning => FfmpegLogLevel::Warning,
            Level::Info => FfmpegLogLevel::Info,
            Level::Verbose => FfmpegLogLevel::Verbose,
            Level::Debug => FfmpegLogLevel::Debug,
            Level::Trace => FfmpegLogLevel::Trace,
        }
    }
}

/// Set how much FFmpeg itself prints to stderr.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.into());
}

/// Read back the current FFmpeg verbosity.
///
/// Returns `None` when the level reported by FFmpeg has no named variant.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .map(FfmpegLogLevel::from)
}
