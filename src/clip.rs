//! Clip and recording identity.
//!
//! Filenames are the only persisted contract in this pipeline. A recording
//! arrives as `<timestamp>-<channel>-r<fps>.<ext>`, and every clip cut from
//! it is named after the wall-clock moment it starts:
//!
//! - in progress: `2021-03-01-130500-03-r15.avi`
//! - finalized:   `2021-03-01-130500-03-r15-d002133.avi`
//!
//! The `-d` suffix encodes the clip duration in hundredths of a second, so
//! a later run can tell how much of the stream an existing clip already
//! covers without opening it.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::StillcutError;

/// One recording file, as described by its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceVideo {
    /// Where the recording lives.
    pub path: PathBuf,
    /// Wall-clock time the recording started.
    pub start: NaiveDateTime,
    /// Camera channel (bed number) the recording came from.
    pub channel: u32,
    /// Frame rate the file name claims; checked against the stream on open.
    pub declared_rate: u32,
}

impl SourceVideo {
    /// Parse a recording's identity out of its file name.
    ///
    /// The name must follow `<timestamp>-<channel>-r<fps>.<ext>`, where the
    /// timestamp may contain dashes itself (`2021-03-01T130500` and the
    /// clip-style `2021-03-01-130500` both work).
    ///
    /// # Errors
    ///
    /// Returns [`StillcutError::InvalidSourceName`] when any of the three
    /// components is missing or malformed.
    ///
    /// # Example
    ///
    /// ```
    /// use stillcut::SourceVideo;
    ///
    /// let video = SourceVideo::from_path("2021-03-01T13:05:00-3-r30.ogv")?;
    /// assert_eq!(video.channel, 3);
    /// assert_eq!(video.declared_rate, 30);
    /// # Ok::<(), stillcut::StillcutError>(())
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, StillcutError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or_default()
            .to_string();
        let invalid = |reason: String| StillcutError::InvalidSourceName {
            name: name.clone(),
            reason,
        };

        let stem = path
            .file_stem()
            .and_then(OsStr::to_str)
            .ok_or_else(|| invalid("file name is not valid UTF-8".to_string()))?;

        let mut parts = stem.rsplitn(3, '-');
        let (Some(rate_token), Some(channel_token), Some(timestamp_token)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid(
                "expected <timestamp>-<channel>-r<fps>".to_string(),
            ));
        };

        let declared_rate = rate_token
            .strip_prefix('r')
            .and_then(|value| value.parse::<u32>().ok())
            .ok_or_else(|| invalid(format!("bad frame rate token {rate_token:?}")))?;

        let channel = channel_token
            .parse::<u32>()
            .map_err(|_| invalid(format!("bad channel token {channel_token:?}")))?;

        let start = parse_start_timestamp(timestamp_token)
            .ok_or_else(|| invalid(format!("unparseable timestamp {timestamp_token:?}")))?;

        Ok(Self {
            path: path.to_path_buf(),
            start,
            channel,
            declared_rate,
        })
    }
}

/// The identity a clip is named by: wall-clock start, channel, frame rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipName {
    /// Wall-clock time the clip starts (recording start + stream offset).
    pub start: NaiveDateTime,
    /// Camera channel the clip belongs to.
    pub channel: u32,
    /// Frame rate of the clip.
    pub rate: u32,
}

impl ClipName {
    /// Create a clip name.
    pub fn new(start: NaiveDateTime, channel: u32, rate: u32) -> Self {
        Self {
            start,
            channel,
            rate,
        }
    }

    /// Name stem without extension or duration suffix.
    pub fn stem(&self) -> String {
        format!(
            "{}-{:02}-r{}",
            self.start.format("%Y-%m-%d-%H%M%S"),
            self.channel,
            self.rate,
        )
    }

    /// File name for a clip still being written.
    pub fn in_progress_file_name(&self, extension: &str) -> String {
        format!("{}.{extension}", self.stem())
    }

    /// File name for a finalized clip of the given duration.
    pub fn finalized_file_name(&self, duration: Duration, extension: &str) -> String {
        format!(
            "{}-d{:06}.{extension}",
            self.stem(),
            encode_duration(duration),
        )
    }

    /// If `file_name` is a finalized clip for this identity, its encoded
    /// duration.
    ///
    /// Accepts both the zero-padded channel this crate writes and the
    /// unpadded form older outputs used.
    pub fn finalized_duration(&self, file_name: &str, extension: &str) -> Option<Duration> {
        let body = file_name.strip_suffix(&format!(".{extension}"))?;

        let padded = self.stem();
        let unpadded = format!(
            "{}-{}-r{}",
            self.start.format("%Y-%m-%d-%H%M%S"),
            self.channel,
            self.rate,
        );

        let mut stems = vec![padded.as_str()];
        if unpadded != padded {
            stems.push(unpadded.as_str());
        }

        for stem in stems {
            let Some(token) = body
                .strip_prefix(stem)
                .and_then(|rest| rest.strip_prefix("-d"))
            else {
                continue;
            };
            if token.len() >= 6 && token.bytes().all(|b| b.is_ascii_digit()) {
                let centiseconds: u64 = token.parse().ok()?;
                return Some(Duration::from_millis(centiseconds * 10));
            }
        }
        None
    }
}

/// Summary of one finalized clip, emitted when the recorder renames it.
#[derive(Debug, Clone)]
pub struct ClipSummary {
    /// Final path of the clip on disk.
    pub path: PathBuf,
    /// Wall-clock time the clip starts.
    pub start: NaiveDateTime,
    /// Offset of the clip start into the source stream.
    pub start_offset: Duration,
    /// Total clip duration, trailing quiet padding included.
    pub duration: Duration,
    /// Number of frames written, pre-roll included.
    pub frames: u64,
}

/// Duration in hundredths of a second, as encoded in finalized names.
fn encode_duration(duration: Duration) -> u64 {
    (duration.as_secs_f64() * 100.0).round() as u64
}

fn parse_start_timestamp(value: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H%M%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d-%H%M%S",
    ];

    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            // Date-only names start the recording at midnight.
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_timestamp_shapes() {
        let expected = NaiveDate::from_ymd_opt(2021, 3, 1)
            .unwrap()
            .and_hms_opt(13, 5, 0)
            .unwrap();

        for value in [
            "2021-03-01T13:05:00",
            "2021-03-01T130500",
            "2021-03-01 13:05:00",
            "2021-03-01-130500",
        ] {
            assert_eq!(parse_start_timestamp(value), Some(expected), "{value}");
        }

        let midnight = NaiveDate::from_ymd_opt(2021, 3, 1)
            .unwrap()
            .and_time(NaiveTime::MIN);
        assert_eq!(parse_start_timestamp("2021-03-01"), Some(midnight));

        assert_eq!(parse_start_timestamp("yesterday"), None);
    }

    #[test]
    fn encodes_duration_in_centiseconds() {
        assert_eq!(encode_duration(Duration::from_secs_f64(21.33)), 2133);
        assert_eq!(encode_duration(Duration::ZERO), 0);
        assert_eq!(encode_duration(Duration::from_secs(12_000)), 1_200_000);
    }
}
