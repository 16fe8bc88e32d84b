//! Decoding layer for fixed-camera recordings.
//!
//! [`VideoSource`] wraps an FFmpeg demuxer/decoder pair and exposes the
//! recording as a pull-based sequence of RGB frames through the
//! [`FrameSource`] trait. Each call to [`decode_next`](FrameSource::decode_next)
//! reads just enough packets to produce one frame, so memory use stays flat
//! regardless of recording length. [`skip_next`](FrameSource::skip_next)
//! decodes a frame without converting it to RGB, which is what makes
//! fast-forwarding over already-processed stretches cheap.
//!
//! # Example
//!
//! ```no_run
//! use stillcut::{FrameSource, VideoSource};
//!
//! let mut source = VideoSource::open("2021-03-01T130000-3-r30.ogv")?;
//! println!("{} fps, {:?}", source.native_rate(), source.dimensions());
//!
//! while let Some(frame) = source.decode_next()? {
//!     // frame is an image::RgbImage
//!     let _ = frame.dimensions();
//! }
//! # Ok::<(), stillcut::StillcutError>(())
//! ```

use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Error as FfmpegError, Packet, codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder, format::Pixel, format::context::Input,
    frame::Video as VideoFrame, media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::error::StillcutError;

/// A pull-based supplier of decoded video frames at the recording's native rate.
///
/// [`VideoSource`] is the FFmpeg-backed implementation; tests substitute
/// synthetic sources that generate frames programmatically.
pub trait FrameSource {
    /// Frames per second the source actually delivers.
    fn native_rate(&self) -> f64;

    /// Frame dimensions as `(width, height)` in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Estimated total number of frames, or 0 when the container does not say.
    fn frame_count(&self) -> u64;

    /// Decode and return the next frame, or `None` at end of stream.
    fn decode_next(&mut self) -> Result<Option<RgbImage>, StillcutError>;

    /// Advance past the next frame without converting it to RGB.
    ///
    /// Returns `false` at end of stream. Decoding still happens (inter-frame
    /// codecs need every frame to reconstruct the next), but the colorspace
    /// conversion and buffer copy are skipped.
    fn skip_next(&mut self) -> Result<bool, StillcutError>;
}

/// An FFmpeg-backed [`FrameSource`] over a single video file.
///
/// Opens the best video stream, decodes it packet by packet, and converts
/// each frame to RGB24 via a software scaler. Audio and subtitle streams are
/// ignored.
pub struct VideoSource {
    input: Input,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    stream_index: usize,
    native_rate: f64,
    width: u32,
    height: u32,
    frame_count: u64,
    decoded_frame: VideoFrame,
    scaled_frame: VideoFrame,
    eof_sent: bool,
    path: PathBuf,
}

impl std::fmt::Debug for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSource")
            .field("path", &self.path)
            .field("stream_index", &self.stream_index)
            .field("native_rate", &self.native_rate)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frame_count", &self.frame_count)
            .field("eof_sent", &self.eof_sent)
            .finish_non_exhaustive()
    }
}

impl VideoSource {
    /// Open a recording and prepare it for decoding.
    ///
    /// The best video stream is selected and its average frame rate is taken
    /// as the native rate, falling back to the declared stream rate when the
    /// container does not carry an average.
    ///
    /// # Errors
    ///
    /// Returns [`StillcutError::FileOpen`] if the file cannot be opened or
    /// reports no usable frame rate, and [`StillcutError::NoVideoStream`] if
    /// it contains no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StillcutError> {
        let path = path.as_ref();
        let canonical_path = path.to_path_buf();

        log::debug!("Opening video source: {}", canonical_path.display());

        // Initialise ffmpeg (safe to call multiple times).
        ffmpeg_next::init().map_err(|error| StillcutError::FileOpen {
            path: canonical_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input =
            ffmpeg_next::format::input(&path).map_err(|error| StillcutError::FileOpen {
                path: canonical_path.clone(),
                reason: error.to_string(),
            })?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or(StillcutError::NoVideoStream)?;
        let stream_index = stream.index();

        let average = stream.avg_frame_rate();
        let native_rate = if average.numerator() > 0 && average.denominator() > 0 {
            f64::from(average.numerator()) / f64::from(average.denominator())
        } else {
            let declared = stream.rate();
            if declared.numerator() > 0 && declared.denominator() > 0 {
                f64::from(declared.numerator()) / f64::from(declared.denominator())
            } else {
                0.0
            }
        };
        if native_rate <= 0.0 {
            return Err(StillcutError::FileOpen {
                path: canonical_path,
                reason: "stream reports no frame rate".to_string(),
            });
        }

        // Prefer the stream's own frame count; estimate from the container
        // duration when it is absent.
        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else if input.duration() > 0 {
            (input.duration() as f64 / f64::from(ffmpeg_sys_next::AV_TIME_BASE) * native_rate)
                as u64
        } else {
            0
        };

        let codec_parameters = stream.parameters();
        let decoder_context =
            CodecContext::from_parameters(codec_parameters).map_err(|error| {
                StillcutError::FileOpen {
                    path: canonical_path.clone(),
                    reason: format!("Failed to read video codec parameters: {error}"),
                }
            })?;
        let decoder = decoder_context.decoder().video().map_err(|error| {
            StillcutError::FileOpen {
                path: canonical_path.clone(),
                reason: format!("Failed to open video decoder: {error}"),
            }
        })?;

        let width = decoder.width();
        let height = decoder.height();

        let scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|error| StillcutError::VideoDecodeError(format!(
            "Failed to create scaler: {error}"
        )))?;

        log::debug!(
            "Video stream {stream_index}: {width}x{height} at {native_rate:.2} fps, \
             ~{frame_count} frames"
        );

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            native_rate,
            width,
            height,
            frame_count,
            decoded_frame: VideoFrame::empty(),
            scaled_frame: VideoFrame::empty(),
            eof_sent: false,
            path: canonical_path,
        })
    }

    /// Path this source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the next frame into `self.decoded_frame`.
    ///
    /// Returns `false` once the stream and decoder are fully drained.
    fn advance(&mut self) -> Result<bool, StillcutError> {
        loop {
            // Try to receive a frame the decoder has already produced.
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                return Ok(true);
            }

            // Decoder has no buffered frames. Feed it more packets.
            if self.eof_sent {
                return Ok(false);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder.send_packet(&packet).map_err(|error| {
                            StillcutError::VideoDecodeError(error.to_string())
                        })?;
                    }
                    // Non-video packets are silently skipped.
                }
                Err(FfmpegError::Eof) => {
                    self.decoder
                        .send_eof()
                        .map_err(|error| StillcutError::VideoDecodeError(error.to_string()))?;
                    self.eof_sent = true;
                }
                Err(_) => {
                    // Non-fatal read error; try the next packet.
                }
            }
        }
    }

    /// Scale and convert the current `decoded_frame` to an [`RgbImage`].
    fn convert_current_frame(&mut self) -> Result<RgbImage, StillcutError> {
        self.scaler
            .run(&self.decoded_frame, &mut self.scaled_frame)
            .map_err(|error| {
                StillcutError::VideoDecodeError(format!("Failed to scale frame: {error}"))
            })?;

        let buf = frame_to_rgb_buffer(&self.scaled_frame, self.width, self.height);
        RgbImage::from_raw(self.width, self.height, buf).ok_or_else(|| {
            StillcutError::VideoDecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })
    }
}

impl FrameSource for VideoSource {
    fn native_rate(&self) -> f64 {
        self.native_rate
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn decode_next(&mut self) -> Result<Option<RgbImage>, StillcutError> {
        if self.advance()? {
            self.convert_current_frame().map(Some)
        } else {
            Ok(None)
        }
    }

    fn skip_next(&mut self) -> Result<bool, StillcutError> {
        self.advance()
    }
}

/// Copy the RGB24 plane of `frame` into a tightly packed buffer.
///
/// FFmpeg pads each row out to the frame's stride; `image` expects rows
/// back to back.
fn frame_to_rgb_buffer(frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let row_length = width as usize * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_length {
        return data[..row_length * height as usize].to_vec();
    }

    let mut buffer = Vec::with_capacity(row_length * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        buffer.extend_from_slice(&data[start..start + row_length]);
    }
    buffer
}
