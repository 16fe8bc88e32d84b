//! Clip writing layer.
//!
//! The clip state machine only needs three things from a writer: open a file,
//! append frames one at a time, close it. The [`VideoSink`] and
//! [`SinkFactory`] traits capture exactly that, so the recorder can be driven
//! against an in-memory sink in tests. [`ClipEncoder`] is the production
//! implementation: an FFmpeg encode pipeline that stays open for the lifetime
//! of one clip and writes packets as frames arrive, so clip length never
//! affects memory use.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use stillcut::{ClipEncoderFactory, SinkFactory, SinkSpec, VideoSink};
//!
//! let spec = SinkSpec::new(15, 640, 480);
//! let mut factory = ClipEncoderFactory;
//! let mut sink = factory.open(Path::new("clip.avi"), &spec)?;
//! // append ResampledFrames as they arrive...
//! sink.close()?;
//! # Ok::<(), stillcut::StillcutError>(())
//! ```

use std::path::Path;

use ffmpeg_next::codec::Id;
use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::codec::encoder::video::Encoder as OpenVideoEncoder;
use ffmpeg_next::format::context::Output;
use ffmpeg_next::format::{Flags as FormatFlags, Pixel};
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use ffmpeg_next::{Packet, Rational};

use crate::error::StillcutError;
use crate::resampler::ResampledFrame;

/// Supported clip codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClipCodec {
    /// MPEG-4 Part 2 (the default; plays everywhere AVI does).
    #[default]
    Mpeg4,
    /// H.264 / AVC.
    H264,
}

impl ClipCodec {
    fn to_codec_id(self) -> Id {
        match self {
            ClipCodec::Mpeg4 => Id::MPEG4,
            ClipCodec::H264 => Id::H264,
        }
    }

    fn encoder_pixel_format(self) -> Pixel {
        Pixel::YUV420P
    }
}

/// Everything a [`SinkFactory`] needs to open a writer for one clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSpec {
    /// Codec the clip is encoded with.
    pub codec: ClipCodec,
    /// Clip frame rate; always the pipeline's target rate.
    pub frame_rate: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

impl SinkSpec {
    /// Spec for the default codec at the given rate and dimensions.
    pub fn new(frame_rate: u32, width: u32, height: u32) -> Self {
        Self {
            codec: ClipCodec::default(),
            frame_rate,
            width,
            height,
        }
    }

    /// Set the codec.
    #[must_use]
    pub fn with_codec(mut self, codec: ClipCodec) -> Self {
        self.codec = codec;
        self
    }
}

/// An open clip writer.
///
/// `close` is idempotent; calling it again after a successful close is a
/// no-op. A sink that is dropped without `close` leaves its file in whatever
/// in-progress state it reached.
pub trait VideoSink {
    /// Append one frame to the clip.
    fn append(&mut self, frame: &ResampledFrame) -> Result<(), StillcutError>;

    /// Flush and finish the file.
    fn close(&mut self) -> Result<(), StillcutError>;
}

/// Opens [`VideoSink`]s on demand, one per clip.
pub trait SinkFactory {
    /// The writer type this factory produces.
    type Sink: VideoSink;

    /// Open a writer at `path` for a clip described by `spec`.
    fn open(&mut self, path: &Path, spec: &SinkSpec) -> Result<Self::Sink, StillcutError>;
}

/// FFmpeg-backed [`VideoSink`] that encodes RGB frames into a clip file.
///
/// The container format is inferred from the path's extension. Frames are
/// converted RGB24 → YUV420P through a software scaler, stamped with
/// monotonically increasing timestamps in `1/frame_rate` units, and muxed
/// as soon as the encoder emits them.
pub struct ClipEncoder {
    output: Output,
    encoder: OpenVideoEncoder,
    scaler: ScalingContext,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    rgb_frame: VideoFrame,
    yuv_frame: VideoFrame,
    width: u32,
    height: u32,
    next_pts: i64,
    frames_written: u64,
    closed: bool,
}

impl ClipEncoder {
    /// Open an encoder writing to `path`.
    ///
    /// # Errors
    ///
    /// - [`StillcutError::VideoWriteError`] if the output file cannot be
    ///   created or its header cannot be written.
    /// - [`StillcutError::VideoEncodeError`] if the codec is unavailable or
    ///   refuses to open.
    pub fn create(path: &Path, spec: &SinkSpec) -> Result<Self, StillcutError> {
        log::debug!(
            "Opening clip writer: {} ({}x{}, {:?} at {} fps)",
            path.display(),
            spec.width,
            spec.height,
            spec.codec,
            spec.frame_rate,
        );

        ffmpeg_next::init().map_err(|e| {
            StillcutError::VideoWriteError(format!("FFmpeg initialisation failed: {e}"))
        })?;

        let mut output = ffmpeg_next::format::output(path)
            .map_err(|e| StillcutError::VideoWriteError(format!("cannot open output: {e}")))?;

        // Check if we need a global header before adding the stream (avoids
        // a borrow conflict).
        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let codec_id = spec.codec.to_codec_id();
        let encoder_codec = ffmpeg_next::encoder::find(codec_id).ok_or_else(|| {
            StillcutError::VideoEncodeError(format!("codec {codec_id:?} not available"))
        })?;

        let mut stream = output
            .add_stream(encoder_codec)
            .map_err(|e| StillcutError::VideoWriteError(format!("cannot add stream: {e}")))?;
        let stream_index = stream.index();

        let mut encoder = {
            let ctx = CodecContext::from_parameters(stream.parameters()).map_err(|e| {
                StillcutError::VideoEncodeError(format!("cannot create codec context: {e}"))
            })?;
            ctx.encoder().video().map_err(|e| {
                StillcutError::VideoEncodeError(format!("cannot open video encoder: {e}"))
            })?
        };

        let encoder_time_base = Rational::new(1, spec.frame_rate as i32);
        let target_pixel = spec.codec.encoder_pixel_format();

        encoder.set_width(spec.width);
        encoder.set_height(spec.height);
        encoder.set_format(target_pixel);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(Rational::new(spec.frame_rate as i32, 1)));

        // Set the global header flag if the format requires it.
        if needs_global_header {
            unsafe {
                (*encoder.as_mut_ptr()).flags |=
                    ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let opened_encoder = encoder
            .open_as(encoder_codec)
            .map_err(|e| StillcutError::VideoEncodeError(format!("cannot open encoder: {e}")))?;

        // Copy encoder parameters back to the stream.
        stream.set_parameters(&opened_encoder);

        output
            .write_header()
            .map_err(|e| StillcutError::VideoWriteError(format!("cannot write header: {e}")))?;

        // The muxer may adjust the stream time base while writing the header,
        // so read it back afterwards.
        let stream_time_base = output
            .stream(stream_index)
            .ok_or_else(|| {
                StillcutError::VideoWriteError("output stream vanished after header".to_string())
            })?
            .time_base();

        let scaler = ScalingContext::get(
            Pixel::RGB24,
            spec.width,
            spec.height,
            target_pixel,
            spec.width,
            spec.height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|e| StillcutError::VideoWriteError(format!("cannot create scaler: {e}")))?;

        Ok(Self {
            output,
            encoder: opened_encoder,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            rgb_frame: VideoFrame::new(Pixel::RGB24, spec.width, spec.height),
            yuv_frame: VideoFrame::empty(),
            width: spec.width,
            height: spec.height,
            next_pts: 0,
            frames_written: 0,
            closed: false,
        })
    }

    /// Receive every packet the encoder has ready and mux it.
    fn drain_packets(&mut self) -> Result<(), StillcutError> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|e| StillcutError::VideoWriteError(format!("write packet failed: {e}")))?;
        }
        Ok(())
    }
}

impl VideoSink for ClipEncoder {
    fn append(&mut self, frame: &ResampledFrame) -> Result<(), StillcutError> {
        if self.closed {
            return Err(StillcutError::VideoWriteError(
                "append on a closed clip writer".to_string(),
            ));
        }

        let image = &frame.image;
        if image.width() != self.width || image.height() != self.height {
            return Err(StillcutError::VideoEncodeError(format!(
                "frame is {}x{} but the clip was opened at {}x{}",
                image.width(),
                image.height(),
                self.width,
                self.height,
            )));
        }

        // Copy rows into the (possibly padded) FFmpeg frame.
        let stride = self.rgb_frame.stride(0);
        let row_len = self.width as usize * 3;
        let data = self.rgb_frame.data_mut(0);
        for (row_index, row) in image.as_raw().chunks_exact(row_len).enumerate() {
            let start = row_index * stride;
            data[start..start + row_len].copy_from_slice(row);
        }

        self.scaler
            .run(&self.rgb_frame, &mut self.yuv_frame)
            .map_err(|e| StillcutError::VideoWriteError(format!("scaling failed: {e}")))?;

        self.yuv_frame.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder
            .send_frame(&self.yuv_frame)
            .map_err(|e| StillcutError::VideoEncodeError(format!("send_frame failed: {e}")))?;
        self.drain_packets()?;

        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StillcutError> {
        if self.closed {
            return Ok(());
        }

        self.encoder
            .send_eof()
            .map_err(|e| StillcutError::VideoEncodeError(format!("send_eof failed: {e}")))?;
        self.drain_packets()?;

        self.output
            .write_trailer()
            .map_err(|e| StillcutError::VideoWriteError(format!("cannot write trailer: {e}")))?;

        self.closed = true;
        log::debug!("Closed clip writer after {} frames", self.frames_written);
        Ok(())
    }
}

/// [`SinkFactory`] producing [`ClipEncoder`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipEncoderFactory;

impl SinkFactory for ClipEncoderFactory {
    type Sink = ClipEncoder;

    fn open(&mut self, path: &Path, spec: &SinkSpec) -> Result<Self::Sink, StillcutError> {
        ClipEncoder::create(path, spec)
    }
}
