//! H.264 encoding and MP4 writing for captured frames.
//!
//! This crate derives encoder settings from an output size, encodes RGBA
//! frames to H.264 with OpenH264 and muxes the result into an MP4 file
//! through [`VideoWriter`], the handle a capture job owns while it runs.

mod error;
mod h264;
mod nal;
mod pixel;
mod writer;

pub use error::EncoderError;
pub use h264::OpenH264Encoder;
pub use nal::{contains_idr, parse_annex_b, NalUnit, NalUnitType};
pub use pixel::{prepare_frame, rgb_frame_size};
pub use writer::{VideoWriter, OUTPUT_EXTENSION};

use bytes::Bytes;
use viewcap_types::Size;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Lower bound for derived bitrates.
pub const MIN_BITRATE_KBPS: u32 = 500;

/// Upper bound for derived bitrates.
pub const MAX_BITRATE_KBPS: u32 = 20_000;

/// Bits per pixel per second used to derive the bitrate (~0.1 bpp at 30 fps).
const BITS_PER_PIXEL_SECOND: u64 = 3;

/// Video codecs the writer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
}

/// Encoder configuration derived from an output size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSettings {
    /// Output codec.
    pub codec: VideoCodec,

    /// Declared width in pixels.
    pub width: u32,

    /// Declared height in pixels.
    pub height: u32,

    /// Target bitrate in kbps.
    pub bitrate_kbps: u32,

    /// Keyframe interval in seconds.
    pub keyframe_interval_secs: u32,
}

impl VideoSettings {
    /// Declared output size.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Width rounded up to a multiple of two for 4:2:0 chroma.
    pub fn coded_width(&self) -> u32 {
        self.width + self.width % 2
    }

    /// Height rounded up to a multiple of two for 4:2:0 chroma.
    pub fn coded_height(&self) -> u32 {
        self.height + self.height % 2
    }

    /// Size of the frames handed to the encoder.
    pub fn coded_size(&self) -> Size {
        Size::new(self.coded_width(), self.coded_height())
    }

    /// Number of frames between forced keyframes at `frame_rate`.
    pub fn keyframe_interval_frames(&self, frame_rate: f64) -> u64 {
        ((self.keyframe_interval_secs as f64 * frame_rate).round() as u64).max(1)
    }
}

/// Derive encoder settings for a target pixel size.
pub fn video_settings(size: Size) -> EncoderResult<VideoSettings> {
    if size.is_empty() {
        return Err(EncoderError::InvalidSettings(format!(
            "output size must be positive, got {size}"
        )));
    }

    let bitrate_kbps = (size.area() * BITS_PER_PIXEL_SECOND / 1000)
        .clamp(MIN_BITRATE_KBPS as u64, MAX_BITRATE_KBPS as u64) as u32;

    Ok(VideoSettings {
        codec: VideoCodec::H264,
        width: size.width,
        height: size.height,
        bitrate_kbps,
        keyframe_interval_secs: 2,
    })
}

/// An encoded video packet.
#[derive(Debug, Clone)]
pub struct EncodedVideoPacket {
    /// Annex B NAL data.
    pub data: Bytes,

    /// Presentation timestamp in 100ns units.
    pub pts_100ns: u64,

    /// Whether this packet starts with an IDR picture.
    pub is_keyframe: bool,
}

/// Trait for video encoders.
pub trait VideoEncoder: Send {
    /// Encode a frame of packed RGB24 pixels at the coded size.
    fn encode(&mut self, frame: &[u8], pts_100ns: u64)
        -> EncoderResult<Option<EncodedVideoPacket>>;

    /// Flush any remaining frames.
    fn flush(&mut self) -> EncoderResult<Vec<EncodedVideoPacket>>;

    /// Get encoder name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Create the default video encoder for the given settings.
pub fn create_video_encoder(
    settings: &VideoSettings,
    frame_rate: f64,
) -> EncoderResult<Box<dyn VideoEncoder>> {
    let encoder = OpenH264Encoder::new(settings.clone(), frame_rate)?;
    tracing::info!(encoder = encoder.name(), "Using software H.264 encoder");
    Ok(Box::new(encoder))
}
