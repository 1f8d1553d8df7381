//! OpenH264 software video encoder.

use bytes::Bytes;
use openh264::encoder::{Encoder, EncoderConfig, UsageType};
use openh264::formats::{RgbSliceU8, YUVBuffer};
use openh264::OpenH264API;
use tracing::{debug, instrument, trace};

use crate::error::EncoderError;
use crate::nal::contains_idr;
use crate::pixel::rgb_frame_size;
use crate::{EncodedVideoPacket, EncoderResult, VideoEncoder, VideoSettings};

/// OpenH264 encoder wrapper.
pub struct OpenH264Encoder {
    encoder: Encoder,
    settings: VideoSettings,
    frame_count: u64,
    keyframe_interval: u64,
}

impl OpenH264Encoder {
    /// Create a new OpenH264 encoder.
    #[instrument(name = "openh264_new", skip_all)]
    pub fn new(settings: VideoSettings, frame_rate: f64) -> EncoderResult<Self> {
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(EncoderError::InvalidSettings(format!(
                "frame rate must be positive, got {frame_rate}"
            )));
        }

        debug!(
            width = settings.width,
            height = settings.height,
            frame_rate,
            bitrate_kbps = settings.bitrate_kbps,
            "Initializing OpenH264 encoder"
        );

        let keyframe_interval = settings.keyframe_interval_frames(frame_rate);

        // Frame skipping would break the one-input-one-sample mapping.
        let config = EncoderConfig::new()
            .set_bitrate_bps(settings.bitrate_kbps * 1000)
            .max_frame_rate(frame_rate as f32)
            .usage_type(UsageType::ScreenContentRealTime)
            .enable_skip_frame(false);

        let encoder = Encoder::with_api_config(OpenH264API::from_source(), config)
            .map_err(|e| EncoderError::Initialization(format!("OpenH264 setup failed: {e}")))?;

        Ok(Self {
            encoder,
            settings,
            frame_count: 0,
            keyframe_interval,
        })
    }
}

impl VideoEncoder for OpenH264Encoder {
    #[instrument(name = "openh264_encode", skip(self, frame))]
    fn encode(
        &mut self,
        frame: &[u8],
        pts_100ns: u64,
    ) -> EncoderResult<Option<EncodedVideoPacket>> {
        let width = self.settings.coded_width();
        let height = self.settings.coded_height();
        let expected_size = rgb_frame_size(width, height);
        if frame.len() != expected_size {
            return Err(EncoderError::InvalidInput(format!(
                "Expected {} bytes ({}x{} RGB24), got {}",
                expected_size,
                width,
                height,
                frame.len()
            )));
        }

        if self.frame_count > 0 && self.frame_count % self.keyframe_interval == 0 {
            self.encoder.force_intra_frame();
        }

        trace!(frame = self.frame_count, pts = pts_100ns, "Encoding frame");

        let rgb = RgbSliceU8::new(frame, (width as usize, height as usize));
        let yuv = YUVBuffer::from_rgb_source(rgb);

        let bitstream = self
            .encoder
            .encode(&yuv)
            .map_err(|e| EncoderError::Encoding(format!("OpenH264 encode failed: {e}")))?;
        let data = bitstream.to_vec();

        self.frame_count += 1;

        // Rate control dropped the picture
        if data.is_empty() {
            return Ok(None);
        }

        let is_keyframe = contains_idr(&data);

        Ok(Some(EncodedVideoPacket {
            data: Bytes::from(data),
            pts_100ns,
            is_keyframe,
        }))
    }

    fn flush(&mut self) -> EncoderResult<Vec<EncodedVideoPacket>> {
        // OpenH264 emits one access unit per input and never reorders.
        debug!(frames = self.frame_count, "Flushing OpenH264 encoder");
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "openh264"
    }
}

// SAFETY: the OpenH264 encoder holds a raw pointer to its native instance.
// It is owned by a single writer and only used from one thread at a time.
unsafe impl Send for OpenH264Encoder {}
