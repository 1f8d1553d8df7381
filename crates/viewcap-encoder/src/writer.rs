//! MP4 video writer.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::RgbaImage;
use muxide::api::{Muxer, MuxerBuilder, VideoCodec as MuxCodec};
use tracing::{debug, info, instrument, trace, warn};
use viewcap_render::{CaptureTimestamp, CapturedFrame};
use viewcap_types::VideoOutput;

use crate::error::EncoderError;
use crate::nal::has_parameter_sets;
use crate::pixel::prepare_frame;
use crate::{create_video_encoder, EncodedVideoPacket, EncoderResult, VideoEncoder, VideoSettings};

/// File extension of written videos.
pub const OUTPUT_EXTENSION: &str = "mp4";

/// An open video file being written.
///
/// Frames are encoded and muxed as they are appended, in strictly
/// increasing presentation order. The file only survives if [`finish`]
/// succeeds; a writer dropped or aborted before that removes it.
///
/// [`finish`]: VideoWriter::finish
pub struct VideoWriter {
    path: PathBuf,
    settings: VideoSettings,
    frame_rate: f64,
    encoder: Box<dyn VideoEncoder>,
    muxer: Option<Muxer<File>>,
    frames_written: u64,
    last_pts_100ns: Option<u64>,
    finished: bool,
}

impl VideoWriter {
    /// Create the output file and its encoder.
    #[instrument(name = "video_writer_create", skip(path, settings), fields(path = %path.display()))]
    pub fn create(path: &Path, settings: VideoSettings, frame_rate: f64) -> EncoderResult<Self> {
        let encoder = create_video_encoder(&settings, frame_rate)?;

        match fs::remove_file(path) {
            Ok(()) => debug!("Replaced existing output file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let file = File::create(path)?;
        let muxer = MuxerBuilder::new(file)
            .video(
                MuxCodec::H264,
                settings.coded_width(),
                settings.coded_height(),
                frame_rate,
            )
            .build()
            .map_err(|e| {
                let _ = fs::remove_file(path);
                EncoderError::Initialization(format!("MP4 muxer setup failed: {e}"))
            })?;

        info!(
            width = settings.width,
            height = settings.height,
            frame_rate,
            "Video writer created"
        );

        Ok(Self {
            path: path.to_path_buf(),
            settings,
            frame_rate,
            encoder,
            muxer: Some(muxer),
            frames_written: 0,
            last_pts_100ns: None,
            finished: false,
        })
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Append a captured frame at its own presentation timestamp.
    pub fn append(&mut self, frame: &CapturedFrame) -> EncoderResult<()> {
        self.write_image(&frame.image, frame.timestamp, frame.sequence)
    }

    /// Append an image as the next frame in sequence.
    ///
    /// Returns the index of the written frame.
    pub fn append_image(&mut self, image: &RgbaImage) -> EncoderResult<u64> {
        let index = self.frames_written;
        let timestamp = CaptureTimestamp::for_frame(index, self.frame_rate);
        self.write_image(image, timestamp, index)?;
        Ok(index)
    }

    fn write_image(
        &mut self,
        image: &RgbaImage,
        timestamp: CaptureTimestamp,
        sequence: u64,
    ) -> EncoderResult<()> {
        if let Some(last) = self.last_pts_100ns {
            if timestamp.pts_100ns <= last {
                return Err(EncoderError::OutOfOrder {
                    pts_100ns: timestamp.pts_100ns,
                    last_pts_100ns: last,
                });
            }
        }

        let rgb = prepare_frame(image, &self.settings);
        let packet = self
            .encoder
            .encode(&rgb, timestamp.pts_100ns)?
            .ok_or_else(|| {
                EncoderError::Encoding(format!("encoder produced no data for frame {sequence}"))
            })?;

        if self.frames_written == 0 && !has_parameter_sets(&packet.data) {
            return Err(EncoderError::Encoding(
                "first access unit is missing SPS/PPS".to_string(),
            ));
        }

        self.mux(&packet)?;
        self.last_pts_100ns = Some(timestamp.pts_100ns);
        self.frames_written += 1;

        trace!(
            sequence,
            pts_ms = timestamp.pts_ms(),
            keyframe = packet.is_keyframe,
            bytes = packet.data.len(),
            "Frame appended"
        );
        Ok(())
    }

    fn mux(&mut self, packet: &EncodedVideoPacket) -> EncoderResult<()> {
        let muxer = self
            .muxer
            .as_mut()
            .ok_or_else(|| EncoderError::Muxing("writer already finalized".to_string()))?;

        let pts_secs = packet.pts_100ns as f64 / 10_000_000.0;
        muxer
            .write_video(pts_secs, &packet.data, packet.is_keyframe)
            .map_err(|e| EncoderError::Muxing(e.to_string()))
    }

    /// Flush the encoder and close the container.
    #[instrument(name = "video_writer_finish", skip(self), fields(path = %self.path.display()))]
    pub fn finish(mut self) -> EncoderResult<VideoOutput> {
        for packet in self.encoder.flush()? {
            self.mux(&packet)?;
        }

        if self.frames_written == 0 {
            return Err(EncoderError::NoFrames);
        }

        let muxer = self
            .muxer
            .take()
            .ok_or_else(|| EncoderError::Muxing("writer already finalized".to_string()))?;
        let _stats = muxer
            .finish_with_stats()
            .map_err(|e| EncoderError::Muxing(format!("failed to finalize container: {e}")))?;

        self.finished = true;

        let output = VideoOutput {
            path: self.path.clone(),
            frame_count: self.frames_written,
            duration: Duration::from_secs_f64(self.frames_written as f64 / self.frame_rate),
        };

        info!(
            frames = output.frame_count,
            duration_ms = output.duration.as_millis() as u64,
            "Video finalized"
        );
        Ok(output)
    }

    /// Discard the partially written file.
    pub fn abort(self) {
        debug!(path = %self.path.display(), frames = self.frames_written, "Aborting video writer");
    }
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        // Close the file handle before removing it.
        drop(self.muxer.take());

        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed unfinished video"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove unfinished video: {}", e),
        }
    }
}
