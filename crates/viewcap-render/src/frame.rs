//! Captured frame types.

use image::RgbaImage;

/// Timestamp for a captured frame.
#[derive(Debug, Clone, Copy)]
pub struct CaptureTimestamp {
    /// Frame presentation timestamp in 100ns units.
    pub pts_100ns: u64,
}

impl CaptureTimestamp {
    /// Timestamp for frame `index` of a sequence paced at `frame_rate`.
    ///
    /// Frame `n` is presented at `n / frame_rate` seconds.
    pub fn for_frame(index: u64, frame_rate: f64) -> Self {
        Self {
            pts_100ns: (index as f64 * 10_000_000.0 / frame_rate).round() as u64,
        }
    }

    /// Get the presentation timestamp in milliseconds.
    pub fn pts_ms(&self) -> u64 {
        self.pts_100ns / 10_000
    }
}

/// A rendered view frame.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// RGBA pixel data.
    pub image: RgbaImage,

    /// Capture timestamp.
    pub timestamp: CaptureTimestamp,

    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

impl CapturedFrame {
    /// Create a new captured frame.
    pub fn new(image: RgbaImage, timestamp: CaptureTimestamp, sequence: u64) -> Self {
        Self {
            image,
            timestamp,
            sequence,
        }
    }
}
