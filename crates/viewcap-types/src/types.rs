//! Common value types used across crates.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Pixel dimensions of a rendered surface or an output video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a new size.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true if either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered by this size.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// JPEG quality used for snapshots when none is configured.
pub const DEFAULT_JPEG_QUALITY: f32 = 0.8;

/// Configuration for a capture session.
///
/// Fields missing from a serialized config take their [`Default`] values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Frames per second for recording and image assembly.
    pub frame_rate: f64,

    /// Destination video file. A unique file in the system temp
    /// directory is used when unset.
    pub output_path: Option<PathBuf>,

    /// Default JPEG quality for snapshots (0.0 - 1.0).
    pub jpeg_quality: f32,
}

impl CaptureConfig {
    /// Create a configuration for the given output size, keeping other defaults.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Output size as a [`Size`].
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Duration of a single frame at the configured frame rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: 30.0,
            output_path: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// A finished video file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoOutput {
    /// Location of the finalized file.
    pub path: PathBuf,

    /// Number of frames written.
    pub frame_count: u64,

    /// Presentation duration (frame_count / frame_rate).
    pub duration: Duration,
}
