//! Error types for the render module.

use std::path::PathBuf;

use thiserror::Error;
use viewcap_types::Size;

/// Errors that can occur while rendering or exporting a view.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Requested or rendered size has a zero dimension.
    #[error("Invalid render size: {0}")]
    InvalidSize(Size),

    /// JPEG quality outside (0.0, 1.0].
    #[error("Invalid JPEG quality {0}: expected a value in (0.0, 1.0]")]
    InvalidQuality(f32),

    /// The view failed to draw itself.
    #[error("View rendering failed: {0}")]
    RenderFailed(String),

    /// JPEG compression failed.
    #[error("JPEG encoding failed: {0}")]
    JpegEncoding(String),

    /// An image file could not be decoded.
    #[error("Failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },
}
