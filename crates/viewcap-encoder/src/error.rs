//! Error types for the encoder module.

use thiserror::Error;

/// Errors that can occur during encoding and container writing.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// Settings rejected before any resource was created.
    #[error("Invalid video settings: {0}")]
    InvalidSettings(String),

    /// Encoder or container could not be created.
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// General encoding error.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid input data.
    #[error("Invalid input data: {0}")]
    InvalidInput(String),

    /// Frame timestamp does not advance past the previous frame.
    #[error("Frame out of order: pts {pts_100ns} is not after {last_pts_100ns}")]
    OutOfOrder { pts_100ns: u64, last_pts_100ns: u64 },

    /// The MP4 muxer rejected a sample or failed to close.
    #[error("Muxing error: {0}")]
    Muxing(String),

    /// Filesystem error on the output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Finalization was requested before any frame was written.
    #[error("No frames were written")]
    NoFrames,
}
