//! Error types for capture sessions.

use thiserror::Error;
use viewcap_encoder::EncoderError;
use viewcap_render::RenderError;

/// Errors reported by a capture session, either synchronously or through a
/// [`CompletionHandle`](crate::CompletionHandle).
#[derive(Debug, Error)]
pub enum SessionError {
    /// Size, frame rate, quality or input rejected before any work started.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The output file or encoder could not be created.
    #[error("Encoder initialization failed: {0}")]
    EncoderInitFailure(#[source] EncoderError),

    /// A frame could not be rendered, decoded, converted or appended.
    #[error("Frame {index} could not be encoded: {reason}")]
    FrameEncodeFailure { index: u64, reason: String },

    /// The container could not be closed.
    #[error("Finalization failed: {0}")]
    FinalizationFailure(#[source] EncoderError),

    /// Another job is still in progress.
    #[error("Session busy: currently {0}")]
    Busy(&'static str),

    /// `stop_recording` was called while not recording.
    #[error("Not recording")]
    NotRecording,

    /// The job was cancelled through its completion handle.
    #[error("Job cancelled")]
    Cancelled,

    /// A snapshot could not be taken.
    #[error("Snapshot failed: {0}")]
    Snapshot(#[from] RenderError),

    /// A background thread could not be started.
    #[error("Failed to start background thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker went away without reporting a result.
    #[error("Capture worker exited without reporting a result")]
    WorkerLost,
}

/// Coarse error category, for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidConfiguration,
    EncoderInitFailure,
    FrameEncodeFailure,
    FinalizationFailure,
    Busy,
    NotRecording,
    Cancelled,
    Snapshot,
    Internal,
}

impl SessionError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Self::EncoderInitFailure(_) => ErrorKind::EncoderInitFailure,
            Self::FrameEncodeFailure { .. } => ErrorKind::FrameEncodeFailure,
            Self::FinalizationFailure(_) => ErrorKind::FinalizationFailure,
            Self::Busy(_) => ErrorKind::Busy,
            Self::NotRecording => ErrorKind::NotRecording,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Snapshot(_) => ErrorKind::Snapshot,
            Self::Spawn(_) | Self::WorkerLost => ErrorKind::Internal,
        }
    }

    pub(crate) fn frame(index: u64, reason: impl ToString) -> Self {
        Self::FrameEncodeFailure {
            index,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            SessionError::frame(3, "bad pixels").kind(),
            ErrorKind::FrameEncodeFailure
        );
        assert_eq!(SessionError::NotRecording.kind(), ErrorKind::NotRecording);
        assert_eq!(
            SessionError::FinalizationFailure(EncoderError::NoFrames).kind(),
            ErrorKind::FinalizationFailure
        );
    }

    #[test]
    fn test_frame_error_message() {
        let err = SessionError::frame(7, "decode failed");
        assert_eq!(err.to_string(), "Frame 7 could not be encoded: decode failed");
    }
}
