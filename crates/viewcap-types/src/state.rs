//! Session state machine types.

use serde::{Deserialize, Serialize};

/// The current state of a capture session.
///
/// Recording: `Idle -> Recording -> Finalizing -> Idle`.
/// Image assembly: `Idle -> Assembling -> Finalizing -> Idle`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No job in progress.
    #[default]
    Idle,

    /// Live recording is capturing frames.
    Recording,

    /// A video is being assembled from still images.
    Assembling {
        /// Number of images in the sequence.
        total_frames: usize,
    },

    /// Input has ended and the container is being written.
    Finalizing {
        /// Which job is finalizing.
        job: JobKind,
    },
}

impl SessionState {
    /// Returns true if the session is idle.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if the session is recording.
    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    /// Returns true if the session is assembling a video from images.
    pub fn is_assembling(&self) -> bool {
        matches!(self, Self::Assembling { .. })
    }

    /// Returns true if the session is finalizing.
    pub fn is_finalizing(&self) -> bool {
        matches!(self, Self::Finalizing { .. })
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Recording => "Recording",
            Self::Assembling { .. } => "Assembling",
            Self::Finalizing { .. } => "Finalizing",
        }
    }
}

/// The kind of job a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    /// Live recording of a view.
    Recording,

    /// Video assembly from still images.
    Assembly,
}

impl JobKind {
    /// Returns the display name for this job.
    pub fn name(self) -> &'static str {
        match self {
            Self::Recording => "recording",
            Self::Assembly => "assembly",
        }
    }
}
