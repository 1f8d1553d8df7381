//! Events sent from a capture session to the host.

use serde::{Deserialize, Serialize};

use crate::state::{JobKind, SessionState};
use crate::types::VideoOutput;

/// Events that a capture session can send to an observer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Session state has changed.
    StateChanged {
        /// Previous state.
        previous: SessionState,

        /// Current state.
        current: SessionState,
    },

    /// A job produced a finalized video.
    Finished {
        /// Which job finished.
        job: JobKind,

        /// The written file.
        output: VideoOutput,
    },

    /// A job failed and its partial output was discarded.
    Failed {
        /// Which job failed.
        job: JobKind,

        /// Error message.
        message: String,
    },
}
