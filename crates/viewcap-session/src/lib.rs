//! Capture session for viewcap.
//!
//! [`CaptureSession`] ties a [`View`] to the encoder: it takes snapshots,
//! assembles videos from still images and records the view live. Video jobs
//! run on a worker thread and report through a [`CompletionHandle`].
//!
//! # Architecture
//!
//! ```text
//! Scheduler tick ──► render view ──► [frame channel] ──► worker ──► VideoWriter ──► MP4
//!                                                           │
//!                                                           └──► CompletionHandle / SessionEvent
//! ```

mod completion;
mod error;
mod scheduler;
mod session;
mod worker;

pub use completion::{CompletionHandle, JobResult};
pub use error::{ErrorKind, SessionError};
pub use scheduler::{
    ManualScheduler, RepeatingTask, Scheduler, TaskHandle, ThreadScheduler, TickControl,
};
pub use session::{CaptureSession, MAX_FRAME_RATE};
pub use worker::ImageSource;

pub use viewcap_encoder::{video_settings, VideoSettings};
pub use viewcap_render::View;
pub use viewcap_types::{
    event_channel, CaptureConfig, JobKind, SessionEvent, SessionState, Size, VideoOutput,
    DEFAULT_JPEG_QUALITY,
};

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
