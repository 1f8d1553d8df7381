//! Shared state, event and configuration types for viewcap.
//!
//! These types are used by the render, encoder and session crates and by
//! host applications observing a capture session.

mod events;
mod state;
mod types;

pub use events::SessionEvent;
pub use state::{JobKind, SessionState};
pub use types::{CaptureConfig, Size, VideoOutput, DEFAULT_JPEG_QUALITY};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for events (session → host).
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<SessionEvent>, Receiver<SessionEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
