//! View rendering for viewcap.
//!
//! A [`View`] is any surface that can draw itself into an RGBA bitmap of a
//! requested size. This crate renders views into still images, encodes
//! snapshots as JPEG and wraps rendered bitmaps as timestamped frames for
//! the encoder.

mod error;
mod frame;
mod snapshot;
mod view;

pub use error::RenderError;
pub use frame::{CaptureTimestamp, CapturedFrame};
pub use snapshot::{jpeg_quality_scale, take_snapshot, take_snapshot_jpeg};
pub use view::{CanvasView, ImageView};

pub use image::{DynamicImage, Rgba, RgbaImage};
pub use viewcap_types::{Size, DEFAULT_JPEG_QUALITY};

/// Channel capacity for captured frames.
pub const FRAME_CHANNEL_CAPACITY: usize = 3;

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// A renderable UI surface.
///
/// Implementations draw their current visual state into a bitmap of the
/// requested size. Rendering may be called from a capture thread; a view
/// whose toolkit only allows reads from a specific thread must marshal the
/// call onto that thread itself.
pub trait View: Send + Sync {
    /// The size the view renders at when no size is requested.
    fn natural_size(&self) -> Size;

    /// Render the view's current contents at the given size.
    fn render(&self, size: Size) -> RenderResult<RgbaImage>;
}
