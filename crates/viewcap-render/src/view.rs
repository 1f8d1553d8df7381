//! Bitmap-backed views.

use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::RwLock;
use tracing::debug;
use viewcap_types::Size;

use crate::error::RenderError;
use crate::snapshot::fit_to;
use crate::{RenderResult, View};

/// A view showing a fixed bitmap, scaled to the requested size.
#[derive(Debug, Clone)]
pub struct ImageView {
    image: RgbaImage,
}

impl ImageView {
    /// Wrap an in-memory bitmap.
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Decode an image file into a view.
    pub fn open(path: impl AsRef<Path>) -> RenderResult<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|e| RenderError::Decode {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
            .to_rgba8();

        debug!(path = %path.display(), width = image.width(), height = image.height(), "Decoded image view");
        Ok(Self { image })
    }

    /// Take the underlying bitmap.
    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl View for ImageView {
    fn natural_size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }

    fn render(&self, size: Size) -> RenderResult<RgbaImage> {
        Ok(fit_to(self.image.clone(), size))
    }
}

/// A mutable bitmap surface shared between a drawing side and a capture side.
///
/// Clones share the same pixels, so a host can keep drawing into one clone
/// while a recording renders another.
#[derive(Debug, Clone)]
pub struct CanvasView {
    pixels: Arc<RwLock<RgbaImage>>,
}

impl CanvasView {
    /// Create a transparent canvas of the given size.
    pub fn new(size: Size) -> Self {
        Self::from_image(RgbaImage::new(size.width, size.height))
    }

    /// Create a canvas initialized with `image`.
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(RwLock::new(image)),
        }
    }

    /// Draw into the canvas.
    pub fn update<F>(&self, draw: F)
    where
        F: FnOnce(&mut RgbaImage),
    {
        draw(&mut self.pixels.write());
    }
}

impl View for CanvasView {
    fn natural_size(&self) -> Size {
        let pixels = self.pixels.read();
        Size::new(pixels.width(), pixels.height())
    }

    fn render(&self, size: Size) -> RenderResult<RgbaImage> {
        let copy = self.pixels.read().clone();
        Ok(fit_to(copy, size))
    }
}
