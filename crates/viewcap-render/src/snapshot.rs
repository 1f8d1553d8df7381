//! Still image capture of a view.

use std::io::Cursor;

use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageEncoder, RgbaImage};
use tracing::{debug, instrument, trace};
use viewcap_types::Size;

use crate::error::RenderError;
use crate::{RenderResult, View};

/// Render `view` into a still image.
///
/// `size` defaults to the view's natural size. The returned image always has
/// exactly the requested dimensions.
#[instrument(name = "take_snapshot", skip(view))]
pub fn take_snapshot<V>(view: &V, size: Option<Size>) -> RenderResult<RgbaImage>
where
    V: View + ?Sized,
{
    let target = size.unwrap_or_else(|| view.natural_size());
    if target.is_empty() {
        return Err(RenderError::InvalidSize(target));
    }

    let rendered = view.render(target)?;
    if rendered.width() == 0 || rendered.height() == 0 {
        return Err(RenderError::InvalidSize(Size::new(
            rendered.width(),
            rendered.height(),
        )));
    }
    let image = fit_to(rendered, target);

    trace!(%target, "Snapshot rendered");
    Ok(image)
}

/// Render `view` and compress the result as JPEG.
///
/// `quality` must lie in (0.0, 1.0], where 1.0 is the highest fidelity.
#[instrument(name = "take_snapshot_jpeg", skip(view))]
pub fn take_snapshot_jpeg<V>(view: &V, quality: f32, size: Option<Size>) -> RenderResult<Bytes>
where
    V: View + ?Sized,
{
    let scale = jpeg_quality_scale(quality)?;
    let image = take_snapshot(view, size)?;

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, scale);
    encoder
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| RenderError::JpegEncoding(e.to_string()))?;

    let bytes = buf.into_inner();
    debug!(quality = scale, len = bytes.len(), "Snapshot encoded as JPEG");

    Ok(Bytes::from(bytes))
}

/// Map a quality factor in (0.0, 1.0] onto the JPEG 1-100 scale.
pub fn jpeg_quality_scale(quality: f32) -> RenderResult<u8> {
    if !quality.is_finite() || quality <= 0.0 || quality > 1.0 {
        return Err(RenderError::InvalidQuality(quality));
    }

    Ok(((quality * 100.0).round() as u8).clamp(1, 100))
}

/// Rescale `image` to `target` unless it already matches.
pub(crate) fn fit_to(image: RgbaImage, target: Size) -> RgbaImage {
    if image.width() == target.width && image.height() == target.height {
        return image;
    }

    trace!(
        from_width = image.width(),
        from_height = image.height(),
        %target,
        "Rescaling rendered image"
    );
    imageops::resize(&image, target.width, target.height, FilterType::Triangle)
}
