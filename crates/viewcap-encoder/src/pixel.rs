//! Frame preparation for the encoder.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::trace;

use crate::VideoSettings;

/// Packed RGB24 buffer size for the given dimensions.
pub fn rgb_frame_size(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

/// Convert an RGBA bitmap into the packed RGB24 layout the encoder expects.
///
/// The bitmap is rescaled to the declared output size when it differs, then
/// padded to the even coded size by repeating the last column and row.
/// Alpha is discarded.
pub fn prepare_frame(image: &RgbaImage, settings: &VideoSettings) -> Vec<u8> {
    let scaled;
    let source = if image.width() != settings.width || image.height() != settings.height {
        trace!(
            from_width = image.width(),
            from_height = image.height(),
            to_width = settings.width,
            to_height = settings.height,
            "Rescaling frame to output size"
        );
        scaled = imageops::resize(image, settings.width, settings.height, FilterType::Triangle);
        &scaled
    } else {
        image
    };

    let w = settings.width as usize;
    let h = settings.height as usize;
    let coded_w = settings.coded_width() as usize;
    let coded_h = settings.coded_height() as usize;

    let raw = source.as_raw();
    let mut rgb = vec![0u8; rgb_frame_size(settings.coded_width(), settings.coded_height())];

    for y in 0..coded_h {
        let src_row = y.min(h - 1) * w * 4;
        let dst_row = y * coded_w * 3;
        for x in 0..coded_w {
            let src = src_row + x.min(w - 1) * 4;
            let dst = dst_row + x * 3;
            rgb[dst..dst + 3].copy_from_slice(&raw[src..src + 3]);
        }
    }

    rgb
}
