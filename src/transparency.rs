//! Transparency detection by sparse sampling.
//!
//! PNG and WebP are checked on a coarse grid of roughly
//! [`TRANSPARENCY_SAMPLE_SIZE`] pixels, so a transparent region that falls
//! between grid points is missed. GIF only needs its declared transparent
//! index. JPEG has no alpha.

use crate::codec::{Codec, DecodedImage};
use crate::constants::TRANSPARENCY_SAMPLE_SIZE;
use crate::error::Result;
use crate::formats::SourceFormat;

/// Grid spacing per axis for an image of the given size, never below 1.
pub fn sample_steps(width: u32, height: u32) -> (u32, u32) {
    let pixels = u64::from(width) * u64::from(height);
    let sample_size = TRANSPARENCY_SAMPLE_SIZE.min(pixels).max(1);
    let root = (sample_size as f64).sqrt();
    let step = |dimension: u32| ((f64::from(dimension) / root).floor() as u32).max(1);
    (step(width), step(height))
}

pub fn has_transparency(image: &DecodedImage, format: SourceFormat) -> bool {
    match format {
        SourceFormat::Jpeg => false,
        SourceFormat::Gif => image.transparent_index().is_some(),
        SourceFormat::Png | SourceFormat::WebP => sample_alpha(image),
    }
}

/// Decode `bytes` and probe them; the decoded buffer is dropped before returning.
pub fn probe_bytes(codec: &dyn Codec, bytes: &[u8]) -> Result<bool> {
    let decoded = codec.decode(bytes)?;
    Ok(has_transparency(&decoded, decoded.format()))
}

fn sample_alpha(image: &DecodedImage) -> bool {
    if !image.has_alpha_channel() {
        return false;
    }

    let (width, height) = (image.width(), image.height());
    let (step_x, step_y) = sample_steps(width, height);

    for x in (0..width).step_by(step_x as usize) {
        for y in (0..height).step_by(step_y as usize) {
            if image.pixel_at(x, y).0[3] < u8::MAX {
                return true;
            }
        }
    }
    false
}
