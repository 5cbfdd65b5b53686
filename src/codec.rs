//! Decode/encode seam.
//!
//! The converter and the transparency probe only talk to [`Codec`]; the default
//! [`ImageCodec`] decodes through the `image` crate and encodes JPEG with
//! mozjpeg (progressive), PNG with the `image` encoder followed by oxipng, and
//! WebP with libwebp when the `webp` feature is enabled.

use crate::constants::{LIBDEFLATER_MAX_LEVEL, OXIPNG_PRESET};
use crate::error::{ConvertError, Result};
use crate::formats::{SourceFormat, TargetFormat};
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage, Rgba};
use mozjpeg::{ColorSpace, Compress};
use oxipng::{Deflaters, Options as OxipngOptions};

/// A decoded image together with what was learned while decoding it.
///
/// The pixel buffer is owned; dropping the value releases it.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    image: DynamicImage,
    format: SourceFormat,
    transparent_index: Option<u8>,
}

impl DecodedImage {
    pub fn new(image: DynamicImage, format: SourceFormat) -> Self {
        Self {
            image,
            format,
            transparent_index: None,
        }
    }

    pub fn with_transparent_index(mut self, index: Option<u8>) -> Self {
        self.transparent_index = index;
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_at(&self, x: u32, y: u32) -> Rgba<u8> {
        self.image.get_pixel(x, y)
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Palette index declared transparent by a GIF source.
    pub fn transparent_index(&self) -> Option<u8> {
        self.transparent_index
    }

    pub fn has_alpha_channel(&self) -> bool {
        self.image.color().has_alpha()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Already clamped by the caller; ignored by lossless encoders.
    pub quality: u8,
}

pub trait Codec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage>;

    fn encode(
        &self,
        image: &DynamicImage,
        format: TargetFormat,
        options: &EncodeOptions,
    ) -> Result<Vec<u8>>;

    /// Whether this build can write `format`.
    fn supports(&self, format: TargetFormat) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCodec;

impl ImageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for ImageCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage> {
        let format = SourceFormat::detect(bytes)?;
        let image = image::load_from_memory_with_format(bytes, format.to_image_format())
            .map_err(|e| ConvertError::Decode(e.to_string()))?;

        let transparent_index = match format {
            SourceFormat::Gif => gif_transparent_index(bytes),
            _ => None,
        };

        Ok(DecodedImage::new(image, format).with_transparent_index(transparent_index))
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: TargetFormat,
        options: &EncodeOptions,
    ) -> Result<Vec<u8>> {
        match format {
            TargetFormat::Jpeg => encode_jpeg(image, options.quality),
            TargetFormat::Png => encode_png(image),
            TargetFormat::WebP => encode_webp(image, options.quality),
        }
    }

    fn supports(&self, format: TargetFormat) -> bool {
        match format {
            TargetFormat::Jpeg | TargetFormat::Png => true,
            TargetFormat::WebP => cfg!(feature = "webp"),
        }
    }
}

/// Reads only the first frame descriptor; pixel data is not decoded.
fn gif_transparent_index(bytes: &[u8]) -> Option<u8> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options.read_info(bytes).ok()?;
    decoder
        .next_frame_info()
        .ok()
        .flatten()
        .and_then(|frame| frame.transparent)
}

/// Composite any alpha onto white. Opaque images are just converted.
pub fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        flattened.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    flattened
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = flatten_onto_white(image);
    let (width, height) = rgb.dimensions();

    let mut comp = Compress::new(ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(f32::from(quality));
    comp.set_progressive_mode();
    comp.set_optimize_coding(true);

    let mut writer = comp
        .start_compress(Vec::new())
        .map_err(|e| ConvertError::Encode(format!("jpeg: {}", e)))?;
    writer
        .write_scanlines(rgb.as_raw())
        .map_err(|e| ConvertError::Encode(format!("jpeg: {}", e)))?;
    writer
        .finish()
        .map_err(|e| ConvertError::Encode(format!("jpeg: {}", e)))
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, PngFilterType::Adaptive);
    image
        .write_with_encoder(encoder)
        .map_err(|e| ConvertError::Encode(format!("png: {}", e)))?;

    let mut options = OxipngOptions::from_preset(OXIPNG_PRESET);
    options.deflate = Deflaters::Libdeflater {
        compression: LIBDEFLATER_MAX_LEVEL,
    };
    oxipng::optimize_from_memory(&buffer, &options)
        .map_err(|e| ConvertError::Encode(format!("png optimization: {}", e)))
}

#[cfg(feature = "webp")]
fn encode_webp(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let quality = f32::from(quality);
    let encoded = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
            .encode_simple(false, quality)
            .map(|memory| memory.to_vec())
    } else {
        let rgb = image.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height())
            .encode_simple(false, quality)
            .map(|memory| memory.to_vec())
    };
    encoded.map_err(|e| ConvertError::Encode(format!("webp: {:?}", e)))
}

#[cfg(not(feature = "webp"))]
fn encode_webp(_image: &DynamicImage, _quality: u8) -> Result<Vec<u8>> {
    Err(ConvertError::UnsupportedFormat(
        "webp encoding is not available in this build".to_string(),
    ))
}
