use crate::codec::{Codec, EncodeOptions};
use crate::constants::{
    JPEG_MAX_QUALITY, MAX_HEIGHT, MAX_QUALITY, MAX_WIDTH, MIN_QUALITY, THUMBNAIL_QUALITY,
    THUMBNAIL_SIZE,
};
use crate::error::{ConvertError, Result};
use crate::formats::{SourceFormat, TargetFormat};
use crate::storage::Storage;
use crate::verbose;
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConverterOptions {
    pub max_width: u32,
    pub max_height: u32,
    pub thumbnail_size: u32,
    pub thumbnail_quality: u8,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            max_width: MAX_WIDTH,
            max_height: MAX_HEIGHT,
            thumbnail_size: THUMBNAIL_SIZE,
            thumbnail_quality: THUMBNAIL_QUALITY,
        }
    }
}

/// Out-of-range quality is clamped rather than rejected.
pub fn clamp_quality(quality: impl Into<i64>) -> u8 {
    quality
        .into()
        .clamp(i64::from(MIN_QUALITY), i64::from(MAX_QUALITY)) as u8
}

/// Quality actually handed to the encoder for `format`.
pub fn effective_quality(format: TargetFormat, quality: u8) -> u8 {
    match format {
        TargetFormat::Jpeg => quality.min(JPEG_MAX_QUALITY),
        _ => quality,
    }
}

/// New dimensions that fit inside `max_width` x `max_height` with the aspect
/// ratio kept, or `None` if the image already fits.
///
/// The axis that overflows more is shrunk first, then the other axis is
/// checked again since it can still be over its own bound.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> Option<(u32, u32)> {
    if width <= max_width && height <= max_height {
        return None;
    }

    let ratio = f64::from(width) / f64::from(height.max(1));
    let (max_w, max_h) = (f64::from(max_width), f64::from(max_height));
    let (mut w, mut h) = (f64::from(width), f64::from(height));

    let clamp_width = |w: &mut f64, h: &mut f64| {
        if *w > max_w {
            *w = max_w;
            *h = *w / ratio;
        }
    };
    let clamp_height = |w: &mut f64, h: &mut f64| {
        if *h > max_h {
            *h = max_h;
            *w = *h * ratio;
        }
    };

    if w / max_w >= h / max_h {
        clamp_width(&mut w, &mut h);
        clamp_height(&mut w, &mut h);
    } else {
        clamp_height(&mut w, &mut h);
        clamp_width(&mut w, &mut h);
    }

    let new_width = (w.round() as u32).clamp(1, max_width.max(1));
    let new_height = (h.round() as u32).clamp(1, max_height.max(1));
    Some((new_width, new_height))
}

/// Largest centered square: `(x, y, side)`.
pub fn thumbnail_crop(width: u32, height: u32) -> (u32, u32, u32) {
    let offset = |longer: u32, shorter: u32| (f64::from(longer - shorter) / 2.0).round() as u32;
    if width > height {
        (offset(width, height), 0, height)
    } else {
        (0, offset(height, width), width)
    }
}

pub fn make_thumbnail(image: &DynamicImage, size: u32) -> DynamicImage {
    let (x, y, side) = thumbnail_crop(image.width(), image.height());
    image
        .crop_imm(x, y, side, side)
        .resize_exact(size, size, FilterType::Lanczos3)
}

/// Encoded output of one conversion.
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    pub output: Vec<u8>,
    pub thumbnail: Vec<u8>,
    pub source_format: SourceFormat,
    pub width: u32,
    pub height: u32,
    pub resized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFile {
    pub output_path: PathBuf,
    pub thumbnail_path: PathBuf,
    pub processed_size: u64,
    pub width: u32,
    pub height: u32,
}

pub struct ImageConverter<'a> {
    codec: &'a dyn Codec,
    options: ConverterOptions,
}

impl<'a> ImageConverter<'a> {
    pub fn new(codec: &'a dyn Codec) -> Self {
        Self::with_options(codec, ConverterOptions::default())
    }

    pub fn with_options(codec: &'a dyn Codec, options: ConverterOptions) -> Self {
        Self { codec, options }
    }

    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec
    }

    pub fn ensure_supported(&self, target: TargetFormat) -> Result<()> {
        if self.codec.supports(target) {
            Ok(())
        } else {
            Err(ConvertError::UnsupportedFormat(format!(
                "{} encoding is not available",
                target
            )))
        }
    }

    fn resize_if_oversized(&self, image: &mut DynamicImage) -> bool {
        let (width, height) = (image.width(), image.height());
        match fit_within(width, height, self.options.max_width, self.options.max_height) {
            Some((new_width, new_height)) => {
                verbose!(
                    "resizing {}x{} -> {}x{}",
                    width,
                    height,
                    new_width,
                    new_height
                );
                *image = image.resize_exact(new_width, new_height, FilterType::Lanczos3);
                true
            }
            None => false,
        }
    }

    /// Decode, shrink if oversized, re-encode and build the thumbnail.
    ///
    /// The decoded buffer lives only inside this call and is released on
    /// every return path.
    pub fn convert_bytes(
        &self,
        source: &[u8],
        target: TargetFormat,
        quality: u8,
    ) -> Result<ConvertedImage> {
        self.ensure_supported(target)?;
        let quality = clamp_quality(quality);

        let decoded = self.codec.decode(source)?;
        let source_format = decoded.format();
        let mut image = decoded.into_image();
        let resized = self.resize_if_oversized(&mut image);

        let output = self.codec.encode(
            &image,
            target,
            &EncodeOptions {
                quality: effective_quality(target, quality),
            },
        )?;

        let thumbnail_image = make_thumbnail(&image, self.options.thumbnail_size);
        let thumbnail = self.codec.encode(
            &thumbnail_image,
            TargetFormat::Jpeg,
            &EncodeOptions {
                quality: self.options.thumbnail_quality,
            },
        )?;

        Ok(ConvertedImage {
            output,
            thumbnail,
            source_format,
            width: image.width(),
            height: image.height(),
            resized,
        })
    }

    /// Convert `source` and write the output and thumbnail.
    ///
    /// If the thumbnail cannot be written the main output is removed again, so
    /// a failed conversion never leaves half its files behind.
    pub fn convert(
        &self,
        storage: &dyn Storage,
        source: &Path,
        output_path: &Path,
        thumbnail_path: &Path,
        target: TargetFormat,
        quality: u8,
    ) -> Result<ConvertedFile> {
        let bytes = storage.read(source)?;
        let converted = self.convert_bytes(&bytes, target, quality)?;
        drop(bytes);

        storage
            .write(output_path, &converted.output)
            .map_err(|e| write_error(output_path, e))?;
        if let Err(e) = storage.write(thumbnail_path, &converted.thumbnail) {
            let _ = storage.delete(output_path);
            return Err(write_error(thumbnail_path, e));
        }

        Ok(ConvertedFile {
            output_path: output_path.to_path_buf(),
            thumbnail_path: thumbnail_path.to_path_buf(),
            processed_size: converted.output.len() as u64,
            width: converted.width,
            height: converted.height,
        })
    }
}

fn write_error(path: &Path, err: ConvertError) -> ConvertError {
    ConvertError::Encode(format!("failed to write {}: {}", path.display(), err))
}
