#![allow(dead_code)]

use chrono::Utc;
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use img_convert::{
    Codec, EncodeOptions, ImageCodec, SourceFormat, Storage, TargetFormat, UploadedImageMeta,
};
use std::path::{Path, PathBuf};

/// Opaque gradient, so encoders have something to compress.
pub fn gradient_rgb(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

/// RGBA image whose top half is fully transparent.
pub fn half_transparent(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        if y < height / 2 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([(x % 256) as u8, 120, 200, 255])
        }
    }))
}

pub fn encode(image: &DynamicImage, format: TargetFormat) -> Vec<u8> {
    ImageCodec::new()
        .encode(image, format, &EncodeOptions { quality: 90 })
        .unwrap()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient_rgb(width, height), TargetFormat::Png)
}

pub fn transparent_png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&half_transparent(width, height), TargetFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient_rgb(width, height), TargetFormat::Jpeg)
}

/// Store `bytes` under `uploads_dir` and describe it the way an upload would.
pub fn stage_upload(
    storage: &dyn Storage,
    uploads_dir: &Path,
    id: &str,
    name: &str,
    bytes: &[u8],
    format: SourceFormat,
    (width, height): (u32, u32),
) -> UploadedImageMeta {
    let path: PathBuf = uploads_dir.join(format!("{}.{}", id, format));
    storage.write(&path, bytes).unwrap();
    UploadedImageMeta {
        id: id.to_string(),
        original_name: name.to_string(),
        size: bytes.len() as u64,
        width,
        height,
        mime_type: format.mime_type().to_string(),
        format,
        uploaded_at: Utc::now(),
        path,
    }
}

/// Write real image files into `dir` for CLI tests.
pub fn write_sample_images(dir: &Path) -> Vec<PathBuf> {
    let opaque = dir.join("photo.jpg");
    std::fs::write(&opaque, jpeg_bytes(64, 48)).unwrap();
    let logo = dir.join("logo.png");
    std::fs::write(&logo, transparent_png_bytes(32, 32)).unwrap();
    vec![opaque, logo]
}
