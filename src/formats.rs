/// Image format handling
///
/// Source formats are what uploads may arrive as; target formats are what the
/// converter can produce. Keeping them apart lets the type system reject a GIF
/// target instead of a string comparison.
use crate::error::{ConvertError, Result};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Formats accepted as conversion input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl SourceFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(SourceFormat::Jpeg),
            "png" => Some(SourceFormat::Png),
            "gif" => Some(SourceFormat::Gif),
            "webp" => Some(SourceFormat::WebP),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(SourceFormat::Jpeg),
            ImageFormat::Png => Some(SourceFormat::Png),
            ImageFormat::Gif => Some(SourceFormat::Gif),
            ImageFormat::WebP => Some(SourceFormat::WebP),
            _ => None,
        }
    }

    pub fn to_image_format(&self) -> ImageFormat {
        match self {
            SourceFormat::Jpeg => ImageFormat::Jpeg,
            SourceFormat::Png => ImageFormat::Png,
            SourceFormat::Gif => ImageFormat::Gif,
            SourceFormat::WebP => ImageFormat::WebP,
        }
    }

    /// Sniff the format from the leading bytes of an encoded image.
    pub fn detect(bytes: &[u8]) -> Result<Self> {
        let format = image::guess_format(bytes)
            .map_err(|e| ConvertError::Decode(format!("unrecognized image data: {}", e)))?;
        Self::from_image_format(format)
            .ok_or_else(|| ConvertError::Decode(format!("unsupported source format {:?}", format)))
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            SourceFormat::Jpeg => "image/jpeg",
            SourceFormat::Png => "image/png",
            SourceFormat::Gif => "image/gif",
            SourceFormat::WebP => "image/webp",
        }
    }

    /// Nominal bits per pixel reported in analysis output.
    pub fn color_depth(&self) -> u8 {
        match self {
            SourceFormat::Jpeg => 24,
            SourceFormat::Png | SourceFormat::WebP => 32,
            SourceFormat::Gif => 8,
        }
    }

    pub fn can_carry_alpha(&self) -> bool {
        !matches!(self, SourceFormat::Jpeg)
    }

    /// The matching target format, if the converter can write this format back.
    pub fn as_target(&self) -> Option<TargetFormat> {
        match self {
            SourceFormat::Jpeg => Some(TargetFormat::Jpeg),
            SourceFormat::Png => Some(TargetFormat::Png),
            SourceFormat::WebP => Some(TargetFormat::WebP),
            SourceFormat::Gif => None,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::Jpeg => "jpeg",
            SourceFormat::Png => "png",
            SourceFormat::Gif => "gif",
            SourceFormat::WebP => "webp",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for SourceFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim_start_matches("image/");
        Self::from_extension(trimmed).ok_or_else(|| ConvertError::UnsupportedFormat(s.to_string()))
    }
}

/// Supported output image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// Lossy, progressive, no alpha
    Jpeg,
    /// Lossless with alpha
    Png,
    /// Lossy with alpha
    WebP,
}

impl TargetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpg",
            TargetFormat::Png => "png",
            TargetFormat::WebP => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "image/jpeg",
            TargetFormat::Png => "image/png",
            TargetFormat::WebP => "image/webp",
        }
    }

    /// Quality only affects the lossy encoders.
    pub fn is_lossy(&self) -> bool {
        matches!(self, TargetFormat::Jpeg | TargetFormat::WebP)
    }

    pub fn all_formats() -> Vec<TargetFormat> {
        vec![TargetFormat::Jpeg, TargetFormat::Png, TargetFormat::WebP]
    }

    pub fn format_names() -> Vec<&'static str> {
        vec!["jpeg", "png", "webp"]
    }

    pub fn matches_source(&self, source: SourceFormat) -> bool {
        source.as_target() == Some(*self)
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetFormat::Jpeg => "jpeg",
            TargetFormat::Png => "png",
            TargetFormat::WebP => "webp",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for TargetFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(TargetFormat::Jpeg),
            "png" => Ok(TargetFormat::Png),
            "webp" => Ok(TargetFormat::WebP),
            _ => Err(ConvertError::UnsupportedFormat(s.to_string())),
        }
    }
}
