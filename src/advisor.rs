//! Target-format recommendation and batch savings estimate.
//!
//! Each file is matched against an ordered list of [`RecommendationRule`]s;
//! the first rule that yields a format wins. The batch recommendation is the
//! most frequent per-file recommendation, ties going to whichever format was
//! tallied first.

use crate::codec::Codec;
use crate::constants::LARGE_IMAGE_PIXELS;
use crate::error::{FileError, Result};
use crate::estimator::{estimate_size, SavingsEstimate};
use crate::formats::{SourceFormat, TargetFormat};
use crate::session::UploadedImageMeta;
use crate::storage::Storage;
use crate::transparency::has_transparency;
use crate::verbose;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// What the rules look at for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTraits {
    pub has_transparency: bool,
    pub pixel_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationRule {
    /// Keep alpha: WebP when it can be written, else PNG.
    Transparency,
    /// Large opaque images: WebP when it can be written, else JPEG.
    Resolution { min_pixels: u64 },
    /// Fallback for everything else.
    Default(TargetFormat),
}

impl RecommendationRule {
    pub fn evaluate(&self, traits: &FileTraits, webp_supported: bool) -> Option<TargetFormat> {
        match *self {
            RecommendationRule::Transparency if traits.has_transparency => Some(if webp_supported {
                TargetFormat::WebP
            } else {
                TargetFormat::Png
            }),
            RecommendationRule::Resolution { min_pixels } if traits.pixel_count > min_pixels => {
                Some(if webp_supported {
                    TargetFormat::WebP
                } else {
                    TargetFormat::Jpeg
                })
            }
            RecommendationRule::Default(format) => Some(format),
            _ => None,
        }
    }
}

pub fn default_rules() -> Vec<RecommendationRule> {
    vec![
        RecommendationRule::Transparency,
        RecommendationRule::Resolution {
            min_pixels: LARGE_IMAGE_PIXELS,
        },
        RecommendationRule::Default(TargetFormat::Jpeg),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub current_format: SourceFormat,
    pub has_transparency: bool,
    pub color_depth: u8,
    pub recommended_format: TargetFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatCount {
    pub format: TargetFormat,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub recommended_format: TargetFormat,
    pub estimated_savings: SavingsEstimate,
    pub total_size: u64,
    pub format_distribution: Vec<FormatCount>,
    pub per_file: Vec<ImageAnalysis>,
    pub errors: Vec<FileError>,
}

impl AnalysisReport {
    /// Re-estimate for another target or quality without re-probing any file.
    pub fn savings_for(&self, target: TargetFormat, quality: Option<u8>) -> SavingsEstimate {
        aggregate_savings(&self.per_file, target, quality)
    }
}

/// Count recommendations, keeping first-seen order.
pub fn tally<I>(formats: I) -> Vec<FormatCount>
where
    I: IntoIterator<Item = TargetFormat>,
{
    let mut counts: Vec<FormatCount> = Vec::new();
    for format in formats {
        match counts.iter_mut().find(|entry| entry.format == format) {
            Some(entry) => entry.count += 1,
            None => counts.push(FormatCount { format, count: 1 }),
        }
    }
    counts
}

/// Most frequent entry; on a tie the earliest in the tally wins.
pub fn most_frequent(counts: &[FormatCount]) -> Option<TargetFormat> {
    let mut best: Option<FormatCount> = None;
    for entry in counts {
        if best.map_or(true, |b| entry.count > b.count) {
            best = Some(*entry);
        }
    }
    best.map(|entry| entry.format)
}

pub fn aggregate_savings(
    files: &[ImageAnalysis],
    target: TargetFormat,
    quality: Option<u8>,
) -> SavingsEstimate {
    let total_original: u64 = files.iter().map(|f| f.size).sum();
    let estimated_new: f64 = files
        .iter()
        .map(|f| estimate_size(f.size, f.current_format, target, f.has_transparency, quality))
        .sum();
    SavingsEstimate::from_totals(total_original, estimated_new)
}

pub struct FormatAdvisor<'a> {
    codec: &'a dyn Codec,
    storage: &'a dyn Storage,
    rules: Vec<RecommendationRule>,
    quality: Option<u8>,
}

impl<'a> FormatAdvisor<'a> {
    pub fn new(codec: &'a dyn Codec, storage: &'a dyn Storage) -> Self {
        Self {
            codec,
            storage,
            rules: default_rules(),
            quality: None,
        }
    }

    pub fn with_rules(mut self, rules: Vec<RecommendationRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Apply the quality adjustment to the aggregate estimate.
    pub fn with_quality(mut self, quality: Option<u8>) -> Self {
        self.quality = quality;
        self
    }

    pub fn recommend(&self, traits: &FileTraits) -> TargetFormat {
        let webp_supported = self.codec.supports(TargetFormat::WebP);
        self.rules
            .iter()
            .find_map(|rule| {
                let format = rule.evaluate(traits, webp_supported)?;
                verbose!("rule {:?} selected {}", rule, format);
                Some(format)
            })
            .unwrap_or(TargetFormat::Jpeg)
    }

    fn fallback_format(&self) -> TargetFormat {
        self.rules
            .iter()
            .find_map(|rule| match rule {
                RecommendationRule::Default(format) => Some(*format),
                _ => None,
            })
            .unwrap_or(TargetFormat::Jpeg)
    }

    /// Probe one file. JPEG sources are not decoded at all.
    pub fn analyze_file(&self, meta: &UploadedImageMeta) -> Result<ImageAnalysis> {
        let has_alpha = if meta.format.can_carry_alpha() {
            let bytes = self.storage.read(&meta.path)?;
            let decoded = self.codec.decode(&bytes)?;
            has_transparency(&decoded, decoded.format())
        } else {
            false
        };

        let traits = FileTraits {
            has_transparency: has_alpha,
            pixel_count: meta.pixel_count(),
        };

        Ok(ImageAnalysis {
            id: meta.id.clone(),
            name: meta.original_name.clone(),
            size: meta.size,
            width: meta.width,
            height: meta.height,
            current_format: meta.format,
            has_transparency: has_alpha,
            color_depth: meta.format.color_depth(),
            recommended_format: self.recommend(&traits),
        })
    }

    /// Files that cannot be read or decoded are reported and left out of the totals.
    pub fn analyze(&self, batch: &[UploadedImageMeta]) -> AnalysisReport {
        let outcomes: Vec<(&UploadedImageMeta, Result<ImageAnalysis>)> = batch
            .par_iter()
            .map(|meta| (meta, self.analyze_file(meta)))
            .collect();

        let mut per_file = Vec::with_capacity(outcomes.len());
        let mut errors = Vec::new();
        for (meta, outcome) in outcomes {
            match outcome {
                Ok(analysis) => per_file.push(analysis),
                Err(e) => errors.push(FileError::new(&meta.id, &meta.original_name, &e)),
            }
        }

        let format_distribution = tally(per_file.iter().map(|a| a.recommended_format));
        let recommended_format =
            most_frequent(&format_distribution).unwrap_or_else(|| self.fallback_format());
        let estimated_savings = aggregate_savings(&per_file, recommended_format, self.quality);

        AnalysisReport {
            recommended_format,
            estimated_savings,
            total_size: per_file.iter().map(|a| a.size).sum(),
            format_distribution,
            per_file,
            errors,
        }
    }
}
