//! Heuristic output-size prediction.
//!
//! Factors multiply the original byte size. They were tuned by observation and
//! are not derived from the encoders, so estimates are only ever advisory.

use crate::formats::{SourceFormat, TargetFormat};
use crate::utils::{calculate_savings_percent, format_signed_size};
use serde::{Deserialize, Serialize};

/// Base size factor for a format transition, before any quality adjustment.
pub fn transition_factor(current: SourceFormat, target: TargetFormat, has_transparency: bool) -> f64 {
    if target.matches_source(current) {
        return match target {
            TargetFormat::Jpeg => 0.30,
            TargetFormat::WebP => 0.70,
            TargetFormat::Png => 0.85,
        };
    }

    match target {
        TargetFormat::Jpeg => match current {
            // alpha is dropped during flattening, which costs a little more
            SourceFormat::Png if has_transparency => 0.25,
            SourceFormat::Png => 0.20,
            SourceFormat::WebP => 0.80,
            _ => 0.30,
        },
        TargetFormat::WebP => 0.25,
        TargetFormat::Png => 1.20,
    }
}

/// Multiplier for the requested quality. PNG is lossless and ignores quality.
pub fn quality_factor(target: TargetFormat, quality: u8) -> f64 {
    if !target.is_lossy() {
        return 1.0;
    }
    match quality {
        q if q > 95 => 1.30,
        90..=95 => 1.10,
        80..=89 => f64::from(quality) / 85.0,
        q => f64::from(q) / 100.0,
    }
}

/// Predicted compression factor for one file.
pub fn estimate(
    current: SourceFormat,
    target: TargetFormat,
    has_transparency: bool,
    quality: u8,
) -> f64 {
    transition_factor(current, target, has_transparency) * quality_factor(target, quality)
}

/// Predicted output size in bytes; `None` quality skips the quality adjustment.
pub fn estimate_size(
    original_size: u64,
    current: SourceFormat,
    target: TargetFormat,
    has_transparency: bool,
    quality: Option<u8>,
) -> f64 {
    let factor = match quality {
        Some(q) => estimate(current, target, has_transparency, q),
        None => transition_factor(current, target, has_transparency),
    };
    original_size as f64 * factor
}

/// Client-facing savings summary. `bytes_saved` is negative when the output is
/// expected to grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsEstimate {
    pub bytes_saved: i64,
    pub percentage: f64,
    pub formatted_size: String,
}

impl SavingsEstimate {
    pub fn from_totals(total_original: u64, estimated_new: f64) -> Self {
        let bytes_saved = (total_original as f64 - estimated_new).round() as i64;
        let percentage = if total_original == 0 {
            0.0
        } else {
            calculate_savings_percent(total_original, bytes_saved)
        };
        Self {
            bytes_saved,
            percentage: (percentage * 10.0).round() / 10.0,
            formatted_size: format_signed_size(bytes_saved),
        }
    }

    pub fn zero() -> Self {
        Self::from_totals(0, 0.0)
    }
}

/// Single-file estimate, used when the user flips format or quality.
pub fn estimate_savings(
    original_size: u64,
    current: SourceFormat,
    target: TargetFormat,
    has_transparency: bool,
    quality: Option<u8>,
) -> SavingsEstimate {
    let estimated = estimate_size(original_size, current, target, has_transparency, quality);
    SavingsEstimate::from_totals(original_size, estimated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_same_format_factors() {
        assert!(approx(transition_factor(SourceFormat::Jpeg, TargetFormat::Jpeg, false), 0.30));
        assert!(approx(transition_factor(SourceFormat::WebP, TargetFormat::WebP, true), 0.70));
        assert!(approx(transition_factor(SourceFormat::Png, TargetFormat::Png, true), 0.85));
    }

    #[test]
    fn test_conversion_factors() {
        assert!(approx(transition_factor(SourceFormat::Png, TargetFormat::Jpeg, false), 0.20));
        assert!(approx(transition_factor(SourceFormat::Png, TargetFormat::Jpeg, true), 0.25));
        assert!(approx(transition_factor(SourceFormat::WebP, TargetFormat::Jpeg, false), 0.80));
        assert!(approx(transition_factor(SourceFormat::Gif, TargetFormat::Jpeg, false), 0.30));
        assert!(approx(transition_factor(SourceFormat::Jpeg, TargetFormat::WebP, false), 0.25));
        assert!(approx(transition_factor(SourceFormat::Gif, TargetFormat::WebP, true), 0.25));
        assert!(approx(transition_factor(SourceFormat::Jpeg, TargetFormat::Png, false), 1.20));
        assert!(approx(transition_factor(SourceFormat::Gif, TargetFormat::Png, true), 1.20));
    }

    #[test]
    fn test_quality_bands() {
        assert!(approx(quality_factor(TargetFormat::Jpeg, 100), 1.30));
        assert!(approx(quality_factor(TargetFormat::Jpeg, 96), 1.30));
        assert!(approx(quality_factor(TargetFormat::Jpeg, 95), 1.10));
        assert!(approx(quality_factor(TargetFormat::WebP, 90), 1.10));
        assert!(approx(quality_factor(TargetFormat::WebP, 85), 1.0));
        assert!(approx(quality_factor(TargetFormat::Jpeg, 80), 80.0 / 85.0));
        assert!(approx(quality_factor(TargetFormat::Jpeg, 50), 0.5));
        assert!(approx(quality_factor(TargetFormat::Jpeg, 1), 0.01));
    }

    #[test]
    fn test_png_ignores_quality() {
        for q in [1, 50, 85, 100] {
            assert!(approx(quality_factor(TargetFormat::Png, q), 1.0));
        }
        assert!(approx(estimate(SourceFormat::Jpeg, TargetFormat::Png, false, 10), 1.20));
    }

    #[test]
    fn test_estimate_combines_factors() {
        let factor = estimate(SourceFormat::Png, TargetFormat::Jpeg, false, 50);
        assert!(approx(factor, 0.20 * 0.5));
    }

    #[test]
    fn test_savings_estimate_negative_when_growing() {
        let estimate = estimate_savings(1000, SourceFormat::Jpeg, TargetFormat::Png, false, None);
        assert_eq!(estimate.bytes_saved, -200);
        assert!(approx(estimate.percentage, -20.0));
        assert!(estimate.formatted_size.starts_with('-'));
    }

    #[test]
    fn test_savings_estimate_zero_original() {
        let estimate = SavingsEstimate::zero();
        assert_eq!(estimate.bytes_saved, 0);
        assert_eq!(estimate.percentage, 0.0);
        assert!(!estimate.percentage.is_nan());
    }

    #[test]
    fn test_savings_estimate_rounds_percentage() {
        let estimate = SavingsEstimate::from_totals(3, 2.0);
        assert!(approx(estimate.percentage, 33.3));
    }
}
