use img_convert::converter::{clamp_quality, effective_quality, fit_within, thumbnail_crop};
use img_convert::estimator::{estimate, quality_factor};
use img_convert::utils::{calculate_savings_percent, sanitize_stem};
use img_convert::{SavingsEstimate, SourceFormat, TargetFormat};
use proptest::prelude::*;

fn lossy_target() -> impl Strategy<Value = TargetFormat> {
    prop_oneof![Just(TargetFormat::Jpeg), Just(TargetFormat::WebP)]
}

fn any_source() -> impl Strategy<Value = SourceFormat> {
    prop_oneof![
        Just(SourceFormat::Jpeg),
        Just(SourceFormat::Png),
        Just(SourceFormat::Gif),
        Just(SourceFormat::WebP),
    ]
}

proptest! {
    #[test]
    fn quality_factor_monotonic_in_upper_band(
        target in lossy_target(),
        low in 80u8..=95u8,
        delta in 0u8..=15u8
    ) {
        let high = (low + delta).min(95);
        prop_assert!(quality_factor(target, high) >= quality_factor(target, low));
    }

    #[test]
    fn estimate_monotonic_in_upper_band(
        source in any_source(),
        target in lossy_target(),
        transparent in any::<bool>(),
        low in 80u8..95u8
    ) {
        let a = estimate(source, target, transparent, low);
        let b = estimate(source, target, transparent, low + 1);
        prop_assert!(b >= a);
    }

    #[test]
    fn png_estimate_ignores_quality(source in any_source(), q1 in 1u8..=100u8, q2 in 1u8..=100u8) {
        prop_assert_eq!(
            estimate(source, TargetFormat::Png, false, q1),
            estimate(source, TargetFormat::Png, false, q2)
        );
    }

    #[test]
    fn clamped_quality_in_range(quality in -1000i64..1000i64) {
        let clamped = clamp_quality(quality);
        prop_assert!((1..=100).contains(&clamped));
        if (1..=100).contains(&quality) {
            prop_assert_eq!(i64::from(clamped), quality);
        }
    }

    #[test]
    fn jpeg_quality_never_exceeds_cap(quality in 1u8..=100u8) {
        prop_assert!(effective_quality(TargetFormat::Jpeg, quality) <= 95);
        prop_assert_eq!(effective_quality(TargetFormat::WebP, quality), quality);
    }

    #[test]
    fn fit_within_respects_bounds(
        width in 1u32..20_000u32,
        height in 1u32..20_000u32,
        max_w in 16u32..5000u32,
        max_h in 16u32..5000u32
    ) {
        match fit_within(width, height, max_w, max_h) {
            None => prop_assert!(width <= max_w && height <= max_h),
            Some((w, h)) => {
                prop_assert!(w >= 1 && w <= max_w);
                prop_assert!(h >= 1 && h <= max_h);
                prop_assert!(w <= width && h <= height);
            }
        }
    }

    #[test]
    fn thumbnail_crop_is_centered_square(width in 1u32..10_000u32, height in 1u32..10_000u32) {
        let (x, y, side) = thumbnail_crop(width, height);
        prop_assert_eq!(side, width.min(height));
        prop_assert!(x + side <= width);
        prop_assert!(y + side <= height);
        prop_assert!(x == 0 || y == 0);
    }

    #[test]
    fn savings_percent_never_nan(original in 0u64..1_000_000u64, processed in 0u64..2_000_000u64) {
        let savings = original as i64 - processed as i64;
        let percent = calculate_savings_percent(original, savings);
        prop_assert!(percent.is_finite());
        if original == 0 {
            prop_assert_eq!(percent, 0.0);
        }
        let estimate = SavingsEstimate::from_totals(original, processed as f64);
        prop_assert!(estimate.percentage.is_finite());
    }

    #[test]
    fn sanitized_stem_is_safe(name in ".{0,300}") {
        let stem = sanitize_stem(&name);
        prop_assert!(!stem.is_empty());
        prop_assert!(stem.chars().count() <= 100);
        prop_assert!(stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }
}
