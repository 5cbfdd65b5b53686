use crate::advisor::{AnalysisReport, FileTraits, FormatAdvisor};
use crate::batch::BatchReport;
use crate::codec::Codec;
use crate::error::Result;
use crate::estimator::{estimate_savings, SavingsEstimate};
use crate::formats::{SourceFormat, TargetFormat};
use crate::info;
use crate::session::{BatchStatistics, Session};
use crate::storage::FsStorage;
use crate::transparency::has_transparency;
use crate::utils::{format_file_size, format_signed_size};
use crate::validation::validate_file_exists;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatEstimate {
    pub format: TargetFormat,
    pub estimate: SavingsEstimate,
}

/// Single-file analysis, independent of any session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub format: SourceFormat,
    pub color_depth: u8,
    pub has_transparency: bool,
    pub recommended_format: TargetFormat,
    pub estimates: Vec<FormatEstimate>,
    /// Size of the decoded RGBA buffer in MiB.
    pub decoded_memory_mib: f64,
}

pub fn inspect(codec: &dyn Codec, path: &Path, quality: Option<u8>) -> Result<ImageInfo> {
    validate_file_exists(path)?;
    let bytes = fs::read(path)?;
    let size = bytes.len() as u64;

    let decoded = codec.decode(&bytes)?;
    let format = decoded.format();
    let (width, height) = (decoded.width(), decoded.height());
    let transparent = has_transparency(&decoded, format);
    drop(decoded);

    let storage = FsStorage::new();
    let advisor = FormatAdvisor::new(codec, &storage).with_quality(quality);
    let recommended_format = advisor.recommend(&FileTraits {
        has_transparency: transparent,
        pixel_count: u64::from(width) * u64::from(height),
    });

    let estimates = TargetFormat::all_formats()
        .into_iter()
        .filter(|target| codec.supports(*target))
        .map(|target| FormatEstimate {
            format: target,
            estimate: estimate_savings(size, format, target, transparent, quality),
        })
        .collect();

    let decoded_bytes = u64::from(width) * u64::from(height) * 4;
    Ok(ImageInfo {
        path: path.to_path_buf(),
        size,
        width,
        height,
        format,
        color_depth: format.color_depth(),
        has_transparency: transparent,
        recommended_format,
        estimates,
        decoded_memory_mib: decoded_bytes as f64 / (1024.0 * 1024.0),
    })
}

pub fn print_image_info(image: &ImageInfo) {
    info!("📊 Analyzing image: {}", image.path.display());
    info!("📋 Basic Information:");
    info!("  📏 Dimensions: {}x{} pixels", image.width, image.height);
    info!(
        "  📦 File size: {} ({} bytes)",
        format_file_size(image.size),
        image.size
    );
    info!("  🎭 Format: {} ({}-bit)", image.format, image.color_depth);
    info!(
        "  🔳 Transparency: {}",
        if image.has_transparency { "yes" } else { "no" }
    );
    info!("  💾 Decoded size: {:.2} MiB", image.decoded_memory_mib);

    info!("\n💡 Recommended format: {}", image.recommended_format);
    for entry in &image.estimates {
        info!(
            "  {:<5} {:>10}  ({:+.1}%)",
            entry.format.to_string(),
            entry.estimate.formatted_size,
            entry.estimate.percentage
        );
    }
}

pub fn print_savings_estimate(
    size: u64,
    from: SourceFormat,
    to: TargetFormat,
    estimate: &SavingsEstimate,
) {
    info!(
        "📐 {} {} -> {}: estimated savings {} ({:.1}%)",
        format_file_size(size),
        from,
        to,
        estimate.formatted_size,
        estimate.percentage
    );
}

pub fn print_analysis_report(report: &AnalysisReport) {
    info!("📊 Analyzed {} file(s), {}", report.per_file.len(), format_file_size(report.total_size));
    for file in &report.per_file {
        info!(
            "  {} [{}] {}x{} {} {}-> {}",
            file.name,
            file.id,
            file.width,
            file.height,
            file.current_format,
            if file.has_transparency { "(alpha) " } else { "" },
            file.recommended_format
        );
    }
    if !report.format_distribution.is_empty() {
        let distribution: Vec<String> = report
            .format_distribution
            .iter()
            .map(|entry| format!("{}: {}", entry.format, entry.count))
            .collect();
        info!("🧮 Recommendations: {}", distribution.join(", "));
    }
    info!("🎯 Recommended format: {}", report.recommended_format);
    info!(
        "💰 Estimated savings: {} ({:.1}%)",
        report.estimated_savings.formatted_size, report.estimated_savings.percentage
    );
    for failure in &report.errors {
        info!("  ❌ {}: {}", failure.name, failure.error);
    }
}

pub fn print_statistics(stats: &BatchStatistics) {
    info!("\n📊 Conversion Summary:");
    info!("  📁 Files converted: {}", stats.file_count);
    info!("  📦 Original size: {}", format_file_size(stats.total_original_size));
    info!("  📦 Converted size: {}", format_file_size(stats.total_processed_size));
    info!(
        "  🎯 Total savings: {} ({:.1}%)",
        format_signed_size(stats.total_savings),
        stats.total_savings_percent
    );
}

pub fn print_batch_report(report: &BatchReport) {
    for result in &report.results {
        let marker = if result.grew() { "⚠️ " } else { "✅" };
        info!(
            "{} {} -> {} ({} -> {}, {:.1}%)",
            marker,
            result.original_name,
            result.output_name,
            format_file_size(result.original_size),
            format_file_size(result.processed_size),
            result.savings_percent
        );
    }
    for failure in &report.errors {
        info!("❌ {}: {}", failure.name, failure.error);
    }
    if !report.unprocessed.is_empty() {
        info!("⏳ Not started: {}", report.unprocessed.join(", "));
    }
    info!(
        "Processed {}, failed {}",
        report.processed_count, report.error_count
    );
    print_statistics(&report.statistics);
}

pub fn print_status(session: &Session, stats: &BatchStatistics) {
    info!("⏳ Pending: {}", session.pending.len());
    for meta in &session.pending {
        info!(
            "  [{}] {} {}x{} {}",
            meta.id,
            meta.original_name,
            meta.width,
            meta.height,
            format_file_size(meta.size)
        );
    }
    info!("✅ Converted: {}", session.converted.len());
    for result in &session.converted {
        info!(
            "  [{}] {} -> {}",
            result.id,
            result.original_name,
            result.output_path.display()
        );
    }
    print_statistics(stats);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ImageCodec;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn test_inspect_transparent_png() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logo.png");
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        img.save(&path).unwrap();

        let codec = ImageCodec::new();
        let info = inspect(&codec, &path, None).unwrap();
        assert_eq!(info.format, SourceFormat::Png);
        assert!(info.has_transparency);
        assert_eq!((info.width, info.height), (20, 20));
        assert_ne!(info.recommended_format, TargetFormat::Jpeg);
        assert_eq!(
            info.estimates.len(),
            TargetFormat::all_formats()
                .into_iter()
                .filter(|f| codec.supports(*f))
                .count()
        );
    }

    #[test]
    fn test_inspect_missing_file() {
        let codec = ImageCodec::new();
        assert!(inspect(&codec, Path::new("/no/such/file.png"), None).is_err());
    }
}
