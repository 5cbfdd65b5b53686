/// Helpers shared by the estimator, the batch coordinator and the CLI output.
use crate::constants::{MAX_SAFE_STEM_LEN, PROGRESS_BAR_TEMPLATE, SUPPORTED_SOURCE_EXTENSIONS};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Check if a file path has an extension we accept as conversion input
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext_lower = ext.to_lowercase();
            SUPPORTED_SOURCE_EXTENSIONS.contains(&ext_lower.as_str())
        })
        .unwrap_or(false)
}

/// Format file size in human-readable format
///
/// # Returns
/// * Human-readable size string (e.g., "1.2 MB", "512 B")
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Like [`format_file_size`], keeping the sign of a savings value.
pub fn format_signed_size(bytes: i64) -> String {
    let formatted = format_file_size(bytes.unsigned_abs());
    if bytes < 0 {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

/// Savings as a percentage of the original size.
///
/// Positive means reduction, negative means the output grew. Returns 0 for an
/// empty original so callers never see NaN.
pub fn calculate_savings_percent(original_size: u64, savings: i64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    (savings as f64 / original_size as f64) * 100.0
}

/// Reduce a file stem to `[A-Za-z0-9_-]`, truncated to a safe length.
pub fn sanitize_stem(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let safe: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_SAFE_STEM_LEN)
        .collect();

    if safe.is_empty() {
        "image".to_string()
    } else {
        safe
    }
}

/// Progress bar for batch work; hidden in quiet mode.
pub fn create_progress_bar(len: u64) -> ProgressBar {
    if crate::logger::is_quiet() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_BAR_TEMPLATE) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
