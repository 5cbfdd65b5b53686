pub const DEFAULT_QUALITY: u8 = 85;
pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;
/// JPEG output is capped here; higher settings mostly grow the file.
pub const JPEG_MAX_QUALITY: u8 = 95;
pub const HIGH_QUALITY_WARNING_THRESHOLD: u8 = 95;

pub const MAX_WIDTH: u32 = 4096;
pub const MAX_HEIGHT: u32 = 4096;

pub const THUMBNAIL_SIZE: u32 = 300;
pub const THUMBNAIL_QUALITY: u8 = 85;
pub const THUMBNAIL_PREFIX: &str = "thumb_";

pub const MAX_FILES: usize = 50;
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Above this pixel count WebP is preferred for opaque images.
pub const LARGE_IMAGE_PIXELS: u64 = 2_000_000;
pub const TRANSPARENCY_SAMPLE_SIZE: u64 = 100;

pub const OXIPNG_PRESET: u8 = 4;
pub const LIBDEFLATER_MAX_LEVEL: u8 = 12;

pub const DEFAULT_BATCH_BUDGET_SECS: u64 = 300;
/// Headroom kept free when sizing the worker pool against available memory.
pub const MIN_AVAILABLE_MEMORY_MIB: u64 = 256;

pub const DEFAULT_WORKSPACE_DIR: &str = ".img-convert";
pub const UPLOADS_DIR: &str = "uploads";
pub const PROCESSED_DIR: &str = "processed";
pub const SESSION_FILE: &str = "session.json";
/// Advisory lock held while a command loads, changes and saves the session.
pub const LOCK_FILE: &str = "session.lock";

pub const FILE_ID_PREFIX: &str = "img_";

pub const MAX_SAFE_STEM_LEN: usize = 100;

pub const SUPPORTED_SOURCE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

pub const PROGRESS_BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
