//! Registering files into the session workspace.
//!
//! Inputs are expanded into image paths, validated, copied under a generated
//! id into the uploads directory and recorded as pending.

use crate::constants::{FILE_ID_PREFIX, MAX_FILES};
use crate::error::{ConvertError, FileError, Result};
use crate::formats::SourceFormat;
use crate::session::{SessionStore, UploadedImageMeta};
use crate::storage::Storage;
use crate::utils::{is_image_file, sanitize_stem};
use crate::validation::validate_upload;
use crate::{error, verbose};
use chrono::Utc;
use glob::glob;
use image::ImageReader;
use serde::Serialize;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use walkdir::WalkDir;

static UPLOAD_SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Expand one input (file, directory or glob pattern) into image paths.
///
/// Hidden entries are skipped when walking directories. Every returned path
/// is canonical.
pub fn collect_image_files(input: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let input_path = Path::new(input);

    let mut image_files = Vec::new();
    if input_path.is_file() {
        image_files.push(input_path.canonicalize()?);
    } else if input_path.is_dir() {
        let walker = if recursive {
            WalkDir::new(input_path)
        } else {
            WalkDir::new(input_path).max_depth(1)
        };
        for entry in walker
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && is_image_file(path) {
                if let Ok(canonical) = path.canonicalize() {
                    image_files.push(canonical);
                }
            }
        }
        image_files.sort();
    } else {
        let pattern =
            glob(input).map_err(|_| ConvertError::NoImageFilesFound(input.to_string()))?;
        for entry in pattern.flatten() {
            if entry.is_file() && is_image_file(&entry) {
                if let Ok(canonical) = entry.canonicalize() {
                    image_files.push(canonical);
                }
            }
        }
    }

    Ok(image_files)
}

/// Collect every input, dropping duplicates while keeping first-seen order.
pub fn collect_inputs(inputs: &[String], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for input in inputs {
        for path in collect_image_files(input, recursive)? {
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }
    if files.is_empty() {
        return Err(ConvertError::NoImageFilesFound(inputs.join(", ")));
    }
    Ok(files)
}

fn generate_id() -> String {
    let micros = Utc::now().timestamp_micros();
    let seq = UPLOAD_SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0xffff;
    format!("{}{:x}{:04x}", FILE_ID_PREFIX, micros, seq)
}

fn display_name(path: &Path, format: SourceFormat) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| format.to_string());
    format!("{}.{}", sanitize_stem(&name), extension)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadSummary {
    pub registered: Vec<UploadedImageMeta>,
    pub errors: Vec<FileError>,
}

pub struct Uploader<'a> {
    storage: &'a dyn Storage,
    session: &'a SessionStore,
    uploads_dir: PathBuf,
}

impl<'a> Uploader<'a> {
    pub fn new(
        storage: &'a dyn Storage,
        session: &'a SessionStore,
        uploads_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            storage,
            session,
            uploads_dir: uploads_dir.into(),
        }
    }

    /// Validate `source`, copy it into the workspace and add it as pending.
    pub fn register(&self, source: &Path) -> Result<UploadedImageMeta> {
        let size = validate_upload(source)?;
        let pending = self.session.pending_count();
        if pending >= MAX_FILES {
            return Err(ConvertError::BatchFileLimitExceeded(pending + 1, MAX_FILES));
        }

        let bytes = fs::read(source)?;
        let format = SourceFormat::detect(&bytes).map_err(|e| {
            ConvertError::Validation(format!("{} is not a valid image: {}", source.display(), e))
        })?;
        let (width, height) =
            ImageReader::with_format(Cursor::new(bytes.as_slice()), format.to_image_format())
                .into_dimensions()
                .map_err(|e| {
                    ConvertError::Validation(format!(
                        "{} is not a valid image: {}",
                        source.display(),
                        e
                    ))
                })?;

        let id = generate_id();
        let path = self.uploads_dir.join(format!("{}.{}", id, format));
        self.storage.write(&path, &bytes)?;

        let meta = UploadedImageMeta {
            id,
            original_name: display_name(source, format),
            size,
            width,
            height,
            mime_type: format.mime_type().to_string(),
            format,
            uploaded_at: Utc::now(),
            path: path.clone(),
        };
        if let Err(e) = self.session.add_pending(meta.clone()) {
            let _ = self.storage.delete(&path);
            return Err(e);
        }

        verbose!(
            "registered {} as {} ({}x{})",
            source.display(),
            meta.id,
            width,
            height
        );
        Ok(meta)
    }

    /// Register each file, collecting failures instead of stopping at the first.
    pub fn register_all(&self, files: &[PathBuf]) -> UploadSummary {
        let mut summary = UploadSummary::default();
        for file in files {
            match self.register(file) {
                Ok(meta) => summary.registered.push(meta),
                Err(e) => {
                    error!("Failed to upload {}: {}", file.display(), e);
                    let name = file
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    summary.errors.push(FileError::new("", name, &e));
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FsStorage;
    use image::{Rgb, RgbImage};
    use std::fs::File;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([10, 20, 30]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_collect_image_files_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.png");
        File::create(&file).unwrap();

        let files = collect_image_files(file.to_str().unwrap(), false).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_collect_image_files_directory_depth() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("a.jpg")).unwrap();
        File::create(temp_dir.path().join("notes.txt")).unwrap();
        File::create(temp_dir.path().join(".hidden.png")).unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();
        File::create(temp_dir.path().join("sub/b.webp")).unwrap();

        let dir = temp_dir.path().to_str().unwrap();
        assert_eq!(collect_image_files(dir, false).unwrap().len(), 1);
        assert_eq!(collect_image_files(dir, true).unwrap().len(), 2);
    }

    #[test]
    fn test_collect_image_files_glob_pattern() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("a.png")).unwrap();
        File::create(temp_dir.path().join("b.png")).unwrap();
        File::create(temp_dir.path().join("c.gif")).unwrap();

        let pattern = format!("{}/*.png", temp_dir.path().display());
        assert_eq!(collect_image_files(&pattern, false).unwrap().len(), 2);
    }

    #[test]
    fn test_collect_inputs_dedupes_and_rejects_empty() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.png");
        File::create(&file).unwrap();
        let input = file.to_str().unwrap().to_string();

        let files = collect_inputs(&[input.clone(), input], false).unwrap();
        assert_eq!(files.len(), 1);

        let empty = temp_dir.path().join("empty");
        fs::create_dir(&empty).unwrap();
        assert!(matches!(
            collect_inputs(&[empty.to_str().unwrap().to_string()], false),
            Err(ConvertError::NoImageFilesFound(_))
        ));
    }

    #[test]
    fn test_register_copies_and_records() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("My Photo.png");
        write_png(&source, 12, 7);

        let storage = FsStorage::new();
        let session = SessionStore::default();
        let uploader = Uploader::new(&storage, &session, temp_dir.path().join("ws/uploads"));

        let meta = uploader.register(&source).unwrap();
        assert_eq!(meta.original_name, "My_Photo.png");
        assert_eq!((meta.width, meta.height), (12, 7));
        assert_eq!(meta.format, SourceFormat::Png);
        assert_eq!(meta.mime_type, "image/png");
        assert!(meta.path.exists());
        assert!(source.exists());
        assert_eq!(session.pending_count(), 1);
    }

    #[test]
    fn test_register_rejects_non_image_content() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("fake.jpg");
        fs::write(&source, b"definitely not a jpeg").unwrap();

        let storage = FsStorage::new();
        let session = SessionStore::default();
        let uploader = Uploader::new(&storage, &session, temp_dir.path().join("uploads"));

        let summary = uploader.register_all(&[source]);
        assert!(summary.registered.is_empty());
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(session.pending_count(), 0);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert!(a.starts_with("img_"));
    }
}
