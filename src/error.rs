use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file id: {0}")]
    UnknownFile(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Insufficient storage space: {required} bytes required, {available} bytes available")]
    InsufficientStorage { required: u64, available: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Session file error: {0}")]
    SessionFormat(#[from] serde_json::Error),

    #[error("Walkdir error: {0}")]
    WalkdirError(#[from] walkdir::Error),

    #[error("No image files found in input path: {0}")]
    NoImageFilesFound(String),

    #[error("File too large: {0} bytes. Maximum allowed: {1} bytes")]
    FileTooLarge(u64, u64),

    #[error("Batch file count limit exceeded: {0} files, maximum allowed {1}")]
    BatchFileLimitExceeded(usize, usize),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Coarse classification used by callers that report errors to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Decode,
    Encode,
    Resource,
    Io,
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::Validation(_)
            | ConvertError::UnknownFile(_)
            | ConvertError::UnsupportedFormat(_)
            | ConvertError::NoImageFilesFound(_)
            | ConvertError::FileTooLarge(_, _)
            | ConvertError::BatchFileLimitExceeded(_, _) => ErrorKind::Validation,
            ConvertError::Decode(_) => ErrorKind::Decode,
            ConvertError::Encode(_) => ErrorKind::Encode,
            ConvertError::InsufficientStorage { .. } | ConvertError::ThreadPool(_) => {
                ErrorKind::Resource
            }
            ConvertError::Io(_)
            | ConvertError::FileNotFound(_)
            | ConvertError::SessionFormat(_)
            | ConvertError::WalkdirError(_) => ErrorKind::Io,
        }
    }

    /// Fatal errors abort a batch before any file is touched.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::Resource)
    }
}

impl From<image::ImageError> for ConvertError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => ConvertError::Io(e),
            image::ImageError::Encoding(e) => ConvertError::Encode(e.to_string()),
            image::ImageError::Unsupported(e) => ConvertError::UnsupportedFormat(e.to_string()),
            other => ConvertError::Decode(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

/// A failure confined to one file of a batch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FileError {
    pub id: String,
    pub name: String,
    pub error: String,
}

impl FileError {
    pub fn new(id: impl Into<String>, name: impl Into<String>, error: &ConvertError) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            error: error.to_string(),
        }
    }
}
