use crate::constants::{MAX_FILE_SIZE, SUPPORTED_SOURCE_EXTENSIONS};
use crate::error::{ConvertError, Result};
use crate::utils::is_image_file;
use std::fs;
use std::path::Path;

pub fn validate_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(ConvertError::FileNotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(ConvertError::Validation(format!(
            "{} is not a file",
            path.display()
        )));
    }
    Ok(())
}

/// Checks an upload candidate before anything is copied, returning its size.
pub fn validate_upload(path: &Path) -> Result<u64> {
    validate_file_exists(path)?;

    if !is_image_file(path) {
        return Err(ConvertError::UnsupportedFormat(format!(
            "{} (expected one of: {})",
            path.display(),
            SUPPORTED_SOURCE_EXTENSIONS.join(", ")
        )));
    }

    let size = fs::metadata(path)?.len();
    if size == 0 {
        return Err(ConvertError::Validation(format!(
            "{} is empty",
            path.display()
        )));
    }
    if size > MAX_FILE_SIZE {
        return Err(ConvertError::FileTooLarge(size, MAX_FILE_SIZE));
    }
    Ok(size)
}
