//! Byte storage used for uploads, outputs and the session file.
//!
//! The converter never touches `std::fs` directly; anything that can read,
//! write, delete and size a path-addressed blob can stand in for the disk.

use crate::error::{ConvertError, Result};
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use sysinfo::Disks;
use tempfile::NamedTempFile;

pub trait Storage: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replace the contents at `path`, creating parents as needed.
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    fn delete(&self, path: &Path) -> Result<()>;

    fn size(&self, path: &Path) -> Result<u64>;

    /// Free bytes on the volume holding `path`, when the backend can tell.
    fn available_space(&self, _path: &Path) -> Option<u64> {
        None
    }
}

/// Local filesystem storage. Writes go through a temp file in the target
/// directory and are renamed into place, so readers never see partial output.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> Self {
        Self
    }
}

fn not_found_as(path: &Path) -> impl FnOnce(std::io::Error) -> ConvertError + '_ {
    move |e| {
        if e.kind() == ErrorKind::NotFound {
            ConvertError::FileNotFound(path.to_path_buf())
        } else {
            ConvertError::Io(e)
        }
    }
}

impl Storage for FsStorage {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(not_found_as(path))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let mut temp = NamedTempFile::new_in(&parent)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| ConvertError::Io(e.error))?;
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(not_found_as(path))
    }

    fn size(&self, path: &Path) -> Result<u64> {
        Ok(fs::metadata(path).map_err(not_found_as(path))?.len())
    }

    fn available_space(&self, path: &Path) -> Option<u64> {
        let target = nearest_existing_ancestor(path)?.canonicalize().ok()?;
        let disks = Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .filter(|disk| target.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space())
    }
}

fn nearest_existing_ancestor(path: &Path) -> Option<&Path> {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.exists())
        .or_else(|| Some(Path::new(".")))
}

/// In-memory storage for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    available: Option<u64>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a fixed amount of free space to resource checks.
    pub fn with_available_space(mut self, bytes: u64) -> Self {
        self.available = Some(bytes);
        self
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn files(&self) -> MutexGuard<'_, HashMap<PathBuf, Vec<u8>>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn exists(&self, path: &Path) -> bool {
        self.files().contains_key(path)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.files()
            .get(path)
            .cloned()
            .ok_or_else(|| ConvertError::FileNotFound(path.to_path_buf()))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.files().insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        self.files()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| ConvertError::FileNotFound(path.to_path_buf()))
    }

    fn size(&self, path: &Path) -> Result<u64> {
        self.files()
            .get(path)
            .map(|bytes| bytes.len() as u64)
            .ok_or_else(|| ConvertError::FileNotFound(path.to_path_buf()))
    }

    fn available_space(&self, _path: &Path) -> Option<u64> {
        self.available
    }
}
