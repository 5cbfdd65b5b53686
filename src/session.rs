//! Per-session file state: uploads waiting for conversion and their results.
//!
//! A file is either pending or converted. While a conversion runs its id is
//! also held in a transient `processing` set so that two concurrent callers
//! cannot convert it twice. All mutation goes through one mutex.
//!
//! Separate processes share a session only through its saved file. Saving
//! with [`SessionStore::sync`] merges with what is already on disk, and
//! [`Workspace::lock`] serializes whole load-change-save sequences.

use crate::constants::{LOCK_FILE, MAX_FILES, PROCESSED_DIR, SESSION_FILE, UPLOADS_DIR};
use crate::error::{ConvertError, Result};
use crate::formats::{SourceFormat, TargetFormat};
use crate::storage::Storage;
use crate::utils::calculate_savings_percent;
use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// An uploaded source file. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedImageMeta {
    pub id: String,
    pub original_name: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    pub format: SourceFormat,
    pub uploaded_at: DateTime<Utc>,
    pub path: PathBuf,
}

impl UploadedImageMeta {
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Id of the [`UploadedImageMeta`] this was converted from.
    pub id: String,
    pub original_name: String,
    pub output_name: String,
    pub output_path: PathBuf,
    pub thumbnail_path: PathBuf,
    pub format: TargetFormat,
    pub quality: u8,
    pub width: u32,
    pub height: u32,
    pub original_size: u64,
    pub processed_size: u64,
    /// Negative when the output is larger than the source.
    pub savings: i64,
    pub savings_percent: f64,
    pub converted_at: DateTime<Utc>,
}

impl ConversionResult {
    pub fn savings_between(original_size: u64, processed_size: u64) -> (i64, f64) {
        let savings = original_size as i64 - processed_size as i64;
        (savings, calculate_savings_percent(original_size, savings))
    }

    pub fn grew(&self) -> bool {
        self.savings < 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub file_count: usize,
    pub total_original_size: u64,
    pub total_processed_size: u64,
    pub total_savings: i64,
    pub total_savings_percent: f64,
}

impl BatchStatistics {
    /// Always computed from the complete result set.
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a ConversionResult>,
    {
        let mut stats = BatchStatistics::default();
        for result in results {
            stats.file_count += 1;
            stats.total_original_size += result.original_size;
            stats.total_processed_size += result.processed_size;
        }
        stats.total_savings = stats.total_original_size as i64 - stats.total_processed_size as i64;
        stats.total_savings_percent =
            calculate_savings_percent(stats.total_original_size, stats.total_savings);
        stats
    }
}

/// Serializable session contents, in upload order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub pending: Vec<UploadedImageMeta>,
    pub converted: Vec<ConversionResult>,
}

impl Session {
    pub fn contains(&self, id: &str) -> bool {
        self.pending.iter().any(|meta| meta.id == id)
            || self.converted.iter().any(|result| result.id == id)
    }

    /// Move the file behind `result` from pending to converted, replacing any
    /// earlier result for it.
    pub fn record(&mut self, result: ConversionResult) {
        self.pending.retain(|meta| meta.id != result.id);
        self.converted.retain(|existing| existing.id != result.id);
        self.converted.push(result);
    }

    /// Fold `other` into this session. A file converted on either side stays
    /// converted; files unknown here are appended in `other`'s order.
    pub fn merge(&mut self, other: Session) {
        for result in other.converted {
            if !self.converted.iter().any(|existing| existing.id == result.id) {
                self.record(result);
            }
        }
        for meta in other.pending {
            if !self.contains(&meta.id) {
                self.pending.push(meta);
            }
        }
    }
}

fn read_saved(storage: &dyn Storage, path: &Path) -> Result<Session> {
    if !storage.exists(path) {
        return Ok(Session::default());
    }
    let bytes = storage.read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Remove every file a session refers to: pending sources, outputs and
/// thumbnails. Missing files are skipped. Returns how many were deleted.
pub fn discard_files(session: &Session, storage: &dyn Storage) -> usize {
    let pending = session.pending.iter().map(|meta| meta.path.as_path());
    let converted = session
        .converted
        .iter()
        .flat_map(|result| [result.output_path.as_path(), result.thumbnail_path.as_path()]);
    pending
        .chain(converted)
        .filter(|path| storage.delete(path).is_ok())
        .count()
}

/// On-disk layout of a session: `uploads/`, `processed/` and `session.json`
/// under one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create the root if needed and pin it to an absolute path, so stored
    /// file paths stay valid from any working directory.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join(PROCESSED_DIR)
    }

    pub fn session_file(&self) -> PathBuf {
        self.root.join(SESSION_FILE)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Open the workspace lock. Take its write guard before loading the
    /// session in any command that changes it, and keep it until the session
    /// has been saved.
    pub fn lock(&self) -> Result<RwLock<File>> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_file())?;
        Ok(RwLock::new(file))
    }
}

#[derive(Debug, Default)]
struct SessionState {
    session: Session,
    processing: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    state: Mutex<SessionState>,
}

impl SessionStore {
    pub fn new(session: Session) -> Self {
        Self {
            state: Mutex::new(SessionState {
                session,
                processing: HashSet::new(),
            }),
        }
    }

    /// Load from `path`, or start empty when nothing has been saved yet.
    pub fn load(storage: &dyn Storage, path: &Path) -> Result<Self> {
        Ok(Self::new(read_saved(storage, path)?))
    }

    /// Overwrite the saved copy with this one.
    pub fn save(&self, storage: &dyn Storage, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.state().session)?;
        storage.write(path, &bytes)
    }

    /// Pull in changes saved through other handles since this one was loaded.
    pub fn refresh(&self, storage: &dyn Storage, path: &Path) -> Result<()> {
        let mut saved = read_saved(storage, path)?;
        let mut state = self.state();
        saved.merge(std::mem::take(&mut state.session));
        state.session = saved;
        Ok(())
    }

    /// Merge with the saved copy and write the result back, so conversions
    /// recorded through another handle are kept.
    pub fn sync(&self, storage: &dyn Storage, path: &Path) -> Result<()> {
        let mut state = self.state();
        let mut merged = read_saved(storage, path)?;
        merged.merge(state.session.clone());
        storage.write(path, &serde_json::to_vec_pretty(&merged)?)?;
        state.session = merged;
        Ok(())
    }

    pub fn snapshot(&self) -> Session {
        self.state().session.clone()
    }

    pub fn pending(&self) -> Vec<UploadedImageMeta> {
        self.state().session.pending.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.state().session.pending.len()
    }

    pub fn converted(&self) -> Vec<ConversionResult> {
        self.state().session.converted.clone()
    }

    pub fn get_pending(&self, id: &str) -> Option<UploadedImageMeta> {
        self.state()
            .session
            .pending
            .iter()
            .find(|meta| meta.id == id)
            .cloned()
    }

    pub fn add_pending(&self, meta: UploadedImageMeta) -> Result<()> {
        let mut state = self.state();
        let pending = &mut state.session.pending;
        if pending.len() >= MAX_FILES {
            return Err(ConvertError::BatchFileLimitExceeded(pending.len() + 1, MAX_FILES));
        }
        if pending.iter().any(|existing| existing.id == meta.id) {
            return Err(ConvertError::Validation(format!(
                "file id {} is already registered",
                meta.id
            )));
        }
        pending.push(meta);
        Ok(())
    }

    /// Mark a pending file as being converted.
    pub fn claim(&self, id: &str) -> Result<UploadedImageMeta> {
        let mut state = self.state();
        let meta = state
            .session
            .pending
            .iter()
            .find(|meta| meta.id == id)
            .cloned()
            .ok_or_else(|| ConvertError::UnknownFile(id.to_string()))?;
        if !state.processing.insert(id.to_string()) {
            return Err(ConvertError::Validation(format!(
                "file {} is already being converted",
                id
            )));
        }
        Ok(meta)
    }

    /// Move a claimed file from pending to converted.
    pub fn complete(&self, result: ConversionResult) {
        let mut state = self.state();
        state.processing.remove(&result.id);
        state.session.record(result);
    }

    /// Give up a claim after a failure; the file stays pending for a retry.
    pub fn release(&self, id: &str) {
        self.state().processing.remove(id);
    }

    pub fn is_processing(&self, id: &str) -> bool {
        self.state().processing.contains(id)
    }

    pub fn statistics(&self) -> BatchStatistics {
        BatchStatistics::from_results(&self.state().session.converted)
    }

    /// Empty the session, returning what it held so the caller can clean up files.
    pub fn clear(&self) -> Session {
        let mut state = self.state();
        state.processing.clear();
        std::mem::take(&mut state.session)
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
