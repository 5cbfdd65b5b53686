use crate::constants::{
    DEFAULT_BATCH_BUDGET_SECS, DEFAULT_QUALITY, FILE_ID_PREFIX, HIGH_QUALITY_WARNING_THRESHOLD,
    MIN_AVAILABLE_MEMORY_MIB, THUMBNAIL_PREFIX,
};
use crate::converter::{clamp_quality, ImageConverter};
use crate::error::{ConvertError, FileError, Result};
use crate::formats::TargetFormat;
use crate::session::{BatchStatistics, ConversionResult, SessionStore, UploadedImageMeta};
use crate::storage::Storage;
use crate::utils::{create_progress_bar, sanitize_stem};
use crate::{error, verbose, warn};
use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

/// Target format and quality chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionRequest {
    pub format: TargetFormat,
    pub quality: u8,
}

impl ConversionRequest {
    pub fn new(format: TargetFormat, quality: impl Into<i64>) -> Self {
        Self {
            format,
            quality: clamp_quality(quality),
        }
    }
}

impl Default for ConversionRequest {
    fn default() -> Self {
        Self::new(TargetFormat::Jpeg, DEFAULT_QUALITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Wall-clock limit for a whole-batch run. Files not started in time are
    /// reported as unprocessed.
    pub budget: Option<Duration>,
    /// Upper bound on worker threads; further capped by memory and CPU count.
    pub threads: Option<usize>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            budget: Some(Duration::from_secs(DEFAULT_BATCH_BUDGET_SECS)),
            threads: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub results: Vec<ConversionResult>,
    pub errors: Vec<FileError>,
    /// Ids left pending because the time budget ran out.
    pub unprocessed: Vec<String>,
    /// Totals over every conversion in the session, not just this call.
    pub statistics: BatchStatistics,
    pub processed_count: usize,
    pub error_count: usize,
}

impl BatchReport {
    pub fn is_partial(&self) -> bool {
        self.processed_count > 0 && (self.error_count > 0 || !self.unprocessed.is_empty())
    }

    fn finalize(mut self, statistics: BatchStatistics) -> Self {
        self.processed_count = self.results.len();
        self.error_count = self.errors.len();
        self.statistics = statistics;
        self
    }
}

enum Outcome {
    Converted(ConversionResult),
    Failed(FileError),
    Skipped(String),
}

/// Output file name: `<safe stem>_<id suffix>.<ext>`.
pub fn output_file_name(meta: &UploadedImageMeta, format: TargetFormat) -> String {
    format!(
        "{}_{}.{}",
        sanitize_stem(&meta.original_name),
        id_suffix(&meta.id),
        format.extension()
    )
}

/// Thumbnails are always JPEG regardless of the main output format.
pub fn thumbnail_file_name(output_name: &str) -> String {
    let stem = Path::new(output_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}{}.jpg", THUMBNAIL_PREFIX, stem)
}

/// Everything after the id prefix. Generated ids carry the full upload
/// timestamp, so the suffix stays unique across separate runs.
fn id_suffix(id: &str) -> String {
    id.strip_prefix(FILE_ID_PREFIX)
        .unwrap_or(id)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Drives [`ImageConverter`] over the pending files of a session.
///
/// Both [`process_all`](Self::process_all) and
/// [`process_one`](Self::process_one) go through the same per-file step, so a
/// file converts identically whichever mode triggered it.
pub struct BatchCoordinator<'a> {
    converter: ImageConverter<'a>,
    storage: &'a dyn Storage,
    session: &'a SessionStore,
    output_dir: PathBuf,
    options: BatchOptions,
    session_file: Option<PathBuf>,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(
        converter: ImageConverter<'a>,
        storage: &'a dyn Storage,
        session: &'a SessionStore,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            converter,
            storage,
            session,
            output_dir: output_dir.into(),
            options: BatchOptions::default(),
            session_file: None,
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Keep the session in step with the copy saved at `path`: it is merged in
    /// before files are claimed and written back after every conversion.
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    /// Convert every pending file.
    ///
    /// Fails up front for an unsupported target, an empty session or too little
    /// disk space. After that, per-file failures only land in `errors`.
    pub fn process_all(&self, request: ConversionRequest) -> Result<BatchReport> {
        self.converter.ensure_supported(request.format)?;
        self.refresh()?;
        let pending = self.session.pending();
        if pending.is_empty() {
            return Err(ConvertError::Validation(
                "no files are pending conversion".to_string(),
            ));
        }
        self.check_storage(&pending)?;
        warn_high_quality(request);

        let threads = self.worker_count(&pending);
        verbose!(
            "converting {} file(s) to {} at quality {} on {} thread(s)",
            pending.len(),
            request.format,
            request.quality,
            threads
        );
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| ConvertError::ThreadPool(e.to_string()))?;

        let deadline = self.options.budget.map(|budget| Instant::now() + budget);
        let progress = create_progress_bar(pending.len() as u64);

        let outcomes: Vec<Outcome> = pool.install(|| {
            pending
                .par_iter()
                .map(|meta| {
                    let outcome = if deadline.is_some_and(|d| Instant::now() >= d) {
                        Outcome::Skipped(meta.id.clone())
                    } else {
                        progress.set_message(meta.original_name.clone());
                        match self.session.claim(&meta.id) {
                            Ok(claimed) => match self.convert_claimed(&claimed, request) {
                                Ok(result) => Outcome::Converted(result),
                                Err(failure) => Outcome::Failed(failure),
                            },
                            Err(e) => Outcome::Failed(FileError::new(
                                &meta.id,
                                &meta.original_name,
                                &e,
                            )),
                        }
                    };
                    progress.inc(1);
                    outcome
                })
                .collect()
        });
        progress.finish_with_message("done");

        let mut report = BatchReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Converted(result) => report.results.push(result),
                Outcome::Failed(failure) => report.errors.push(failure),
                Outcome::Skipped(id) => report.unprocessed.push(id),
            }
        }
        if !report.unprocessed.is_empty() {
            warn!(
                "Time budget exhausted, {} file(s) left pending",
                report.unprocessed.len()
            );
        }

        Ok(report.finalize(self.session.statistics()))
    }

    /// Convert a single pending file by id.
    ///
    /// An unknown id, or one already being converted, is an error for the
    /// call. A decode or encode failure is reported in `errors` and the file
    /// stays pending.
    pub fn process_one(&self, id: &str, request: ConversionRequest) -> Result<BatchReport> {
        self.converter.ensure_supported(request.format)?;
        warn_high_quality(request);

        self.refresh()?;
        let meta = self.session.claim(id)?;
        let mut report = BatchReport::default();
        match self.convert_claimed(&meta, request) {
            Ok(result) => report.results.push(result),
            Err(failure) => report.errors.push(failure),
        }
        Ok(report.finalize(self.session.statistics()))
    }

    /// Convert a file the caller has already claimed, then record the outcome
    /// in the session.
    fn convert_claimed(
        &self,
        meta: &UploadedImageMeta,
        request: ConversionRequest,
    ) -> std::result::Result<ConversionResult, FileError> {
        match self.convert_one(meta, request) {
            Ok(result) => {
                self.session.complete(result.clone());
                self.persist();
                Ok(result)
            }
            Err(e) => {
                self.session.release(&meta.id);
                error!("Failed to convert {}: {}", meta.original_name, e);
                Err(FileError::new(&meta.id, &meta.original_name, &e))
            }
        }
    }

    /// Convert, then delete the source. If the source cannot be deleted the
    /// outputs are removed again and the file counts as failed.
    fn convert_one(
        &self,
        meta: &UploadedImageMeta,
        request: ConversionRequest,
    ) -> Result<ConversionResult> {
        let output_name = output_file_name(meta, request.format);
        let output_path = self.output_dir.join(&output_name);
        let thumbnail_path = self.output_dir.join(thumbnail_file_name(&output_name));

        let converted = self.converter.convert(
            self.storage,
            &meta.path,
            &output_path,
            &thumbnail_path,
            request.format,
            request.quality,
        )?;

        if let Err(e) = self.storage.delete(&meta.path) {
            // a source that is already gone was converted elsewhere, and the
            // outputs at these paths are that conversion's
            if !matches!(e, ConvertError::FileNotFound(_)) {
                let _ = self.storage.delete(&output_path);
                let _ = self.storage.delete(&thumbnail_path);
            }
            return Err(e);
        }

        let (savings, savings_percent) =
            ConversionResult::savings_between(meta.size, converted.processed_size);
        verbose!(
            "{} -> {} ({:.1}%)",
            meta.original_name,
            output_name,
            savings_percent
        );

        Ok(ConversionResult {
            id: meta.id.clone(),
            original_name: meta.original_name.clone(),
            output_name,
            output_path: converted.output_path,
            thumbnail_path: converted.thumbnail_path,
            format: request.format,
            quality: request.quality,
            width: converted.width,
            height: converted.height,
            original_size: meta.size,
            processed_size: converted.processed_size,
            savings,
            savings_percent,
            converted_at: Utc::now(),
        })
    }

    fn refresh(&self) -> Result<()> {
        match &self.session_file {
            Some(path) => self.session.refresh(self.storage, path),
            None => Ok(()),
        }
    }

    fn persist(&self) {
        let Some(path) = &self.session_file else {
            return;
        };
        if let Err(e) = self.session.sync(self.storage, path) {
            warn!("Could not save session: {}", e);
        }
    }

    fn check_storage(&self, pending: &[UploadedImageMeta]) -> Result<()> {
        let required: u64 = pending.iter().map(|meta| meta.size).sum();
        match self.storage.available_space(&self.output_dir) {
            Some(available) if available <= required => {
                Err(ConvertError::InsufficientStorage {
                    required,
                    available,
                })
            }
            _ => Ok(()),
        }
    }

    /// Threads to use: CPU count, then `--threads`, then what fits in memory
    /// given the average decoded size of the pending files.
    fn worker_count(&self, pending: &[UploadedImageMeta]) -> usize {
        let mut threads = num_cpus::get().min(pending.len()).max(1);
        if let Some(limit) = self.options.threads {
            threads = threads.min(limit.max(1));
        }

        let total_decoded: u64 = pending.iter().map(|meta| meta.pixel_count() * 4).sum();
        let avg_per_file_mib = (total_decoded / pending.len().max(1) as u64 / (1024 * 1024)).max(1);

        let mut sys =
            System::new_with_specifics(RefreshKind::new().with_memory(MemoryRefreshKind::new()));
        sys.refresh_memory();
        let available_mib = sys.available_memory() / (1024 * 1024);
        if available_mib == 0 {
            return threads;
        }
        let memory_cap =
            (available_mib.saturating_sub(MIN_AVAILABLE_MEMORY_MIB) / avg_per_file_mib).max(1);
        threads.min(memory_cap as usize)
    }
}

fn warn_high_quality(request: ConversionRequest) {
    if request.format.is_lossy() && request.quality > HIGH_QUALITY_WARNING_THRESHOLD {
        warn!(
            "Quality {} rarely shrinks {} output further and may enlarge it",
            request.quality, request.format
        );
    }
}
