use anyhow::{bail, Context, Result};
use clap::Parser;
use img_convert::advisor::FormatAdvisor;
use img_convert::batch::{BatchCoordinator, BatchOptions, ConversionRequest};
use img_convert::cli::{Args, Commands};
use img_convert::codec::ImageCodec;
use img_convert::constants::{DEFAULT_BATCH_BUDGET_SECS, DEFAULT_QUALITY};
use img_convert::converter::{clamp_quality, ImageConverter};
use img_convert::estimator::estimate_savings;
use img_convert::formats::TargetFormat;
use img_convert::info::{
    inspect, print_analysis_report, print_batch_report, print_image_info, print_savings_estimate,
    print_status,
};
use img_convert::session::{discard_files, BatchStatistics, Session, SessionStore, Workspace};
use img_convert::storage::FsStorage;
use img_convert::upload::{collect_inputs, Uploader};
use img_convert::{info, logger, verbose};
use fd_lock::RwLock;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(args.quiet, args.verbose);
    let root = args.workspace;

    let storage = FsStorage::new();
    let codec = ImageCodec::new();

    match args.command {
        Commands::Upload { inputs, recursive } => {
            let workspace = open_workspace(&root)?;
            let mut lock = lock_workspace(&workspace)?;
            let _guard = lock.write().context("cannot lock workspace")?;
            let session = load_session(&workspace, &storage)?;
            let files = collect_inputs(&inputs, recursive)?;
            let summary = Uploader::new(&storage, &session, workspace.uploads_dir())
                .register_all(&files);
            session
                .save(&storage, &workspace.session_file())
                .context("failed to save session")?;

            info!(
                "📥 Uploaded {} file(s), {} pending in total",
                summary.registered.len(),
                session.pending_count()
            );
            if summary.registered.is_empty() {
                bail!("no files were uploaded");
            }
        }
        Commands::Analyze { quality, json } => {
            let workspace = open_workspace(&root)?;
            let session = load_session(&workspace, &storage)?;
            let pending = session.pending();
            if pending.is_empty() {
                bail!("no files are pending; run `img-convert upload` first");
            }
            let report = FormatAdvisor::new(&codec, &storage)
                .with_quality(quality.map(clamp_quality))
                .analyze(&pending);
            if json {
                print_json(&report)?;
            } else {
                print_analysis_report(&report);
            }
        }
        Commands::Estimate {
            from,
            to,
            size,
            transparent,
            quality,
        } => {
            let estimate = estimate_savings(size, from, to, transparent, quality.map(clamp_quality));
            print_savings_estimate(size, from, to, &estimate);
        }
        Commands::Convert {
            format,
            quality,
            file_id,
            threads,
            budget_secs,
            json,
        } => {
            let workspace = open_workspace(&root)?;
            let mut lock = lock_workspace(&workspace)?;
            let _guard = lock.write().context("cannot lock workspace")?;
            let session = load_session(&workspace, &storage)?;
            let format = match format {
                Some(format) => format,
                None => recommended_format(&codec, &storage, &session, file_id.as_deref()),
            };
            let request = ConversionRequest::new(
                format,
                quality.unwrap_or_else(|| u32::from(DEFAULT_QUALITY)),
            );
            let options = BatchOptions {
                budget: Some(Duration::from_secs(
                    budget_secs.unwrap_or(DEFAULT_BATCH_BUDGET_SECS),
                )),
                threads,
            };

            let coordinator = BatchCoordinator::new(
                ImageConverter::new(&codec),
                &storage,
                &session,
                workspace.processed_dir(),
            )
            .with_options(options)
            .with_session_file(workspace.session_file());

            let report = match file_id.as_deref() {
                Some(id) => coordinator.process_one(id, request)?,
                None => coordinator.process_all(request)?,
            };
            session
                .save(&storage, &workspace.session_file())
                .context("failed to save session")?;

            if json {
                print_json(&report)?;
            } else {
                print_batch_report(&report);
            }
        }
        Commands::Status { json } => {
            let workspace = open_workspace(&root)?;
            let session = load_session(&workspace, &storage)?;
            if json {
                #[derive(Serialize)]
                struct Status {
                    session: Session,
                    statistics: BatchStatistics,
                }
                print_json(&Status {
                    session: session.snapshot(),
                    statistics: session.statistics(),
                })?;
            } else {
                print_status(&session.snapshot(), &session.statistics());
            }
        }
        Commands::Reset => {
            let workspace = open_workspace(&root)?;
            let mut lock = lock_workspace(&workspace)?;
            let _guard = lock.write().context("cannot lock workspace")?;
            let session = load_session(&workspace, &storage)?;
            let removed = discard_files(&session.clear(), &storage);
            session
                .save(&storage, &workspace.session_file())
                .context("failed to save session")?;
            info!("🧹 Session cleared, {} file(s) removed", removed);
        }
        Commands::Info { input, quality } => {
            let image = inspect(&codec, &input, quality.map(clamp_quality))
                .with_context(|| format!("failed to analyze {}", input.display()))?;
            print_image_info(&image);
        }
    }

    Ok(())
}

fn open_workspace(root: &Path) -> Result<Workspace> {
    Workspace::open(root).with_context(|| format!("cannot open workspace {}", root.display()))
}

/// Commands that change the session hold this lock's write guard from load
/// to save, so concurrent invocations run one after another.
fn lock_workspace(workspace: &Workspace) -> Result<RwLock<File>> {
    workspace
        .lock()
        .with_context(|| format!("cannot open {}", workspace.lock_file().display()))
}

fn load_session(workspace: &Workspace, storage: &FsStorage) -> Result<SessionStore> {
    SessionStore::load(storage, &workspace.session_file())
        .with_context(|| format!("cannot read {}", workspace.session_file().display()))
}

/// Batch recommendation, or the single file's recommendation with `--file-id`.
fn recommended_format(
    codec: &ImageCodec,
    storage: &FsStorage,
    session: &SessionStore,
    file_id: Option<&str>,
) -> TargetFormat {
    let pending: Vec<_> = session
        .pending()
        .into_iter()
        .filter(|meta| file_id.map_or(true, |id| meta.id == id))
        .collect();
    let report = FormatAdvisor::new(codec, storage).analyze(&pending);
    verbose!("using recommended format {}", report.recommended_format);
    report.recommended_format
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
