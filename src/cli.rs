use crate::constants::DEFAULT_WORKSPACE_DIR;
use crate::formats::{SourceFormat, TargetFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "img-convert",
    about = "Convert batches of images between JPEG, PNG and WebP with savings estimates",
    long_about = "img-convert keeps a session workspace of uploaded images, recommends a target \
                  format per batch, estimates the size savings and converts every pending file \
                  with resizing and thumbnails. One failing file never stops the rest of the batch.",
    version,
    after_help = "EXAMPLES:\n  \
    img-convert upload ./photos -r\n  \
    img-convert analyze\n  \
    img-convert convert -f webp -q 80\n  \
    img-convert convert --file-id img_62f1c0a90003 -f jpeg\n  \
    img-convert estimate --from png --to webp --size 2400000 --transparent"
)]
pub struct Args {
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_WORKSPACE_DIR,
        help = "Session workspace directory"
    )]
    pub workspace: PathBuf,

    #[arg(long, global = true, help = "Only print errors")]
    pub quiet: bool,

    #[arg(short = 'v', long, global = true, help = "Print processing details")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(
        about = "Add images to the session",
        long_about = "Validate images and copy them into the workspace as pending files. \
                      Inputs may be files, directories or glob patterns."
    )]
    Upload {
        #[arg(
            required = true,
            help = "Files, directories or glob patterns",
            long_help = "Examples: photo.png, ./images, './images/*.jpg'"
        )]
        inputs: Vec<String>,

        #[arg(short = 'r', long, help = "Descend into subdirectories")]
        recursive: bool,
    },

    #[command(
        about = "Recommend a target format for the pending files",
        long_about = "Probe every pending file for transparency, recommend a format per file and \
                      for the batch, and estimate the total savings."
    )]
    Analyze {
        #[arg(
            short = 'q',
            long,
            help = "Quality to estimate for (1-100)",
            long_help = "Apply the quality adjustment to the estimate. \
                         Without it only the format transition is considered."
        )]
        quality: Option<u32>,

        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },

    #[command(about = "Estimate savings for one format transition")]
    Estimate {
        #[arg(long, help = "Current format (jpeg, png, gif, webp)")]
        from: SourceFormat,

        #[arg(long, help = "Target format (jpeg, png, webp)")]
        to: TargetFormat,

        #[arg(long, help = "Original size in bytes")]
        size: u64,

        #[arg(long, help = "The source has transparency")]
        transparent: bool,

        #[arg(short = 'q', long, help = "Target quality (1-100)")]
        quality: Option<u32>,
    },

    #[command(
        about = "Convert pending files",
        long_about = "Convert every pending file, or only the one named by --file-id. \
                      Converted sources are removed from the session; failed files stay \
                      pending so they can be retried."
    )]
    Convert {
        #[arg(
            short = 'f',
            long,
            help = "Target format (jpeg, png, webp)",
            long_help = "Target format. Defaults to the batch recommendation."
        )]
        format: Option<TargetFormat>,

        #[arg(
            short = 'q',
            long,
            help = "Quality (1-100, default: 85)",
            long_help = "Quality for lossy targets. Out-of-range values are clamped; \
                         JPEG output is capped at 95."
        )]
        quality: Option<u32>,

        #[arg(long, help = "Convert only this pending file")]
        file_id: Option<String>,

        #[arg(short = 'j', long, help = "Number of parallel threads (default: auto)")]
        threads: Option<usize>,

        #[arg(
            long,
            help = "Time budget for a whole batch in seconds (default: 300)",
            long_help = "Files not started within the budget are left pending and reported."
        )]
        budget_secs: Option<u64>,

        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },

    #[command(about = "Show pending and converted files")]
    Status {
        #[arg(long, help = "Print the session as JSON")]
        json: bool,
    },

    #[command(about = "Clear the session and delete its files")]
    Reset,

    #[command(
        about = "Analyze a single image",
        long_about = "Show dimensions, format, transparency, the recommended format and \
                      estimated savings for every supported target."
    )]
    Info {
        #[arg(help = "Image file path to analyze")]
        input: PathBuf,

        #[arg(short = 'q', long, help = "Quality to estimate for (1-100)")]
        quality: Option<u32>,
    },
}
