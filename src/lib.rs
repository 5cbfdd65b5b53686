pub mod logger;

pub mod advisor;
pub mod batch;
pub mod cli;
pub mod codec;
pub mod constants;
pub mod converter;
pub mod error;
pub mod estimator;
pub mod formats;
pub mod info;
pub mod session;
pub mod storage;
pub mod transparency;
pub mod upload;
pub mod utils;
pub mod validation;

pub use advisor::{AnalysisReport, FormatAdvisor, ImageAnalysis, RecommendationRule};
pub use batch::{BatchCoordinator, BatchOptions, BatchReport, ConversionRequest};
pub use codec::{Codec, DecodedImage, EncodeOptions, ImageCodec};
pub use converter::{ConverterOptions, ImageConverter};
pub use error::{ConvertError, ErrorKind, FileError, Result};
pub use estimator::{estimate, estimate_savings, SavingsEstimate};
pub use formats::{SourceFormat, TargetFormat};
pub use session::{
    BatchStatistics, ConversionResult, Session, SessionStore, UploadedImageMeta, Workspace,
};
pub use storage::{FsStorage, MemoryStorage, Storage};
pub use transparency::has_transparency;
pub use upload::{collect_image_files, collect_inputs, Uploader};
