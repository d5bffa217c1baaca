// Download core - format rules, progress normalization, orchestration

pub mod cookies;
pub mod engine;
pub mod errors;
pub mod formats;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod queue;
pub mod tools;
pub mod utils;
pub mod ytdlp;

pub use engine::{DownloadEngine, EngineError, EngineRequest, PostProcessor, ProbeReport};
pub use errors::{DownloadError, ForbiddenKind, NotFoundKind};
pub use formats::{FormatOption, FormatSelector, SelectionExpression};
pub use models::{
    DownloadOutcome, DownloadRequest, DownloadType, StreamDescriptor, VideoInfo, VideoType,
};
pub use orchestrator::Downloader;
pub use progress::{DownloadStatus, ProgressNormalizer, ProgressRecord, RawEvent};
pub use queue::{DownloadQueue, QueueItem};
pub use ytdlp::YtDlpEngine;
