pub mod downloader;

pub use downloader::{
    DownloadEngine, DownloadError, DownloadOutcome, DownloadQueue, DownloadRequest,
    DownloadStatus, DownloadType, Downloader, EngineRequest, FormatSelector, ProgressNormalizer,
    ProgressRecord, StreamDescriptor, VideoInfo, VideoType, YtDlpEngine,
};
