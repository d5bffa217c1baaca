// Engine boundary
//
// The actual media retrieval (URL parsing, stream extraction, network
// fetch, container muxing) lives in an external engine behind this trait.
// The core only assembles configuration, streams raw progress events out,
// and classifies the free-text failures the engine reports.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;

use super::cookies::CookieSource;
use super::models::StreamDescriptor;
use super::progress::RawEvent;

/// Failure reported by the engine. Free text only; classification into the
/// user-facing taxonomy is the orchestrator's job.
#[derive(Debug, Clone)]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EngineError {}

/// Post-download step the engine runs through the transcoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessor {
    /// Drop the video track and transcode the audio
    ExtractAudio { codec: String, quality: String },
    /// Write title/uploader tags into the container
    EmbedMetadata,
}

/// Configuration mapping for one engine invocation
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// Rendered selection expression; `None` lets the engine pick freely
    pub format: Option<String>,
    pub output_template: Option<String>,
    pub merge_output_format: Option<String>,
    pub postprocessors: Vec<PostProcessor>,
    pub cookies: Option<CookieSource>,
    pub no_playlist: bool,
    /// Item-range list in the engine's own syntax (e.g. "1-5,7,9-10"),
    /// passed through uninterpreted
    pub playlist_items: Option<String>,
    pub geo_bypass: bool,
    pub no_check_certificate: bool,
    pub ffmpeg_location: Option<PathBuf>,
}

impl Default for EngineRequest {
    fn default() -> Self {
        Self {
            format: None,
            output_template: None,
            merge_output_format: None,
            postprocessors: Vec::new(),
            cookies: None,
            no_playlist: true,
            playlist_items: None,
            geo_bypass: true,
            no_check_certificate: true,
            ffmpeg_location: None,
        }
    }
}

impl EngineRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_output_template(mut self, template: impl Into<String>) -> Self {
        self.output_template = Some(template.into());
        self
    }

    pub fn with_merge_output_format(mut self, container: Option<String>) -> Self {
        self.merge_output_format = container;
        self
    }

    pub fn with_postprocessor(mut self, step: PostProcessor) -> Self {
        self.postprocessors.push(step);
        self
    }

    pub fn with_cookies(mut self, cookies: Option<CookieSource>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_no_playlist(mut self, no_playlist: bool) -> Self {
        self.no_playlist = no_playlist;
        self
    }

    pub fn with_playlist_items(mut self, items: Option<String>) -> Self {
        self.playlist_items = items;
        self
    }

    pub fn with_ffmpeg_location(mut self, location: Option<PathBuf>) -> Self {
        self.ffmpeg_location = location;
        self
    }
}

/// Metadata-only extraction result
#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    pub title: String,
    pub uploader: String,
    pub duration_seconds: u64,
    pub thumbnail: String,
    pub is_live: bool,
    pub age_limit: u8,
    pub streams: Vec<StreamDescriptor>,
}

/// The external download engine.
///
/// `download` blocks until the engine finishes and is uninterruptible from
/// this side; raw progress events arrive on the sender while it runs.
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Name of the engine (for logging)
    fn name(&self) -> &'static str;

    /// Extract metadata without downloading
    async fn probe(&self, url: &str, request: &EngineRequest) -> Result<ProbeReport, EngineError>;

    /// Download to disk, emitting raw progress events as they happen
    async fn download(
        &self,
        url: &str,
        request: &EngineRequest,
        events: UnboundedSender<RawEvent>,
    ) -> Result<(), EngineError>;
}
