// Download orchestration
//
// Builds one engine configuration per operation, invokes the engine, and
// classifies failures. The single policy exception is the 403 case, which
// gets exactly one scripted retry with the loose selection expression.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use super::cookies;
use super::engine::{DownloadEngine, EngineError, EngineRequest, PostProcessor};
use super::errors::{
    classify_engine_error, is_http_forbidden, DownloadError, ForbiddenKind, NotFoundKind,
};
use super::formats::FormatSelector;
use super::models::{
    default_output_dir, DownloadOutcome, DownloadRequest, VideoInfo, VideoType,
};
use super::progress::{ProgressNormalizer, ProgressRecord, RawEvent};
use super::tools;

/// Audio containers the transcoder can target directly; anything else
/// falls back to mp3
const AUDIO_CODECS: [&str; 5] = ["mp3", "aac", "wav", "flac", "m4a"];

/// Drives the external engine for one operation at a time.
///
/// The calling shell serializes operations through its own worker
/// lifecycle; the only state shared across the foreground/worker boundary
/// is the cancellation flag, a plain atomic set on one side and read on
/// the other.
pub struct Downloader {
    engine: Box<dyn DownloadEngine>,
    output_dir: PathBuf,
    ffmpeg_path: Option<PathBuf>,
    cookies_file: Option<PathBuf>,
    cookies_from_browser: bool,
    cancelled: Arc<AtomicBool>,
}

impl Downloader {
    pub fn new(engine: Box<dyn DownloadEngine>) -> Self {
        Self {
            engine,
            output_dir: default_output_dir(),
            ffmpeg_path: None,
            cookies_file: None,
            cookies_from_browser: false,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_ffmpeg_path(mut self, path: Option<PathBuf>) -> Self {
        self.ffmpeg_path = path;
        self
    }

    pub fn with_cookies_file(mut self, path: Option<PathBuf>) -> Self {
        self.cookies_file = path;
        self
    }

    pub fn with_cookies_from_browser(mut self, enabled: bool) -> Self {
        self.cookies_from_browser = enabled;
        self
    }

    /// Request cancellation of the operation in flight.
    ///
    /// Advisory: the engine call itself cannot be interrupted, so this
    /// takes effect at the next checkpoint the orchestrator controls or
    /// when the call eventually returns.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clone of the cancellation flag for a controlling shell
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Extract metadata without downloading.
    ///
    /// The content kind comes from the URL shape, not from the engine:
    /// the two can disagree, and the URL shape is what drives output
    /// templating later.
    pub async fn probe(&self, url: &str) -> Result<VideoInfo, DownloadError> {
        eprintln!("[Downloader] Probing {}", url);
        let request = self.base_request();

        let report = self.engine.probe(url, &request).await.map_err(|e| {
            eprintln!("[Downloader] Probe failed: {}", e);
            match classify_engine_error(e.message()) {
                // A probe that extracts nothing means the URL did not
                // resolve to content
                DownloadError::Failed(_) => DownloadError::NotFound(NotFoundKind::Unresolvable),
                classified => classified,
            }
        })?;

        Ok(VideoInfo {
            url: url.to_string(),
            title: report.title,
            duration_seconds: report.duration_seconds,
            thumbnail: report.thumbnail,
            uploader: report.uploader,
            video_type: VideoType::from_url(url),
            streams: report.streams,
            is_live: report.is_live,
            age_limit: report.age_limit,
        })
    }

    /// Download a single item
    pub async fn download(
        &self,
        url: &str,
        request: &DownloadRequest,
        progress: UnboundedSender<ProgressRecord>,
    ) -> Result<DownloadOutcome, DownloadError> {
        self.cancelled.store(false, Ordering::SeqCst);
        let engine_request = self.build_request(request, false, None);
        self.run(url, engine_request, request.wants_audio(), progress).await
    }

    /// Download a playlist into a per-playlist subfolder, entries numbered
    /// by playlist index. `items` is the engine's own range-list syntax
    /// (e.g. "1-5,7,9-10"), passed through uninterpreted.
    pub async fn download_playlist(
        &self,
        url: &str,
        request: &DownloadRequest,
        items: Option<&str>,
        progress: UnboundedSender<ProgressRecord>,
    ) -> Result<DownloadOutcome, DownloadError> {
        self.cancelled.store(false, Ordering::SeqCst);
        let engine_request = self.build_request(request, true, items);
        self.run(url, engine_request, request.wants_audio(), progress).await
    }

    fn base_request(&self) -> EngineRequest {
        EngineRequest::new()
            .with_cookies(cookies::resolve_cookies(
                self.cookies_file.as_deref(),
                self.cookies_from_browser,
            ))
            .with_ffmpeg_location(tools::locate_ffmpeg(self.ffmpeg_path.as_deref()))
    }

    fn build_request(
        &self,
        request: &DownloadRequest,
        playlist: bool,
        items: Option<&str>,
    ) -> EngineRequest {
        let audio = request.wants_audio();

        let mut engine_request = self.base_request().with_format(
            FormatSelector::selection_for_quality(&request.quality, &request.container, audio)
                .render(),
        );

        engine_request = if playlist {
            let template = self
                .output_dir
                .join("%(playlist_title)s")
                .join("%(playlist_index)s - %(title)s.%(ext)s");
            engine_request
                .with_output_template(template.to_string_lossy())
                .with_no_playlist(false)
                .with_playlist_items(items.map(str::to_string))
        } else {
            let template = self.output_dir.join("%(title)s.%(ext)s");
            engine_request
                .with_output_template(template.to_string_lossy())
                .with_no_playlist(true)
        };

        if audio {
            let codec = if AUDIO_CODECS.contains(&request.container.as_str()) {
                request.container.clone()
            } else {
                "mp3".to_string()
            };
            engine_request.with_postprocessor(PostProcessor::ExtractAudio {
                codec,
                quality: "320".to_string(),
            })
        } else {
            engine_request
                .with_merge_output_format(Some(request.container.clone()))
                .with_postprocessor(PostProcessor::EmbedMetadata)
        }
    }

    async fn run(
        &self,
        url: &str,
        mut engine_request: EngineRequest,
        audio: bool,
        progress: UnboundedSender<ProgressRecord>,
    ) -> Result<DownloadOutcome, DownloadError> {
        if self.is_cancelled() {
            return Ok(DownloadOutcome::Cancelled);
        }

        let error = match self.invoke(url, &engine_request, progress.clone()).await {
            Ok(()) => return Ok(DownloadOutcome::Completed),
            Err(error) => error,
        };

        if self.is_cancelled() {
            return Ok(DownloadOutcome::Cancelled);
        }

        if is_http_forbidden(error.message()) {
            // One scripted retry with the loose expression; a second 403
            // surfaces as Forbidden, never a further retry
            eprintln!("[Downloader] 403 from engine, retrying once with fallback format");
            engine_request.format = Some(FormatSelector::fallback_selection(audio).render());

            return match self.invoke(url, &engine_request, progress).await {
                Ok(()) => Ok(DownloadOutcome::Completed),
                Err(_) if self.is_cancelled() => Ok(DownloadOutcome::Cancelled),
                Err(retry_error) => {
                    eprintln!("[Downloader] Fallback retry failed: {}", retry_error);
                    Err(DownloadError::Forbidden(ForbiddenKind::AccessDenied))
                }
            };
        }

        Err(classify_engine_error(error.message()))
    }

    /// Invoke the engine with a normalizer pump between its raw events and
    /// the consumer's record channel. The pump owns the normalizer, so no
    /// lock is needed.
    async fn invoke(
        &self,
        url: &str,
        request: &EngineRequest,
        progress: UnboundedSender<ProgressRecord>,
    ) -> Result<(), EngineError> {
        let (raw_tx, mut raw_rx) = unbounded_channel::<RawEvent>();

        let pump = tokio::spawn(async move {
            let mut normalizer = ProgressNormalizer::new();
            while let Some(event) = raw_rx.recv().await {
                if let Some(record) = normalizer.handle(&event) {
                    if progress.send(record).is_err() {
                        break;
                    }
                }
            }
        });

        let result = self.engine.download(url, request, raw_tx).await;
        let _ = pump.await;
        result
    }
}
