// yt-dlp CLI engine
//
// Spawns the yt-dlp binary, streams its stdout line by line, and converts
// the machine-readable progress lines requested via --progress-template
// into raw events. Metadata probes run --dump-json under a timeout.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;

use super::cookies::CookieSource;
use super::engine::{DownloadEngine, EngineError, EngineRequest, PostProcessor, ProbeReport};
use super::models::StreamDescriptor;
use super::progress::RawEvent;
use super::tools;
use super::utils::run_with_timeout;

/// Leads every machine-readable progress line so it can't collide with
/// yt-dlp's own output
const PROGRESS_PREFIX: &str = "tubegrab-progress|";

/// Template handed to --progress-template; absent fields render as "NA"
const PROGRESS_TEMPLATE: &str = "download:tubegrab-progress|%(progress.status)s|\
%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|\
%(progress.speed)s|%(progress.eta)s|%(progress._percent_str)s|%(progress.filename)s";

lazy_static! {
    static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").unwrap();
    static ref MERGE_RE: Regex = Regex::new(r"\[Merger\]\s+Merging").unwrap();
    static ref ALREADY_RE: Regex = Regex::new(r"has already been downloaded").unwrap();
}

pub struct YtDlpEngine {
    binary: PathBuf,
    probe_timeout_secs: u64,
}

impl YtDlpEngine {
    pub fn new() -> Self {
        Self {
            binary: tools::find_ytdlp(),
            probe_timeout_secs: 30,
        }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            probe_timeout_secs: 30,
        }
    }

    pub fn is_available(&self) -> bool {
        tools::tool_version(&self.binary).is_some()
    }

    /// Flags shared by probe and download invocations
    fn base_args(&self, request: &EngineRequest) -> Vec<String> {
        let mut args = vec!["--no-warnings".to_string(), "--no-color".to_string()];

        if request.geo_bypass {
            args.push("--geo-bypass".to_string());
        }
        if request.no_check_certificate {
            args.push("--no-check-certificates".to_string());
        }

        match &request.cookies {
            Some(CookieSource::File(path)) => {
                args.push("--cookies".to_string());
                args.push(path.to_string_lossy().to_string());
            }
            Some(CookieSource::Browser(browser)) => {
                args.push("--cookies-from-browser".to_string());
                args.push(browser.to_string());
            }
            None => {}
        }

        if let Some(location) = &request.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(location.to_string_lossy().to_string());
        }

        args
    }

    fn probe_args(&self, url: &str, request: &EngineRequest) -> Vec<String> {
        let mut args = self.base_args(request);
        args.push("--dump-json".to_string());
        if request.no_playlist {
            args.push("--no-playlist".to_string());
        }
        args.push(url.to_string());
        args
    }

    fn download_args(&self, url: &str, request: &EngineRequest) -> Vec<String> {
        let mut args = self.base_args(request);

        if let Some(format) = &request.format {
            args.push("-f".to_string());
            args.push(format.clone());
        }
        if let Some(template) = &request.output_template {
            args.push("-o".to_string());
            args.push(template.clone());
        }

        args.push("--newline".to_string());
        args.push("--progress-template".to_string());
        args.push(PROGRESS_TEMPLATE.to_string());

        if request.no_playlist {
            args.push("--no-playlist".to_string());
        } else {
            args.push("--yes-playlist".to_string());
        }
        if let Some(items) = &request.playlist_items {
            args.push("--playlist-items".to_string());
            args.push(items.clone());
        }

        if let Some(container) = &request.merge_output_format {
            args.push("--merge-output-format".to_string());
            args.push(container.clone());
        }

        for step in &request.postprocessors {
            match step {
                PostProcessor::ExtractAudio { codec, quality } => {
                    args.push("-x".to_string());
                    args.push("--audio-format".to_string());
                    args.push(codec.clone());
                    args.push("--audio-quality".to_string());
                    args.push(quality.clone());
                }
                PostProcessor::EmbedMetadata => {
                    args.push("--embed-metadata".to_string());
                }
            }
        }

        args.push(url.to_string());
        args
    }
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DownloadEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn probe(&self, url: &str, request: &EngineRequest) -> Result<ProbeReport, EngineError> {
        let args = self.probe_args(url, request);
        let output = run_with_timeout(&self.binary, &args, self.probe_timeout_secs)
            .await
            .map_err(EngineError::new)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            eprintln!("[yt-dlp] Probe failed: {}", stderr.lines().next().unwrap_or("?"));
            return Err(EngineError::new(stderr));
        }

        parse_probe_json(&output.stdout)
    }

    async fn download(
        &self,
        url: &str,
        request: &EngineRequest,
        events: UnboundedSender<RawEvent>,
    ) -> Result<(), EngineError> {
        let args = self.download_args(url, request);
        eprintln!("[yt-dlp] Starting download of {}", url);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::new(format!("Failed to start yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::new("Failed to capture yt-dlp stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::new("Failed to capture yt-dlp stderr"))?;

        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut collected = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                collected.push(line);
            }
            collected.join("\n")
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(event) = parse_progress_line(&line) {
                let _ = events.send(event);
                continue;
            }

            if let Some(caps) = DEST_RE.captures(&line) {
                eprintln!("[yt-dlp] Destination: {}", caps.get(1).map_or("?", |m| m.as_str()));
            } else if MERGE_RE.is_match(&line) {
                eprintln!("[yt-dlp] Merging video and audio");
            } else if ALREADY_RE.is_match(&line) {
                // No progress events fire for an already-complete file
                let _ = events.send(RawEvent::with_status("finished"));
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::new(format!("yt-dlp process error: {}", e)))?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            eprintln!(
                "[yt-dlp] Exited with {}: {}",
                status,
                stderr_text.lines().next().unwrap_or("no stderr")
            );
            let message = if stderr_text.trim().is_empty() {
                format!("yt-dlp exited with {}", status)
            } else {
                stderr_text
            };
            Err(EngineError::new(message))
        }
    }
}

fn parse_probe_json(stdout: &[u8]) -> Result<ProbeReport, EngineError> {
    let text = String::from_utf8_lossy(stdout);

    // --dump-json emits one JSON object per entry for playlists; the first
    // carries everything the probe needs
    let first_line = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| EngineError::new("Engine produced no metadata"))?;

    let json: serde_json::Value = serde_json::from_str(first_line)
        .map_err(|e| EngineError::new(format!("Invalid metadata JSON: {}", e)))?;

    let streams = json
        .get("formats")
        .cloned()
        .and_then(|formats| serde_json::from_value::<Vec<StreamDescriptor>>(formats).ok())
        .unwrap_or_default();

    Ok(ProbeReport {
        title: json["title"].as_str().unwrap_or("Unknown").to_string(),
        uploader: json["uploader"].as_str().unwrap_or("Unknown").to_string(),
        duration_seconds: json["duration"].as_f64().unwrap_or(0.0) as u64,
        thumbnail: json["thumbnail"].as_str().unwrap_or("").to_string(),
        is_live: json["is_live"].as_bool().unwrap_or(false),
        age_limit: json["age_limit"].as_u64().unwrap_or(0) as u8,
        streams,
    })
}

/// Parse one machine-readable progress line into a raw event
fn parse_progress_line(line: &str) -> Option<RawEvent> {
    let rest = line.strip_prefix(PROGRESS_PREFIX)?;

    // The filename is last so embedded pipes in it survive
    let fields: Vec<&str> = rest.splitn(8, '|').collect();
    if fields.len() != 8 {
        return None;
    }

    Some(RawEvent {
        status: fields[0].trim().to_string(),
        downloaded_bytes: parse_u64_field(fields[1]),
        total_bytes: parse_u64_field(fields[2]),
        total_bytes_estimate: parse_u64_field(fields[3]),
        speed: parse_f64_field(fields[4]),
        eta: parse_f64_field(fields[5]),
        percent_str: non_na(fields[6]),
        filename: non_na(fields[7]),
    })
}

fn non_na(field: &str) -> Option<String> {
    let trimmed = field.trim();
    (!trimmed.is_empty() && trimmed != "NA").then(|| trimmed.to_string())
}

fn parse_f64_field(field: &str) -> Option<f64> {
    non_na(field)?.parse().ok()
}

fn parse_u64_field(field: &str) -> Option<u64> {
    parse_f64_field(field).map(|value| value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_line_full() {
        let line = "tubegrab-progress|downloading|1048576|4194304|NA|2048.5|12|  25.0%|clip.mp4";
        let event = parse_progress_line(line).unwrap();
        assert_eq!(event.status, "downloading");
        assert_eq!(event.downloaded_bytes, Some(1_048_576));
        assert_eq!(event.total_bytes, Some(4_194_304));
        assert_eq!(event.total_bytes_estimate, None);
        assert_eq!(event.speed, Some(2048.5));
        assert_eq!(event.eta, Some(12.0));
        assert_eq!(event.percent_str.as_deref(), Some("25.0%"));
        assert_eq!(event.filename.as_deref(), Some("clip.mp4"));
    }

    #[test]
    fn test_parse_progress_line_na_fields() {
        let line = "tubegrab-progress|downloading|512|NA|NA|NA|NA|NA|NA";
        let event = parse_progress_line(line).unwrap();
        assert_eq!(event.downloaded_bytes, Some(512));
        assert_eq!(event.total_bytes, None);
        assert_eq!(event.speed, None);
        assert_eq!(event.percent_str, None);
        assert_eq!(event.filename, None);
    }

    #[test]
    fn test_parse_progress_line_filename_with_pipe() {
        let line = "tubegrab-progress|finished|100|100|NA|NA|0|100%|odd|name.mp4";
        let event = parse_progress_line(line).unwrap();
        assert_eq!(event.filename.as_deref(), Some("odd|name.mp4"));
    }

    #[test]
    fn test_unrelated_lines_are_ignored() {
        assert!(parse_progress_line("[download] Destination: clip.mp4").is_none());
        assert!(parse_progress_line("[Merger] Merging formats into clip.mp4").is_none());
        assert!(parse_progress_line("").is_none());
    }

    #[test]
    fn test_probe_json_parsing() {
        let json = r#"{"title": "Test Clip", "uploader": "someone", "duration": 63.4,
            "thumbnail": "https://example.com/t.jpg", "is_live": false, "age_limit": 0,
            "formats": [
                {"format_id": "137", "ext": "mp4", "height": 1080, "vcodec": "avc1.64002a", "acodec": "none"},
                {"format_id": "140", "ext": "m4a", "acodec": "mp4a.40.2", "vcodec": "none", "abr": 129.5}
            ]}"#;
        let report = parse_probe_json(json.as_bytes()).unwrap();
        assert_eq!(report.title, "Test Clip");
        assert_eq!(report.duration_seconds, 63);
        assert_eq!(report.streams.len(), 2);
        assert!(report.streams[0].has_video());
        assert!(report.streams[1].has_audio());
    }

    #[test]
    fn test_probe_json_missing_fields_default() {
        let report = parse_probe_json(br#"{"id": "x"}"#).unwrap();
        assert_eq!(report.title, "Unknown");
        assert!(report.streams.is_empty());
    }

    #[test]
    fn test_probe_json_empty_output_is_an_error() {
        assert!(parse_probe_json(b"\n\n").is_err());
    }

    #[test]
    fn test_download_args_assembly() {
        let engine = YtDlpEngine::with_binary("yt-dlp");
        let request = EngineRequest::new()
            .with_format("bestvideo+bestaudio/best")
            .with_output_template("/tmp/%(title)s.%(ext)s")
            .with_merge_output_format(Some("mp4".to_string()))
            .with_postprocessor(PostProcessor::EmbedMetadata);

        let args = engine.download_args("https://youtu.be/abc", &request);
        let joined = args.join(" ");

        assert!(joined.contains("-f bestvideo+bestaudio/best"));
        assert!(joined.contains("-o /tmp/%(title)s.%(ext)s"));
        assert!(joined.contains("--no-playlist"));
        assert!(joined.contains("--merge-output-format mp4"));
        assert!(joined.contains("--embed-metadata"));
        assert!(joined.contains("--geo-bypass"));
        assert!(joined.contains("--no-check-certificates"));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc"));
    }

    #[test]
    fn test_playlist_args_pass_items_through_uninterpreted() {
        let engine = YtDlpEngine::with_binary("yt-dlp");
        let request = EngineRequest::new()
            .with_no_playlist(false)
            .with_playlist_items(Some("1-5,7,9-10".to_string()));

        let args = engine.download_args("https://youtube.com/playlist?list=PL1", &request);
        let joined = args.join(" ");
        assert!(joined.contains("--yes-playlist"));
        assert!(joined.contains("--playlist-items 1-5,7,9-10"));
    }

    #[test]
    fn test_audio_extraction_args() {
        let engine = YtDlpEngine::with_binary("yt-dlp");
        let request = EngineRequest::new().with_postprocessor(PostProcessor::ExtractAudio {
            codec: "mp3".to_string(),
            quality: "320".to_string(),
        });

        let joined = engine.download_args("https://youtu.be/abc", &request).join(" ");
        assert!(joined.contains("-x --audio-format mp3 --audio-quality 320"));
    }

    #[test]
    fn test_cookie_args() {
        let engine = YtDlpEngine::with_binary("yt-dlp");

        let file_request = EngineRequest::new()
            .with_cookies(Some(CookieSource::File(PathBuf::from("/tmp/cookies.txt"))));
        let joined = engine.probe_args("u", &file_request).join(" ");
        assert!(joined.contains("--cookies /tmp/cookies.txt"));

        let browser_request =
            EngineRequest::new().with_cookies(Some(CookieSource::Browser("chrome")));
        let joined = engine.probe_args("u", &browser_request).join(" ");
        assert!(joined.contains("--cookies-from-browser chrome"));
    }
}
