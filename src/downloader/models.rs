// Common data models for the download core

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What kind of media an operation should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadType {
    Video,
    Audio,
}

/// Content kind detected from the URL shape alone.
///
/// The engine's own metadata can disagree with the URL (a shortened link to
/// a playlist, for example); the URL shape is what drives output templating,
/// so it wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoType {
    Video,
    Short,
    Playlist,
    Unknown,
}

impl VideoType {
    /// Classify a URL by its shape
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_lowercase();

        if lower.contains("/shorts/") {
            VideoType::Short
        } else if lower.contains("list=") {
            VideoType::Playlist
        } else if lower.contains("youtube.com/watch") || lower.contains("youtu.be/") {
            VideoType::Video
        } else {
            VideoType::Unknown
        }
    }
}

/// One deliverable stream as advertised by the source.
///
/// Deserialized straight out of the engine's `formats` JSON array; every
/// field the engine may omit is optional. Codec tags keep the engine's
/// literal `"none"` sentinel; use `has_video()`/`has_audio()` instead of
/// testing the raw strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamDescriptor {
    pub format_id: String,
    pub ext: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f32>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    /// Average audio bitrate in kbps
    pub abr: Option<f32>,
}

impl StreamDescriptor {
    /// Exact size when known, the engine's estimate otherwise
    pub fn effective_size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }

    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref().map_or(false, |v| v != "none" && !v.is_empty())
    }

    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref().map_or(false, |a| a != "none" && !a.is_empty())
    }

    /// Check if the video track is H.264 (avc1)
    pub fn is_h264(&self) -> bool {
        self.vcodec.as_deref().map_or(false, |v| v.starts_with("avc"))
    }

    /// Check if the video track is H.265 (hevc)
    pub fn is_h265(&self) -> bool {
        self.vcodec
            .as_deref()
            .map_or(false, |v| v.starts_with("hev") || v.starts_with("hvc"))
    }

    pub fn is_vp9(&self) -> bool {
        self.vcodec
            .as_deref()
            .map_or(false, |v| v.starts_with("vp9") || v.starts_with("vp09"))
    }

    pub fn is_av1(&self) -> bool {
        self.vcodec.as_deref().map_or(false, |v| v.starts_with("av01"))
    }
}

/// Video information extracted without downloading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub url: String,
    pub title: String,
    pub duration_seconds: u64,
    pub thumbnail: String,
    pub uploader: String,
    pub video_type: VideoType,
    pub streams: Vec<StreamDescriptor>,
    pub is_live: bool,
    pub age_limit: u8,
}

/// Per-operation options chosen by the user
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub download_type: DownloadType,
    /// Quality label: "best" or "<height>p"
    pub quality: String,
    /// Output container (mp4, mkv, ... or mp3, m4a, ... for audio)
    pub container: String,
    pub audio_only: bool,
}

impl DownloadRequest {
    /// True when the operation should produce an audio file
    pub fn wants_audio(&self) -> bool {
        self.audio_only || self.download_type == DownloadType::Audio
    }
}

impl Default for DownloadRequest {
    fn default() -> Self {
        Self {
            download_type: DownloadType::Video,
            quality: "best".to_string(),
            container: "mp4".to_string(),
            audio_only: false,
        }
    }
}

/// Terminal outcome of an operation that did not fail.
///
/// Cancellation is a normal outcome, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Completed,
    Cancelled,
}

impl DownloadOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            DownloadOutcome::Completed => "Download completed successfully.",
            DownloadOutcome::Cancelled => "Download cancelled.",
        }
    }
}

/// Default directory for saved files
pub fn default_output_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_type_from_watch_url() {
        assert_eq!(
            VideoType::from_url("https://www.youtube.com/watch?v=abc123"),
            VideoType::Video
        );
        assert_eq!(VideoType::from_url("https://youtu.be/abc123"), VideoType::Video);
    }

    #[test]
    fn test_video_type_from_shorts_url() {
        assert_eq!(
            VideoType::from_url("https://www.youtube.com/shorts/xyz"),
            VideoType::Short
        );
    }

    #[test]
    fn test_video_type_playlist() {
        assert_eq!(
            VideoType::from_url("https://www.youtube.com/playlist?list=PL123"),
            VideoType::Playlist
        );
    }

    #[test]
    fn test_video_type_watch_with_list_param_is_playlist() {
        // A watch URL carrying a list id is templated as a playlist
        assert_eq!(
            VideoType::from_url("https://www.youtube.com/watch?v=abc&list=PL123"),
            VideoType::Playlist
        );
    }

    #[test]
    fn test_video_type_unknown() {
        assert_eq!(VideoType::from_url("https://example.com/video/1"), VideoType::Unknown);
    }

    #[test]
    fn test_stream_codec_flags() {
        let s = StreamDescriptor {
            vcodec: Some("avc1.4d401f".to_string()),
            acodec: Some("none".to_string()),
            ..Default::default()
        };
        assert!(s.has_video());
        assert!(!s.has_audio());
        assert!(s.is_h264());
    }

    #[test]
    fn test_effective_size_prefers_exact() {
        let s = StreamDescriptor {
            filesize: Some(100),
            filesize_approx: Some(900),
            ..Default::default()
        };
        assert_eq!(s.effective_size(), Some(100));

        let approx_only = StreamDescriptor {
            filesize_approx: Some(900),
            ..Default::default()
        };
        assert_eq!(approx_only.effective_size(), Some(900));
    }

    #[test]
    fn test_stream_descriptor_tolerates_sparse_json() {
        let s: StreamDescriptor =
            serde_json::from_str(r#"{"format_id": "140", "ext": "m4a", "acodec": "mp4a.40.2"}"#)
                .unwrap();
        assert!(s.has_audio());
        assert!(!s.has_video());
        assert_eq!(s.height, None);
    }
}
