// Format selection rules
//
// Converts raw stream descriptors into UI-friendly options and turns a
// requested quality label into the fallback-ordered selection expression
// handed to the download engine. Every input resolves to *some* expression
// or option list; this module supports presentation, it does not validate.

use serde::{Deserialize, Serialize};

use super::models::StreamDescriptor;

/// Resolution ladder used for quality labels, highest first
pub const VIDEO_QUALITIES: [(&str, &str, u32); 9] = [
    ("4320p", "8K Ultra HD", 4320),
    ("2160p", "4K Ultra HD", 2160),
    ("1440p", "2K QHD", 1440),
    ("1080p", "Full HD", 1080),
    ("720p", "HD", 720),
    ("480p", "SD", 480),
    ("360p", "Low", 360),
    ("240p", "Very Low", 240),
    ("144p", "Minimum", 144),
];

/// Audio bitrate choices for shells that expose one
pub const AUDIO_QUALITIES: [(&str, &str); 5] = [
    ("320", "High (320 kbps)"),
    ("256", "Medium-High (256 kbps)"),
    ("192", "Medium (192 kbps)"),
    ("128", "Standard (128 kbps)"),
    ("96", "Low (96 kbps)"),
];

/// Fallback-ordered list of selector strings, most specific first.
///
/// Immutable once built; `render()` produces the single expression string
/// the engine understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionExpression {
    tiers: Vec<String>,
}

impl SelectionExpression {
    fn new(tiers: Vec<String>) -> Self {
        Self { tiers }
    }

    pub fn tiers(&self) -> &[String] {
        &self.tiers
    }

    pub fn render(&self) -> String {
        self.tiers.join("/")
    }
}

/// A single stream shaped for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatOption {
    pub format_id: String,
    pub extension: String,
    pub resolution: Option<String>,
    pub fps: Option<f32>,
    pub filesize: Option<u64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    /// Quality tier label ("1080p", ..., "Audio" for audio-only streams)
    pub quality: String,
    pub is_video: bool,
    pub is_audio: bool,
    pub description: String,
}

pub struct FormatSelector;

impl FormatSelector {
    /// Build the selection expression for a quality label.
    ///
    /// Height-bound tiers are tried with the https protocol filter first:
    /// SABR-restricted streams 403 on download, and the filter sidesteps
    /// them, but some content has no https streams at all, so every
    /// expression degrades to plain selectors and finally to "best".
    /// Unknown or malformed labels get the unconstrained expression (a
    /// policy choice, not an error). The container is not referenced here;
    /// it is applied at merge time.
    pub fn selection_for_quality(
        quality: &str,
        _container: &str,
        audio_only: bool,
    ) -> SelectionExpression {
        if audio_only {
            return Self::audio_selection();
        }

        if quality == "best" {
            return SelectionExpression::new(vec![
                "bestvideo[protocol=https]+bestaudio[protocol=https]".to_string(),
                "bestvideo+bestaudio".to_string(),
                "best".to_string(),
            ]);
        }

        match Self::parse_height(quality) {
            Some(height) => SelectionExpression::new(vec![
                format!("bestvideo[height<={height}][protocol=https]+bestaudio[protocol=https]"),
                format!("bestvideo[height<={height}]+bestaudio"),
                format!("best[height<={height}]"),
                "best".to_string(),
            ]),
            None => SelectionExpression::new(vec![
                "bestvideo+bestaudio".to_string(),
                "best".to_string(),
            ]),
        }
    }

    /// Audio chain: preferred container+codec over https, then relax codec,
    /// then protocol, then anything
    fn audio_selection() -> SelectionExpression {
        SelectionExpression::new(vec![
            "bestaudio[ext=m4a][protocol=https]".to_string(),
            "bestaudio[acodec^=mp4a][protocol=https]".to_string(),
            "bestaudio[protocol=https]".to_string(),
            "bestaudio".to_string(),
            "best".to_string(),
        ])
    }

    /// Loose expression for the one-shot retry after a 403
    pub fn fallback_selection(audio_only: bool) -> SelectionExpression {
        if audio_only {
            SelectionExpression::new(vec!["bestaudio".to_string(), "best".to_string()])
        } else {
            SelectionExpression::new(vec!["best".to_string()])
        }
    }

    fn parse_height(quality: &str) -> Option<u32> {
        let digits = quality.strip_suffix('p')?;
        match digits.parse::<u32>() {
            Ok(h) if h > 0 => Some(h),
            _ => None,
        }
    }

    /// Shape raw descriptors for display.
    ///
    /// A stream is video iff it declares a real video codec and audio iff it
    /// declares a real audio codec; muxed streams carry both flags.
    /// Descriptors with neither (storyboards and the like) are skipped.
    pub fn classify_streams(streams: &[StreamDescriptor]) -> Vec<FormatOption> {
        let mut options = Vec::new();

        for stream in streams {
            let is_video = stream.has_video();
            let is_audio = stream.has_audio();
            if !is_video && !is_audio {
                continue;
            }

            let resolution = match (stream.width, stream.height) {
                (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
                (None, Some(h)) => Some(format!("{}p", h)),
                _ => None,
            };

            let quality = match stream.height {
                Some(h) => Self::quality_label(h).to_string(),
                None => "Audio".to_string(),
            };

            options.push(FormatOption {
                format_id: stream.format_id.clone(),
                extension: stream.ext.clone(),
                resolution,
                fps: stream.fps,
                filesize: stream.effective_size(),
                vcodec: if is_video { stream.vcodec.clone() } else { None },
                acodec: if is_audio { stream.acodec.clone() } else { None },
                quality,
                is_video,
                is_audio,
                description: Self::build_description(stream),
            });
        }

        options
    }

    pub fn video_formats(streams: &[StreamDescriptor]) -> Vec<FormatOption> {
        Self::classify_streams(streams)
            .into_iter()
            .filter(|f| f.is_video)
            .collect()
    }

    pub fn audio_formats(streams: &[StreamDescriptor]) -> Vec<FormatOption> {
        Self::classify_streams(streams)
            .into_iter()
            .filter(|f| f.is_audio && !f.is_video)
            .collect()
    }

    /// Quality tiers satisfiable for the given streams, best first.
    ///
    /// A tier is offered when a stream matches it exactly or any stream
    /// sits above it: the height-bound selection expression satisfies a
    /// lower tier by picking the best stream under the bound.
    pub fn available_qualities(streams: &[StreamDescriptor]) -> Vec<(String, String)> {
        let heights: Vec<u32> = streams.iter().filter_map(|s| s.height).collect();

        let mut qualities = vec![("best".to_string(), "Best Available".to_string())];

        for (code, name, height) in VIDEO_QUALITIES {
            if heights.iter().any(|&h| h >= height) {
                qualities.push((code.to_string(), format!("{} ({})", name, code)));
            }
        }

        qualities
    }

    /// Pick a concrete format id at or under a target quality, preferring
    /// the requested container at equal heights. "best" defers to the
    /// engine entirely.
    pub fn best_format_id_for_quality(
        streams: &[StreamDescriptor],
        target_quality: &str,
        prefer_ext: &str,
    ) -> Option<String> {
        if target_quality == "best" {
            return None;
        }
        let target_height = Self::parse_height(target_quality)?;

        let mut candidates: Vec<&StreamDescriptor> = streams
            .iter()
            .filter(|s| s.has_video() && s.height.map_or(false, |h| h <= target_height))
            .collect();

        candidates.sort_by_key(|s| {
            (
                std::cmp::Reverse(s.height.unwrap_or(0)),
                std::cmp::Reverse((s.ext == prefer_ext) as u8),
            )
        });

        candidates.first().map(|s| s.format_id.clone())
    }

    /// Label for a pixel height: the first tier it meets or exceeds
    pub fn quality_label(height: u32) -> &'static str {
        for (code, _, h) in VIDEO_QUALITIES {
            if height >= h {
                return code;
            }
        }
        "Low"
    }

    fn build_description(stream: &StreamDescriptor) -> String {
        let mut parts = Vec::new();

        if let Some(h) = stream.height {
            parts.push(format!("{}p", h));
        }

        if let Some(fps) = stream.fps {
            if fps > 30.0 {
                parts.push(format!("{:.0}fps", fps));
            }
        }

        if stream.has_video() {
            if stream.is_h264() {
                parts.push("H.264".to_string());
            } else if stream.is_h265() {
                parts.push("H.265".to_string());
            } else if stream.is_vp9() {
                parts.push("VP9".to_string());
            } else if stream.is_av1() {
                parts.push("AV1".to_string());
            } else if let Some(vcodec) = stream.vcodec.as_deref() {
                // Unrecognized family: show the tag without its profile suffix
                parts.push(vcodec.split('.').next().unwrap_or(vcodec).to_string());
            }
        } else if stream.has_audio() {
            if let Some(abr) = stream.abr {
                parts.push(format!("{:.0}kbps", abr));
            }
        }

        if let Some(size) = stream.effective_size() {
            parts.push(Self::format_size(Some(size)));
        }

        if !stream.ext.is_empty() {
            parts.push(format!(".{}", stream.ext));
        }

        if parts.is_empty() {
            "Unknown".to_string()
        } else {
            parts.join(" | ")
        }
    }

    /// Human-readable file size, "Unknown" when absent
    pub fn format_size(bytes: Option<u64>) -> String {
        let Some(bytes) = bytes else {
            return "Unknown".to_string();
        };

        let mut size = bytes as f64;
        for unit in ["B", "KB", "MB", "GB"] {
            if size < 1024.0 {
                return format!("{:.1} {}", size, unit);
            }
            size /= 1024.0;
        }
        format!("{:.1} TB", size)
    }

    /// Container choices for the output dropdown
    pub fn output_formats(audio_only: bool) -> Vec<(&'static str, &'static str)> {
        if audio_only {
            vec![
                ("mp3", "MP3 Audio"),
                ("m4a", "M4A Audio (AAC)"),
                ("aac", "AAC Audio"),
                ("wav", "WAV Audio (Lossless)"),
                ("flac", "FLAC Audio (Lossless)"),
                ("opus", "Opus Audio"),
            ]
        } else {
            vec![
                ("mp4", "MP4 Video"),
                ("mkv", "MKV Video"),
                ("webm", "WebM Video"),
                ("avi", "AVI Video"),
                ("mov", "MOV Video"),
            ]
        }
    }

    /// Full quality dropdown, independent of any probe
    pub fn quality_options() -> Vec<(&'static str, &'static str)> {
        vec![
            ("best", "Best Available"),
            ("2160p", "4K Ultra HD (2160p)"),
            ("1440p", "2K QHD (1440p)"),
            ("1080p", "Full HD (1080p)"),
            ("720p", "HD (720p)"),
            ("480p", "SD (480p)"),
            ("360p", "Low (360p)"),
            ("240p", "Very Low (240p)"),
            ("144p", "Minimum (144p)"),
        ]
    }
}
