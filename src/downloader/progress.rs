// Progress normalization
//
// Reshapes the engine's raw callback payloads into uniform, rate-limited
// records for display. The normalizer never fails: unrecognized payloads
// are dropped, malformed numbers default to zero.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Display states for an operation or queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Processing,
    Finished,
    Error,
    Cancelled,
}

/// Raw progress payload as the engine reports it.
///
/// Field availability varies by engine and event; everything but the status
/// tag is optional.
#[derive(Debug, Clone, Default)]
pub struct RawEvent {
    pub status: String,
    pub filename: Option<String>,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<u64>,
    /// Bytes per second
    pub speed: Option<f64>,
    /// Seconds remaining
    pub eta: Option<f64>,
    /// The engine's own percent text, e.g. " 12.5%"
    pub percent_str: Option<String>,
}

impl RawEvent {
    pub fn with_status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            ..Default::default()
        }
    }

    /// Exact total when known, the engine's estimate otherwise
    pub fn total(&self) -> Option<u64> {
        self.total_bytes.or(self.total_bytes_estimate)
    }
}

/// One normalized progress update; owned by the consumer, never mutated
/// after emission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub status: DownloadStatus,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    /// Bytes per second
    pub speed: Option<f64>,
    /// Seconds remaining
    pub eta: Option<u64>,
    /// Clamped to 0..=100
    pub percent: f32,
    pub filename: String,
    pub elapsed: f64,
}

impl ProgressRecord {
    pub fn speed_str(&self) -> String {
        match self.speed {
            Some(speed) => format_speed(speed),
            None => "-- KB/s".to_string(),
        }
    }

    pub fn eta_str(&self) -> String {
        match self.eta {
            Some(eta) => format_time(eta),
            None => "--:--".to_string(),
        }
    }

    pub fn size_str(&self) -> String {
        let downloaded = format_size(self.downloaded_bytes);
        match self.total_bytes {
            Some(total) if total > 0 => format!("{} / {}", downloaded, format_size(total)),
            _ => downloaded,
        }
    }
}

pub fn format_speed(speed: f64) -> String {
    if speed < 1024.0 {
        format!("{:.0} B/s", speed)
    } else if speed < 1024.0 * 1024.0 {
        format!("{:.1} KB/s", speed / 1024.0)
    } else {
        format!("{:.2} MB/s", speed / (1024.0 * 1024.0))
    }
}

/// MM:SS under an hour, HH:MM:SS above
pub fn format_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

pub fn format_size(size_bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let size = size_bytes as f64;
    if size < KB {
        format!("{} B", size_bytes)
    } else if size < KB * KB {
        format!("{:.1} KB", size / KB)
    } else if size < KB * KB * KB {
        format!("{:.1} MB", size / (KB * KB))
    } else {
        format!("{:.2} GB", size / (KB * KB * KB))
    }
}

/// Turns raw engine events into `ProgressRecord`s.
///
/// Downloading events are throttled to one emission per 100ms; a finished
/// event clears the elapsed clock so multi-file operations (separate video
/// and audio legs) each time from zero. Call `reset()` before reusing a
/// normalizer for an unrelated operation.
pub struct ProgressNormalizer {
    started_at: Option<Instant>,
    current_file: String,
    last_emit: Option<Instant>,
    min_interval: Duration,
}

impl Default for ProgressNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressNormalizer {
    pub fn new() -> Self {
        Self {
            started_at: None,
            current_file: String::new(),
            last_emit: None,
            min_interval: Duration::from_millis(100),
        }
    }

    pub fn handle(&mut self, event: &RawEvent) -> Option<ProgressRecord> {
        match event.status.as_str() {
            "downloading" => self.handle_downloading(event),
            "finished" => Some(self.handle_finished(event)),
            "error" => Some(self.handle_error()),
            _ => None,
        }
    }

    fn handle_downloading(&mut self, event: &RawEvent) -> Option<ProgressRecord> {
        let now = Instant::now();

        // Drop intermediate updates; the consumer only needs ~10 per second
        if let Some(last) = self.last_emit {
            if now.duration_since(last) < self.min_interval {
                return None;
            }
        }
        self.last_emit = Some(now);

        let started_at = *self.started_at.get_or_insert(now);

        if let Some(name) = event.filename.as_deref() {
            if !name.is_empty() {
                self.current_file = name.to_string();
            }
        }

        let downloaded = event.downloaded_bytes.unwrap_or(0);
        let total = event.total();

        let percent = match total {
            Some(total) if total > 0 => (downloaded as f64 / total as f64 * 100.0) as f32,
            _ => event
                .percent_str
                .as_deref()
                .and_then(parse_percent)
                .unwrap_or(0.0),
        };

        Some(ProgressRecord {
            status: DownloadStatus::Downloading,
            downloaded_bytes: downloaded,
            total_bytes: total,
            speed: event.speed,
            eta: event.eta.map(|eta| eta as u64),
            percent: percent.clamp(0.0, 100.0),
            filename: self.current_file.clone(),
            elapsed: now.duration_since(started_at).as_secs_f64(),
        })
    }

    fn handle_finished(&mut self, event: &RawEvent) -> ProgressRecord {
        let total = event.total_bytes.unwrap_or(0);
        let filename = event
            .filename
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.current_file.clone());
        let elapsed = self
            .started_at
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or(0.0);

        // The next downloading sequence (e.g. the audio leg of a merge)
        // times and throttles from scratch
        self.started_at = None;
        self.last_emit = None;

        ProgressRecord {
            status: DownloadStatus::Finished,
            downloaded_bytes: total,
            total_bytes: Some(total),
            speed: None,
            eta: Some(0),
            percent: 100.0,
            filename,
            elapsed,
        }
    }

    fn handle_error(&mut self) -> ProgressRecord {
        ProgressRecord {
            status: DownloadStatus::Error,
            downloaded_bytes: 0,
            total_bytes: None,
            speed: None,
            eta: None,
            percent: 0.0,
            filename: self.current_file.clone(),
            elapsed: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.started_at = None;
        self.current_file.clear();
        self.last_emit = None;
    }
}

fn parse_percent(text: &str) -> Option<f32> {
    text.trim().trim_end_matches('%').trim().parse::<f32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloading_event(downloaded: u64, total: Option<u64>) -> RawEvent {
        RawEvent {
            status: "downloading".to_string(),
            filename: Some("video.mp4".to_string()),
            downloaded_bytes: Some(downloaded),
            total_bytes: total,
            speed: Some(1024.0),
            eta: Some(12.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_downloading_event_emits() {
        let mut normalizer = ProgressNormalizer::new();
        let record = normalizer.handle(&downloading_event(50, Some(200))).unwrap();
        assert_eq!(record.status, DownloadStatus::Downloading);
        assert_eq!(record.percent, 25.0);
        assert_eq!(record.filename, "video.mp4");
    }

    #[test]
    fn test_rapid_events_are_rate_limited() {
        let mut normalizer = ProgressNormalizer::new();
        let first = normalizer.handle(&downloading_event(10, Some(100)));
        let second = normalizer.handle(&downloading_event(20, Some(100)));
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn test_percent_clamped_when_downloaded_exceeds_total() {
        let mut normalizer = ProgressNormalizer::new();
        let record = normalizer.handle(&downloading_event(150, Some(100))).unwrap();
        assert_eq!(record.percent, 100.0);
    }

    #[test]
    fn test_percent_parsed_from_engine_text_when_total_unknown() {
        let mut normalizer = ProgressNormalizer::new();
        let mut event = downloading_event(0, None);
        event.percent_str = Some(" 42.5%".to_string());
        let record = normalizer.handle(&event).unwrap();
        assert_eq!(record.percent, 42.5);
    }

    #[test]
    fn test_unparseable_percent_text_defaults_to_zero() {
        let mut normalizer = ProgressNormalizer::new();
        let mut event = downloading_event(0, None);
        event.percent_str = Some("N/A".to_string());
        let record = normalizer.handle(&event).unwrap();
        assert_eq!(record.percent, 0.0);
    }

    #[test]
    fn test_estimate_used_when_exact_total_missing() {
        let mut normalizer = ProgressNormalizer::new();
        let mut event = downloading_event(50, None);
        event.total_bytes_estimate = Some(200);
        let record = normalizer.handle(&event).unwrap();
        assert_eq!(record.total_bytes, Some(200));
        assert_eq!(record.percent, 25.0);
    }

    #[test]
    fn test_finished_forces_terminal_record() {
        let mut normalizer = ProgressNormalizer::new();
        normalizer.handle(&downloading_event(10, Some(100)));

        let mut finished = RawEvent::with_status("finished");
        finished.total_bytes = Some(100);
        let record = normalizer.handle(&finished).unwrap();

        assert_eq!(record.status, DownloadStatus::Finished);
        assert_eq!(record.percent, 100.0);
        assert_eq!(record.downloaded_bytes, 100);
        assert_eq!(record.total_bytes, Some(100));
        assert_eq!(record.eta, Some(0));
        assert!(record.speed.is_none());
    }

    #[test]
    fn test_finished_without_prior_downloading_reports_zero_elapsed() {
        let mut normalizer = ProgressNormalizer::new();
        let record = normalizer.handle(&RawEvent::with_status("finished")).unwrap();
        assert_eq!(record.elapsed, 0.0);
        assert_eq!(record.downloaded_bytes, 0);
    }

    #[test]
    fn test_finished_resets_elapsed_clock_for_next_file() {
        let mut normalizer = ProgressNormalizer::new();
        normalizer.handle(&downloading_event(10, Some(100)));
        std::thread::sleep(Duration::from_millis(150));
        normalizer.handle(&RawEvent::with_status("finished"));

        let record = normalizer.handle(&downloading_event(1, Some(100))).unwrap();
        assert!(record.elapsed < 0.1, "elapsed carried over: {}", record.elapsed);
    }

    #[test]
    fn test_error_event_keeps_current_file() {
        let mut normalizer = ProgressNormalizer::new();
        normalizer.handle(&downloading_event(10, Some(100)));

        let record = normalizer.handle(&RawEvent::with_status("error")).unwrap();
        assert_eq!(record.status, DownloadStatus::Error);
        assert_eq!(record.downloaded_bytes, 0);
        assert_eq!(record.percent, 0.0);
        assert_eq!(record.filename, "video.mp4");
    }

    #[test]
    fn test_unrecognized_status_is_noop() {
        let mut normalizer = ProgressNormalizer::new();
        assert!(normalizer.handle(&RawEvent::with_status("postprocessing")).is_none());
        assert!(normalizer.handle(&RawEvent::with_status("")).is_none());
    }

    #[test]
    fn test_reset_clears_current_file() {
        let mut normalizer = ProgressNormalizer::new();
        normalizer.handle(&downloading_event(10, Some(100)));
        normalizer.reset();

        let record = normalizer.handle(&RawEvent::with_status("error")).unwrap();
        assert_eq!(record.filename, "");
    }

    #[test]
    fn test_speed_formatting() {
        assert_eq!(format_speed(512.0), "512 B/s");
        assert_eq!(format_speed(1536.0), "1.5 KB/s");
        assert_eq!(format_speed(2.5 * 1024.0 * 1024.0), "2.50 MB/s");
    }

    #[test]
    fn test_time_formatting() {
        assert_eq!(format_time(59), "00:59");
        assert_eq!(format_time(61), "01:01");
        assert_eq!(format_time(3700), "01:01:40");
    }

    #[test]
    fn test_size_str_with_and_without_total() {
        let record = ProgressRecord {
            status: DownloadStatus::Downloading,
            downloaded_bytes: 1536,
            total_bytes: Some(3 * 1024 * 1024),
            speed: None,
            eta: None,
            percent: 0.0,
            filename: String::new(),
            elapsed: 0.0,
        };
        assert_eq!(record.size_str(), "1.5 KB / 3.0 MB");
        assert_eq!(record.speed_str(), "-- KB/s");
        assert_eq!(record.eta_str(), "--:--");

        let no_total = ProgressRecord {
            total_bytes: None,
            ..record
        };
        assert_eq!(no_total.size_str(), "1.5 KB");
    }
}
