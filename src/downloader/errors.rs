// Error taxonomy for download operations
//
// The orchestrator is the only component that classifies failures; format
// rules and progress normalization never fail. Each classified kind maps to
// one user-facing sentence; only unclassified failures keep the raw engine
// message.

use std::fmt;

/// Why access to the content was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenKind {
    Private,
    AgeRestricted,
    GeoBlocked,
    /// 403 persisted through the loose-format retry
    AccessDenied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    /// Content removed or deleted by the source
    Removed,
    /// The URL did not resolve to any content
    Unresolvable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadError {
    NotFound(NotFoundKind),
    Forbidden(ForbiddenKind),
    /// Unclassified failure; the raw engine message is preserved for display
    Failed(String),
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(NotFoundKind::Removed) => {
                write!(f, "This video has been removed or deleted.")
            }
            Self::NotFound(NotFoundKind::Unresolvable) => {
                write!(f, "No downloadable video was found at this URL.")
            }
            Self::Forbidden(ForbiddenKind::Private) => {
                write!(f, "This video is private and cannot be downloaded.")
            }
            Self::Forbidden(ForbiddenKind::AgeRestricted) => {
                write!(f, "This video is age-restricted. Please try logging in.")
            }
            Self::Forbidden(ForbiddenKind::GeoBlocked) => {
                write!(f, "This video is not available in your region.")
            }
            Self::Forbidden(ForbiddenKind::AccessDenied) => {
                write!(f, "Access was denied by the server (HTTP 403).")
            }
            Self::Failed(message) => write!(f, "Download failed: {}", message),
        }
    }
}

impl std::error::Error for DownloadError {}

/// True when the engine text carries the 403 signature that warrants the
/// orchestrator's one-shot loose-format retry
pub fn is_http_forbidden(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("403") && lower.contains("forbidden")
}

/// Classify engine error text into a terminal error.
///
/// Checked in priority order against the lowered message. The 403 signature
/// is handled by the orchestrator's retry before this runs.
pub fn classify_engine_error(message: &str) -> DownloadError {
    let lower = message.to_lowercase();

    if lower.contains("private video") {
        return DownloadError::Forbidden(ForbiddenKind::Private);
    }

    if lower.contains("age") && lower.contains("restricted") {
        return DownloadError::Forbidden(ForbiddenKind::AgeRestricted);
    }

    if lower.contains("not available") || lower.contains("geo") {
        return DownloadError::Forbidden(ForbiddenKind::GeoBlocked);
    }

    if lower.contains("removed") || lower.contains("deleted") {
        return DownloadError::NotFound(NotFoundKind::Removed);
    }

    DownloadError::Failed(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_video_detection() {
        let error = classify_engine_error("ERROR: Private video. Sign in if you've been granted access");
        assert_eq!(error, DownloadError::Forbidden(ForbiddenKind::Private));
    }

    #[test]
    fn test_age_restricted_detection() {
        let error = classify_engine_error("ERROR: This video is age-restricted");
        assert_eq!(error, DownloadError::Forbidden(ForbiddenKind::AgeRestricted));
    }

    #[test]
    fn test_geo_blocked_detection() {
        let error = classify_engine_error("The uploader has not made this video available in your country");
        assert_eq!(error, DownloadError::Forbidden(ForbiddenKind::GeoBlocked));
        let error = classify_engine_error("Geo restriction applies");
        assert_eq!(error, DownloadError::Forbidden(ForbiddenKind::GeoBlocked));
    }

    #[test]
    fn test_removed_detection() {
        let error = classify_engine_error("This video has been removed by the uploader");
        assert_eq!(error, DownloadError::NotFound(NotFoundKind::Removed));
        let error = classify_engine_error("Video deleted");
        assert_eq!(error, DownloadError::NotFound(NotFoundKind::Removed));
    }

    #[test]
    fn test_classification_priority() {
        // "private video" wins over later patterns in the same message
        let error = classify_engine_error("Private video has been removed");
        assert_eq!(error, DownloadError::Forbidden(ForbiddenKind::Private));
    }

    #[test]
    fn test_unknown_preserves_raw_message() {
        let error = classify_engine_error("ERROR: something exotic happened");
        match &error {
            DownloadError::Failed(raw) => assert!(raw.contains("something exotic")),
            other => panic!("unexpected classification: {:?}", other),
        }
        assert!(error.to_string().contains("something exotic"));
    }

    #[test]
    fn test_http_forbidden_signature() {
        assert!(is_http_forbidden("ERROR: HTTP Error 403: Forbidden"));
        assert!(is_http_forbidden("http error 403: forbidden (fragment 3)"));
        assert!(!is_http_forbidden("HTTP Error 404: Not Found"));
        assert!(!is_http_forbidden("403 without the magic word"));
    }

    #[test]
    fn test_display_is_single_sentence() {
        let text = DownloadError::Forbidden(ForbiddenKind::GeoBlocked).to_string();
        assert_eq!(text, "This video is not available in your region.");
    }
}
