// Cookie sourcing for restricted content
//
// Either a user-supplied cookies.txt or a detected local browser profile;
// the file wins when both are configured.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Where the engine should read cookies from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieSource {
    /// Netscape-format cookies.txt
    File(PathBuf),
    /// Browser profile name the engine understands ("chrome", "edge")
    Browser(&'static str),
}

/// Resolve the cookie source for an operation.
///
/// A configured cookies file must exist on disk to be used; a missing file
/// falls through to browser detection rather than failing the operation.
pub fn resolve_cookies(cookies_file: Option<&Path>, use_browser: bool) -> Option<CookieSource> {
    if let Some(path) = cookies_file {
        if path.exists() {
            return Some(CookieSource::File(path.to_path_buf()));
        }
        eprintln!("[Cookies] Configured cookies file missing: {}", path.display());
    }

    if use_browser {
        if let Some(browser) = detect_browser() {
            eprintln!("[Cookies] Using cookies from {}", browser);
            return Some(CookieSource::Browser(browser));
        }
    }

    None
}

/// First installed browser the engine can read cookies from, Chrome before
/// Edge; fixed candidate install paths per OS, then a PATH lookup.
pub fn detect_browser() -> Option<&'static str> {
    for (browser, paths) in browser_candidates() {
        for path in paths {
            if path.exists() {
                return Some(browser);
            }
        }
    }

    if on_path("google-chrome") || on_path("chrome") {
        return Some("chrome");
    }
    if on_path("msedge") || on_path("microsoft-edge") {
        return Some("edge");
    }

    None
}

fn browser_candidates() -> Vec<(&'static str, Vec<PathBuf>)> {
    if cfg!(target_os = "windows") {
        let program_files =
            std::env::var("PROGRAMFILES").unwrap_or_else(|_| r"C:\Program Files".to_string());
        let program_files_x86 = std::env::var("PROGRAMFILES(X86)")
            .unwrap_or_else(|_| r"C:\Program Files (x86)".to_string());
        let local_app_data = std::env::var("LOCALAPPDATA").unwrap_or_default();

        vec![
            (
                "chrome",
                vec![
                    PathBuf::from(&local_app_data).join(r"Google\Chrome\Application\chrome.exe"),
                    PathBuf::from(&program_files).join(r"Google\Chrome\Application\chrome.exe"),
                    PathBuf::from(&program_files_x86).join(r"Google\Chrome\Application\chrome.exe"),
                ],
            ),
            (
                "edge",
                vec![
                    PathBuf::from(&program_files).join(r"Microsoft\Edge\Application\msedge.exe"),
                    PathBuf::from(&program_files_x86).join(r"Microsoft\Edge\Application\msedge.exe"),
                ],
            ),
        ]
    } else if cfg!(target_os = "macos") {
        vec![
            (
                "chrome",
                vec![PathBuf::from(
                    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                )],
            ),
            (
                "edge",
                vec![PathBuf::from(
                    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
                )],
            ),
        ]
    } else {
        vec![
            (
                "chrome",
                ["/usr/bin/google-chrome", "/usr/bin/google-chrome-stable", "/usr/bin/chromium"]
                    .iter()
                    .map(PathBuf::from)
                    .collect(),
            ),
            ("edge", vec![PathBuf::from("/usr/bin/microsoft-edge")]),
        ]
    }
}

fn on_path(binary: &str) -> bool {
    let lookup = if cfg!(target_os = "windows") { "where" } else { "which" };
    Command::new(lookup)
        .arg(binary)
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}
