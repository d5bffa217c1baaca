// External binary discovery: the download engine (yt-dlp) and the
// transcoder (ffmpeg) are both shipped separately from the app

use std::path::{Path, PathBuf};
use std::process::Command;

/// Locate ffmpeg for the engine's `ffmpeg_location` option.
///
/// Search order: an explicitly configured path, a bundled `ffmpeg` folder
/// next to the running executable, PATH, then well-known install paths.
/// `None` means the engine falls back to whatever `ffmpeg` resolves to at
/// its own spawn time.
pub fn locate_ffmpeg(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }

    if let Some(bundled) = bundled_ffmpeg_dir() {
        return Some(bundled);
    }

    if let Some(path) = path_lookup("ffmpeg") {
        return Some(PathBuf::from(path));
    }

    ffmpeg_install_candidates().into_iter().find(|candidate| candidate.exists())
}

/// Bundled `ffmpeg/` folder next to the executable, if it actually holds a
/// binary
fn bundled_ffmpeg_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?.join("ffmpeg");
    let binary = dir.join(if cfg!(target_os = "windows") { "ffmpeg.exe" } else { "ffmpeg" });
    binary.exists().then_some(dir)
}

fn ffmpeg_install_candidates() -> Vec<PathBuf> {
    if cfg!(target_os = "windows") {
        [
            r"C:\ProgramData\chocolatey\bin\ffmpeg.exe",
            r"C:\ffmpeg\bin\ffmpeg.exe",
            r"C:\Program Files\ffmpeg\bin\ffmpeg.exe",
            r"C:\Program Files (x86)\ffmpeg\bin\ffmpeg.exe",
        ]
        .iter()
        .map(PathBuf::from)
        .collect()
    } else if cfg!(target_os = "macos") {
        ["/opt/homebrew/bin/ffmpeg", "/usr/local/bin/ffmpeg", "/usr/bin/ffmpeg"]
            .iter()
            .map(PathBuf::from)
            .collect()
    } else {
        ["/usr/bin/ffmpeg", "/usr/local/bin/ffmpeg"].iter().map(PathBuf::from).collect()
    }
}

/// Find the yt-dlp binary: common install paths first, then PATH, falling
/// back to the bare name and hoping the spawn resolves it
pub fn find_ytdlp() -> PathBuf {
    let common_paths: &[&str] = if cfg!(target_os = "windows") {
        &[r"C:\Program Files\yt-dlp\yt-dlp.exe"]
    } else {
        &["/opt/homebrew/bin/yt-dlp", "/usr/local/bin/yt-dlp", "/usr/bin/yt-dlp"]
    };

    for path in common_paths {
        if Path::new(path).exists() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = path_lookup("yt-dlp") {
        return PathBuf::from(path);
    }

    PathBuf::from(if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" })
}

/// Query a tool's version banner, e.g. for an about dialog
pub fn tool_version(path: &Path) -> Option<String> {
    match Command::new(path).arg("--version").output() {
        Ok(output) if output.status.success() => {
            let banner = String::from_utf8_lossy(&output.stdout).trim().to_string();
            (!banner.is_empty()).then_some(banner)
        }
        _ => None,
    }
}

fn path_lookup(binary: &str) -> Option<String> {
    let lookup = if cfg!(target_os = "windows") { "where" } else { "which" };
    let output = Command::new(lookup).arg(binary).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout);
    let first = path.lines().next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}
