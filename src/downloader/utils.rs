// Shared helpers for subprocess and HTTP plumbing

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Run a program to completion with captured output, killing it if the
/// timeout elapses first.
pub async fn run_with_timeout(
    program: &Path,
    args: &[String],
    timeout_secs: u64,
) -> Result<Output, String> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match timeout(Duration::from_secs(timeout_secs), command.output()).await {
        Ok(result) => result.map_err(|e| format!("Failed to start {}: {}", program.display(), e)),
        Err(_) => Err(format!("{} timed out after {}s", program.display(), timeout_secs)),
    }
}

/// Fetch a probe thumbnail for display
pub async fn fetch_thumbnail(url: &str) -> Result<Vec<u8>, String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("Thumbnail request failed: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("Thumbnail request returned {}", response.status()));
    }

    response
        .bytes()
        .await
        .map(|body| body.to_vec())
        .map_err(|e| format!("Failed to read thumbnail body: {}", e))
}
