//! Input loading for the command line: a local path or an HTTP(S) URL
//! becomes a [`RawUpload`], the same shape the HTTP server builds from a
//! multipart field.
//!
//! No format checks happen here; the sniffer decides what the bytes are.

use crate::error::PipelineError;
use crate::output::RawUpload;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load `input` fully into memory.
pub async fn load_upload(input: &str, timeout_secs: u64) -> Result<RawUpload, PipelineError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<RawUpload, PipelineError> {
    let path = PathBuf::from(path_str);
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            PipelineError::invalid_input(format!("File not found: {}", path.display()))
        }
        std::io::ErrorKind::PermissionDenied => {
            PipelineError::invalid_input(format!("Permission denied: {}", path.display()))
        }
        _ => PipelineError::invalid_input(format!("Cannot read {}: {e}", path.display())),
    })?;

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    Ok(RawUpload::new(bytes, filename))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<RawUpload, PipelineError> {
    info!("Downloading: {}", url);
    let failed = |reason: String| PipelineError::invalid_input(format!("Failed to download {url}: {reason}"));

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PipelineError::Internal(format!("Failed to create HTTP client: {e}")))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(RawUpload::new(bytes.to_vec(), filename_from_url(url)))
}

/// Last path segment of the URL when it looks like a filename.
fn filename_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    (!last.is_empty() && last.contains('.')).then(|| last.to_string())
}
