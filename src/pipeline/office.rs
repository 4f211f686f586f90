//! Office normalisation: DOCX/DOC/XLSX/XLS/PPTX/PPT → PDF.
//!
//! The conversion is delegated to a headless LibreOffice process. Each call
//! gets its own scratch [`TempDir`] holding the input, the output and a
//! private LibreOffice profile, so concurrent conversions never contend on
//! files. The directory is removed when the `TempDir` drops, which covers
//! success, failure and timeout alike. `kill_on_drop` makes sure a timed-out
//! converter does not outlive the request.

use crate::error::PipelineError;
use crate::pipeline::sniff::DetectedFormat;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Converts an office document to PDF bytes.
#[async_trait]
pub trait OfficeConverter: Send + Sync {
    async fn to_pdf(&self, bytes: &[u8], format: DetectedFormat) -> Result<Vec<u8>, PipelineError>;
}

/// File extension the converter needs to pick the right import filter.
///
/// Non-office formats fall back to `docx`.
pub fn office_extension(format: DetectedFormat) -> &'static str {
    match format {
        DetectedFormat::Docx => "docx",
        DetectedFormat::Doc => "doc",
        DetectedFormat::Xlsx => "xlsx",
        DetectedFormat::Xls => "xls",
        DetectedFormat::Pptx => "pptx",
        DetectedFormat::Ppt => "ppt",
        _ => "docx",
    }
}

/// [`OfficeConverter`] backed by `libreoffice --headless --convert-to pdf`.
#[derive(Debug, Clone)]
pub struct LibreOfficeConverter {
    bin: PathBuf,
    timeout: Duration,
}

impl LibreOfficeConverter {
    pub fn new(bin: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }
}

#[async_trait]
impl OfficeConverter for LibreOfficeConverter {
    async fn to_pdf(&self, bytes: &[u8], format: DetectedFormat) -> Result<Vec<u8>, PipelineError> {
        let start = Instant::now();
        let scratch = tempfile::Builder::new()
            .prefix("docvoice-office-")
            .tempdir()
            .map_err(|e| PipelineError::Internal(format!("scratch dir: {e}")))?;

        let pdf = convert_in(&scratch, &self.bin, self.timeout, bytes, format).await;

        debug!(
            "Office conversion ({}) finished in {}ms: {}",
            format,
            start.elapsed().as_millis(),
            if pdf.is_ok() { "ok" } else { "failed" }
        );
        // `scratch` drops here on every path.
        pdf
    }
}

async fn convert_in(
    scratch: &TempDir,
    bin: &Path,
    timeout: Duration,
    bytes: &[u8],
    format: DetectedFormat,
) -> Result<Vec<u8>, PipelineError> {
    let dir = scratch.path();
    let input = dir.join(format!("input.{}", office_extension(format)));
    let output = dir.join("input.pdf");

    tokio::fs::write(&input, bytes)
        .await
        .map_err(|e| PipelineError::Internal(format!("Failed to write office input: {e}")))?;

    info!(
        "Converting {} ({} bytes) to PDF with {}",
        format,
        bytes.len(),
        bin.display()
    );

    let mut cmd = Command::new(bin);
    cmd.arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(dir)
        .arg(format!(
            "-env:UserInstallation=file://{}",
            dir.join("profile").display()
        ))
        .arg(&input)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let result = match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_) => {
            warn!("Office conversion timed out after {}s", timeout.as_secs());
            return Err(PipelineError::ConversionTimeout {
                secs: timeout.as_secs(),
            });
        }
        Ok(Err(e)) => {
            return Err(PipelineError::Conversion(format!(
                "could not start {}: {e}",
                bin.display()
            )))
        }
        Ok(Ok(out)) => out,
    };

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        warn!("Office converter exited with {}: {}", result.status, stderr.trim());
        return Err(PipelineError::Conversion(stderr.trim().to_string()));
    }

    match tokio::fs::read(&output).await {
        Ok(pdf) if !pdf.is_empty() => Ok(pdf),
        _ => Err(PipelineError::Conversion("the converter produced no PDF".into())),
    }
}
