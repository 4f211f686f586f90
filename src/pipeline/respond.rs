//! Response assembly: final text → speech → compressed audio → reply.
//!
//! The synthesiser returns uncompressed WAV; clients get Ogg/Opus, which is
//! an order of magnitude smaller and plays natively in messaging apps. The
//! transcoding runs in a per-call scratch [`TempDir`] like the office
//! converter, so every exit path cleans up.

use crate::collaborators::TextToSpeech;
use crate::error::PipelineError;
use crate::output::PipelineReply;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

/// Transcodes WAV bytes into the compact codec sent to clients.
#[async_trait]
pub trait AudioEncoder: Send + Sync {
    async fn encode(&self, wav: &[u8]) -> Result<Vec<u8>, PipelineError>;
}

/// [`AudioEncoder`] that shells out to `ffmpeg -c:a libopus`.
#[derive(Debug, Clone)]
pub struct FfmpegOpusEncoder {
    bin: PathBuf,
    bitrate: String,
    timeout: Duration,
}

impl FfmpegOpusEncoder {
    pub fn new(bin: impl Into<PathBuf>, bitrate: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            bitrate: bitrate.into(),
            timeout,
        }
    }
}

#[async_trait]
impl AudioEncoder for FfmpegOpusEncoder {
    async fn encode(&self, wav: &[u8]) -> Result<Vec<u8>, PipelineError> {
        let scratch = tempfile::Builder::new()
            .prefix("docvoice-audio-")
            .tempdir()
            .map_err(|e| PipelineError::Internal(format!("scratch dir: {e}")))?;
        encode_in(&scratch, &self.bin, &self.bitrate, self.timeout, wav).await
    }
}

async fn encode_in(
    scratch: &TempDir,
    bin: &Path,
    bitrate: &str,
    timeout: Duration,
    wav: &[u8],
) -> Result<Vec<u8>, PipelineError> {
    let start = Instant::now();
    let input = scratch.path().join("speech.wav");
    let output = scratch.path().join("speech.ogg");

    tokio::fs::write(&input, wav)
        .await
        .map_err(|e| PipelineError::Internal(format!("Failed to write WAV: {e}")))?;

    let mut cmd = Command::new(bin);
    cmd.arg("-y")
        .arg("-i")
        .arg(&input)
        .args(["-c:a", "libopus", "-b:a", bitrate, "-application", "voip"])
        .arg(&output)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let result = match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_) => {
            return Err(PipelineError::Encoding(format!(
                "timed out after {}s",
                timeout.as_secs()
            )))
        }
        Ok(Err(e)) => {
            return Err(PipelineError::Encoding(format!(
                "could not start {}: {e}",
                bin.display()
            )))
        }
        Ok(Ok(out)) => out,
    };

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        // ffmpeg prints its banner first; the cause is at the end.
        let tail: String = stderr.trim().lines().last().unwrap_or_default().to_string();
        warn!("Audio encoder exited with {}: {}", result.status, tail);
        return Err(PipelineError::Encoding(tail));
    }

    let ogg = tokio::fs::read(&output)
        .await
        .map_err(|e| PipelineError::Encoding(format!("no output produced: {e}")))?;
    if ogg.is_empty() {
        return Err(PipelineError::Encoding("no output produced".into()));
    }
    debug!(
        "Encoded {} bytes WAV → {} bytes Opus in {}ms",
        wav.len(),
        ogg.len(),
        start.elapsed().as_millis()
    );
    Ok(ogg)
}

/// Turns final text into a [`PipelineReply`].
///
/// The reply language is the caller's tag when given, otherwise whatever the
/// synthesiser reports it detected, otherwise `default_language`.
#[derive(Clone)]
pub struct ResponseAssembler {
    tts: Arc<dyn TextToSpeech>,
    encoder: Arc<dyn AudioEncoder>,
    default_language: String,
}

impl ResponseAssembler {
    pub fn new(
        tts: Arc<dyn TextToSpeech>,
        encoder: Arc<dyn AudioEncoder>,
        default_language: impl Into<String>,
    ) -> Self {
        Self {
            tts,
            encoder,
            default_language: default_language.into(),
        }
    }

    pub async fn finalize(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> Result<PipelineReply, PipelineError> {
        let speech = self.tts.synthesize(text, language).await?;
        if speech.wav.is_empty() {
            return Err(PipelineError::empty_response("TTS"));
        }
        let audio = self.encoder.encode(&speech.wav).await?;

        let language = language
            .map(str::to_string)
            .or(speech.detected_language)
            .unwrap_or_else(|| self.default_language.clone());

        Ok(PipelineReply {
            text: text.to_string(),
            audio,
            language,
        })
    }
}
