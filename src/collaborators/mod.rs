//! External collaborators: speech-to-text, inference and text-to-speech.
//!
//! The pipeline only ever talks to these services through the traits below.
//! Production wiring ([`Collaborators::from_config`]) builds the HTTP clients
//! once at start-up; tests substitute in-process fakes.
//!
//! No client retries. A failed call fails the request and the caller
//! resubmits.

mod inference;
mod stt;
mod tts;

pub use inference::{OllamaInference, ProviderInference};
pub use stt::HttpSpeechToText;
pub use tts::HttpTextToSpeech;

use crate::config::ServiceConfig;
use crate::error::PipelineError;
use crate::output::RawUpload;
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::office::{LibreOfficeConverter, OfficeConverter};
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer};
use crate::pipeline::respond::{AudioEncoder, FfmpegOpusEncoder};
use async_trait::async_trait;
use pdfium_auto::PdfiumLocator;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// What the speech-to-text service heard.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Transcription {
    #[serde(default, alias = "texto")]
    pub text: String,
    #[serde(default, alias = "idioma")]
    pub language: Option<String>,
    #[serde(default, alias = "confianza")]
    pub confidence: Option<f32>,
}

/// Uncompressed speech plus the language the synthesiser settled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedSpeech {
    pub wav: Vec<u8>,
    pub detected_language: Option<String>,
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &RawUpload) -> Result<Transcription, PipelineError>;
}

/// Text and vision completion.
///
/// Implementations return the model's raw answer, possibly empty; deciding
/// whether an empty answer is fatal is the caller's business.
#[async_trait]
pub trait Inference: Send + Sync {
    async fn chat(&self, system_prompt: &str, user_text: &str) -> Result<String, PipelineError>;

    async fn vision(
        &self,
        system_prompt: &str,
        prompt: &str,
        image: &EncodedImage,
    ) -> Result<String, PipelineError>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// `language = None` lets the synthesiser detect the language itself.
    async fn synthesize(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> Result<SynthesizedSpeech, PipelineError>;
}

/// Every external dependency of the pipeline, shared read-only across
/// requests.
#[derive(Clone)]
pub struct Collaborators {
    pub stt: Arc<dyn SpeechToText>,
    pub inference: Arc<dyn Inference>,
    pub tts: Arc<dyn TextToSpeech>,
    pub office: Arc<dyn OfficeConverter>,
    pub rasterizer: Arc<dyn Rasterizer>,
    pub encoder: Arc<dyn AudioEncoder>,
}

impl Collaborators {
    /// Production wiring: HTTP clients for the network services, local
    /// processes for conversion and encoding, pdfium for rasterisation.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, PipelineError> {
        let inference: Arc<dyn Inference> = match config.inference_provider.as_deref() {
            Some(name) => {
                info!(
                    "Inference via edgequake-llm provider '{}' (chat={}, vision={})",
                    name, config.chat_model, config.vision_model
                );
                Arc::new(ProviderInference::new(
                    name,
                    &config.chat_model,
                    &config.vision_model,
                )?)
            }
            None => Arc::new(OllamaInference::new(config)?),
        };

        let mut locator = PdfiumLocator::new();
        if let Some(ref path) = config.pdfium_library {
            locator = locator.with_library_path(path);
        }

        Ok(Self {
            stt: Arc::new(HttpSpeechToText::new(config)?),
            inference,
            tts: Arc::new(HttpTextToSpeech::new(config)?),
            office: Arc::new(LibreOfficeConverter::new(
                &config.converter_bin,
                Duration::from_secs(config.office_timeout_secs),
            )),
            rasterizer: Arc::new(PdfiumRasterizer::new(
                config.dpi,
                config.max_rendered_pixels,
                locator,
            )),
            encoder: Arc::new(FfmpegOpusEncoder::new(
                &config.encoder_bin,
                &config.opus_bitrate,
                Duration::from_secs(config.encoder_timeout_secs),
            )),
        })
    }
}

/// One `reqwest::Client` per collaborator, bounded by the configured timeouts.
fn http_client(config: &ServiceConfig) -> Result<reqwest::Client, PipelineError> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .connect_timeout(config.connect_timeout())
        .build()
        .map_err(|e| PipelineError::InvalidConfig(format!("Failed to create HTTP client: {e}")))
}

/// Join a base URL and a path without doubling the slash.
fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn unreachable(service: &'static str, err: reqwest::Error) -> PipelineError {
    PipelineError::CollaboratorUnreachable {
        service,
        detail: err.to_string(),
    }
}

/// Pass 2xx responses through; turn anything else into
/// [`PipelineError::Collaborator`] carrying the response body.
async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, PipelineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PipelineError::Collaborator {
        service,
        status: status.as_u16(),
        body,
    })
}
