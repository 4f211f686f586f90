//! Service configuration.
//!
//! Every knob lives in [`ServiceConfig`], built through
//! [`ServiceConfigBuilder`]. The defaults match the container deployment the
//! service was written for (collaborators reachable as `stt`, `tts` and `llm`
//! on the internal network).

use crate::error::PipelineError;
use crate::prompts::{DEFAULT_SYSTEM_PROMPT, DEFAULT_VISION_SYSTEM_PROMPT};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration shared by every request.
///
/// Constructed once at start-up and handed to [`crate::controller::Pipeline`]
/// behind an `Arc`; it is never mutated afterwards.
///
/// # Example
/// ```rust
/// use docvoice::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .llm_url("http://localhost:11434")
///     .vision_model("llava:13b")
///     .dpi(200)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ServiceConfig {
    /// Base URL of the speech-to-text service. Default: `http://stt:8000`.
    pub stt_url: String,

    /// Base URL of the text-to-speech service. Default: `http://tts:8000`.
    pub tts_url: String,

    /// Base URL of the Ollama-style inference server. Default: `http://llm:11434`.
    pub llm_url: String,

    /// Model used for plain text chat. Default: `qwen2.5:7b`.
    pub chat_model: String,

    /// Vision-capable model used for images and document pages. Default: `llava:7b`.
    pub vision_model: String,

    /// edgequake-llm provider name (`openai`, `anthropic`, `gemini`, ...).
    ///
    /// When set, inference goes through that provider instead of the
    /// Ollama-style endpoint at `llm_url`.
    pub inference_provider: Option<String>,

    /// System prompt for chat and voice requests.
    pub system_prompt: String,

    /// System prompt for every vision request.
    pub vision_system_prompt: String,

    /// Language used when neither the caller, STT nor TTS supplied one. Default: `es`.
    pub default_language: String,

    /// Rasterisation DPI. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Longest rendered edge in pixels, applied after DPI scaling. Default: 2000.
    ///
    /// Keeps poster-sized pages from producing images the vision model
    /// would downscale anyway.
    pub max_rendered_pixels: u32,

    /// Wall-clock bound for the office converter. Default: 120.
    pub office_timeout_secs: u64,

    /// Wall-clock bound for the audio encoder. Default: 60.
    pub encoder_timeout_secs: u64,

    /// Total timeout for every collaborator HTTP call. Default: 300.
    pub request_timeout_secs: u64,

    /// Connect timeout for every collaborator HTTP call. Default: 30.
    pub connect_timeout_secs: u64,

    /// Office converter executable. Default: `libreoffice`.
    pub converter_bin: PathBuf,

    /// Audio encoder executable. Default: `ffmpeg`.
    pub encoder_bin: PathBuf,

    /// Opus bitrate passed to the encoder. Default: `48k`.
    pub opus_bitrate: String,

    /// Largest accepted upload in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Explicit PDFium library. When `None` the library is searched for and
    /// downloaded on first use.
    pub pdfium_library: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            stt_url: "http://stt:8000".to_string(),
            tts_url: "http://tts:8000".to_string(),
            llm_url: "http://llm:11434".to_string(),
            chat_model: "qwen2.5:7b".to_string(),
            vision_model: "llava:7b".to_string(),
            inference_provider: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            vision_system_prompt: DEFAULT_VISION_SYSTEM_PROMPT.to_string(),
            default_language: "es".to_string(),
            dpi: 150,
            max_rendered_pixels: 2000,
            office_timeout_secs: 120,
            encoder_timeout_secs: 60,
            request_timeout_secs: 300,
            connect_timeout_secs: 30,
            converter_bin: PathBuf::from("libreoffice"),
            encoder_bin: PathBuf::from("ffmpeg"),
            opus_bitrate: "48k".to_string(),
            max_upload_bytes: 50 * 1024 * 1024,
            pdfium_library: None,
        }
    }
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn stt_url(mut self, url: impl Into<String>) -> Self {
        self.config.stt_url = url.into();
        self
    }

    pub fn tts_url(mut self, url: impl Into<String>) -> Self {
        self.config.tts_url = url.into();
        self
    }

    pub fn llm_url(mut self, url: impl Into<String>) -> Self {
        self.config.llm_url = url.into();
        self
    }

    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.config.chat_model = model.into();
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = model.into();
        self
    }

    pub fn inference_provider(mut self, name: impl Into<String>) -> Self {
        self.config.inference_provider = Some(name.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn vision_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.vision_system_prompt = prompt.into();
        self
    }

    pub fn default_language(mut self, lang: impl Into<String>) -> Self {
        self.config.default_language = lang.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn office_timeout_secs(mut self, secs: u64) -> Self {
        self.config.office_timeout_secs = secs;
        self
    }

    pub fn encoder_timeout_secs(mut self, secs: u64) -> Self {
        self.config.encoder_timeout_secs = secs;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn converter_bin(mut self, bin: impl Into<PathBuf>) -> Self {
        self.config.converter_bin = bin.into();
        self
    }

    pub fn encoder_bin(mut self, bin: impl Into<PathBuf>) -> Self {
        self.config.encoder_bin = bin.into();
        self
    }

    pub fn opus_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.config.opus_bitrate = bitrate.into();
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, PipelineError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(PipelineError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        for (name, url) in [("STT", &c.stt_url), ("TTS", &c.tts_url), ("LLM", &c.llm_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} URL must be http(s), got '{url}'"
                )));
            }
        }
        if c.office_timeout_secs == 0 || c.encoder_timeout_secs == 0 || c.request_timeout_secs == 0
        {
            return Err(PipelineError::InvalidConfig(
                "Timeouts must be at least one second".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(PipelineError::InvalidConfig(
                "Maximum upload size must be positive".into(),
            ));
        }
        Ok(self.config)
    }
}
