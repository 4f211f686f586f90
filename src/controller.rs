//! Per-request orchestration.
//!
//! [`Pipeline`] owns the configuration and the collaborators and exposes one
//! method per request shape. Each method validates its input before the
//! first external call, runs a short fixed sequence of stages, and converges
//! on [`PipelineReply`] through the [`ResponseAssembler`].
//!
//! ```text
//! chat      text ─────────────────────────────▶ LLM ─────────────▶ respond
//! voice     audio ──▶ STT ────────────────────▶ LLM ─────────────▶ respond
//! image     image ────────────────────────────▶ vision ──────────▶ respond
//! document  bytes ──▶ sniff ─┬─ office ─▶ pdf ─▶ pages ─▶ vision×N ─▶ respond
//!                            ├─ pdf ──────────▶ pages ─▶ vision×N ─▶ respond
//!                            └─ image ────────────────▶ vision ────▶ respond
//! classify  same branches as document, first page only, then parse
//! ```

use crate::collaborators::Collaborators;
use crate::config::ServiceConfig;
use crate::error::PipelineError;
use crate::output::{
    ClassificationReply, DocumentType, PageImage, PipelineReply, RawUpload,
};
use crate::pipeline::respond::ResponseAssembler;
use crate::pipeline::sniff::{self, DetectedFormat};
use crate::pipeline::{analyze, classify};
use crate::prompts;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// What a document upload turned into after sniffing.
enum Prepared {
    /// Rasterised PDF pages, in page order.
    Pages(Vec<PageImage>),
    /// A directly uploaded image.
    Image(PageImage),
}

/// Static service description returned by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: &'static str,
    pub models: ModelInfo,
    pub services: ServiceEndpoints,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub chat: String,
    pub vision: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceEndpoints {
    pub stt: String,
    pub tts: String,
    pub llm: String,
}

/// The request pipeline. Cheap to clone; share one per process.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<ServiceConfig>,
    collaborators: Collaborators,
    responder: ResponseAssembler,
}

impl Pipeline {
    pub fn new(config: ServiceConfig, collaborators: Collaborators) -> Self {
        let responder = ResponseAssembler::new(
            collaborators.tts.clone(),
            collaborators.encoder.clone(),
            config.default_language.clone(),
        );
        Self {
            config: Arc::new(config),
            collaborators,
            responder,
        }
    }

    /// Build the production collaborators from `config`.
    pub fn from_config(config: ServiceConfig) -> Result<Self, PipelineError> {
        let collaborators = Collaborators::from_config(&config)?;
        Ok(Self::new(config, collaborators))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Text in, spoken answer out.
    pub async fn chat(
        &self,
        text: &str,
        language: Option<&str>,
        system_prompt: Option<&str>,
    ) -> Result<PipelineReply, PipelineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::invalid_input("Text must not be empty"));
        }
        let system = non_blank(system_prompt).unwrap_or(self.config.system_prompt.as_str());

        let start = Instant::now();
        let answer = self.ask(system, text).await?;
        let reply = self.responder.finalize(&answer, non_blank(language)).await?;
        info!("chat: replied in {}ms", start.elapsed().as_millis());
        Ok(reply)
    }

    /// Audio in: transcribe, answer, and reply in the detected language.
    pub async fn voice(&self, audio: &RawUpload) -> Result<PipelineReply, PipelineError> {
        if audio.is_empty() {
            return Err(PipelineError::invalid_input("Audio file is empty"));
        }

        let start = Instant::now();
        let heard = self.collaborators.stt.transcribe(audio).await?;
        let text = heard.text.trim();
        if text.is_empty() {
            return Err(PipelineError::invalid_input("Could not transcribe the audio"));
        }
        debug!(
            "voice: transcribed {} chars (language={:?}, confidence={:?})",
            text.len(),
            heard.language,
            heard.confidence
        );

        let answer = self.ask(&self.config.system_prompt, text).await?;
        let reply = self
            .responder
            .finalize(&answer, non_blank(heard.language.as_deref()))
            .await?;
        info!("voice: replied in {}ms", start.elapsed().as_millis());
        Ok(reply)
    }

    /// Describe one image with the caller's prompt.
    pub async fn image(
        &self,
        upload: &RawUpload,
        prompt: Option<&str>,
        language: Option<&str>,
    ) -> Result<PipelineReply, PipelineError> {
        if upload.is_empty() {
            return Err(PipelineError::invalid_input("Image file is empty"));
        }
        let format = sniff::detect(&upload.bytes);
        let Some(mime_type) = format.image_mime() else {
            return Err(PipelineError::invalid_input(format!(
                "Unsupported image type '{format}'. Use PNG, JPEG, GIF or WebP"
            )));
        };

        let start = Instant::now();
        let page = PageImage {
            page_num: 1,
            data: upload.bytes.clone(),
            mime_type,
        };
        let prompt = non_blank(prompt).unwrap_or(prompts::DEFAULT_IMAGE_PROMPT);
        let text = analyze::analyze_single(
            self.collaborators.inference.as_ref(),
            &page,
            prompt,
            &self.config.vision_system_prompt,
        )
        .await?;

        let reply = self.responder.finalize(&text, non_blank(language)).await?;
        info!("image: replied in {}ms", start.elapsed().as_millis());
        Ok(reply)
    }

    /// Analyse every page of a document (or the single uploaded image).
    pub async fn document(
        &self,
        upload: &RawUpload,
        prompt: Option<&str>,
        language: Option<&str>,
    ) -> Result<PipelineReply, PipelineError> {
        if upload.is_empty() {
            return Err(PipelineError::invalid_input("File is empty"));
        }

        let start = Instant::now();
        let prompt = non_blank(prompt).unwrap_or(prompts::DEFAULT_DOCUMENT_PROMPT);
        let inference = self.collaborators.inference.as_ref();
        let system = &self.config.vision_system_prompt;

        let text = match self.prepare(upload, None).await? {
            Prepared::Pages(pages) => {
                let results = analyze::analyze_pages(inference, &pages, prompt, system).await?;
                analyze::combine(&results)
            }
            Prepared::Image(image) => {
                analyze::analyze_single(inference, &image, prompt, system).await?
            }
        };

        let reply = self.responder.finalize(&text, non_blank(language)).await?;
        info!(
            "document: {} replied in {}ms",
            upload.display_name(),
            start.elapsed().as_millis()
        );
        Ok(reply)
    }

    /// Classify a document from its first page and speak a one-line summary.
    pub async fn classify(
        &self,
        upload: &RawUpload,
        language: Option<&str>,
    ) -> Result<ClassificationReply, PipelineError> {
        if upload.is_empty() {
            return Err(PipelineError::invalid_input("File is empty"));
        }

        let start = Instant::now();
        let first_page = match self.prepare(upload, Some(1)).await? {
            Prepared::Pages(pages) => pages
                .into_iter()
                .next()
                .ok_or(PipelineError::EmptyDocument)?,
            Prepared::Image(image) => image,
        };

        let raw = analyze::analyze_single(
            self.collaborators.inference.as_ref(),
            &first_page,
            &prompts::CLASSIFICATION_PROMPT,
            &self.config.vision_system_prompt,
        )
        .await?;
        let record = classify::parse(&raw);
        info!(
            "classify: {} → {} ({})",
            upload.display_name(),
            record.document_type,
            record.confidence
        );

        let summary = prompts::classification_summary(record.document_type, &record.description);
        let reply = self.responder.finalize(&summary, non_blank(language)).await?;
        debug!("classify: replied in {}ms", start.elapsed().as_millis());
        Ok(ClassificationReply { record, reply })
    }

    /// The 18 labels the classifier can answer with.
    pub fn document_types(&self) -> Vec<&'static str> {
        DocumentType::labels()
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            service: "api",
            models: ModelInfo {
                chat: self.config.chat_model.clone(),
                vision: self.config.vision_model.clone(),
            },
            services: ServiceEndpoints {
                stt: self.config.stt_url.clone(),
                tts: self.config.tts_url.clone(),
                llm: self.config.llm_url.clone(),
            },
        }
    }

    /// Text completion; an empty answer is fatal.
    async fn ask(&self, system: &str, text: &str) -> Result<String, PipelineError> {
        let answer = self.collaborators.inference.chat(system, text).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(PipelineError::empty_response("LLM"));
        }
        Ok(answer.to_string())
    }

    /// Sniff the upload and turn it into something the vision model can
    /// take. Unsupported formats fail here, before any external call.
    async fn prepare(
        &self,
        upload: &RawUpload,
        max_pages: Option<usize>,
    ) -> Result<Prepared, PipelineError> {
        let format = sniff::detect(&upload.bytes);
        info!(
            "{}: detected {} ({} bytes)",
            upload.display_name(),
            format,
            upload.bytes.len()
        );

        if let Some(mime_type) = format.image_mime() {
            return Ok(Prepared::Image(PageImage {
                page_num: 1,
                data: upload.bytes.clone(),
                mime_type,
            }));
        }

        let pdf = match format {
            DetectedFormat::Pdf => upload.bytes.clone(),
            f if f.is_office() => self.collaborators.office.to_pdf(&upload.bytes, f).await?,
            other => {
                return Err(PipelineError::UnsupportedFormat {
                    detected: other.to_string(),
                })
            }
        };

        let pages = self.collaborators.rasterizer.rasterize(pdf, max_pages).await?;
        if pages.is_empty() {
            return Err(PipelineError::EmptyDocument);
        }
        Ok(Prepared::Pages(pages))
    }
}

/// `None` for absent, empty or whitespace-only strings.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
