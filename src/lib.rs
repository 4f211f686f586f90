//! # docvoice
//!
//! Turn chat messages, voice notes, images and documents into a spoken
//! answer.
//!
//! Every request converges on the same reply: answer text, Ogg/Opus speech
//! for that text, and a language tag. Documents are sniffed by their bytes
//! (never by filename), office formats are converted to PDF, PDFs are
//! rasterised page by page, and each page is read by a vision model. The
//! `/classify` path additionally sorts a document into a fixed set of 18
//! categories.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Sniff    magic bytes → pdf / office / image / unsupported
//!  ├─ 2. Office   LibreOffice → PDF (scratch dir, 120 s bound)
//!  ├─ 3. Render   pdfium → PNG per page (spawn_blocking)
//!  ├─ 4. Vision   one call per page, strictly in order
//!  ├─ 5. Parse    TYPE / CONFIDENCE / DESCRIPTION (classification only)
//!  └─ 6. Respond  TTS → WAV → ffmpeg → Opus
//! ```
//!
//! Speech-to-text, inference and text-to-speech are external services
//! reached through the traits in [`collaborators`]; tests swap in fakes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docvoice::{server, Pipeline, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .llm_url("http://localhost:11434")
//!         .build()?;
//!     let pipeline = Pipeline::from_config(config)?;
//!     server::serve(pipeline, "0.0.0.0:8000").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docvoice` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when embedding the library:
//! ```toml
//! docvoice = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod collaborators;
pub mod config;
pub mod controller;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use collaborators::{Collaborators, Inference, SpeechToText, TextToSpeech};
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use controller::Pipeline;
pub use error::PipelineError;
pub use output::{
    ClassificationRecord, ClassificationReply, Confidence, DocumentType, PipelineReply, RawUpload,
};
pub use pipeline::sniff::{detect, DetectedFormat};
