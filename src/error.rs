//! Error type for the docvoice pipeline.
//!
//! Every stage returns [`PipelineError`]. Variants fall in two groups:
//!
//! * **Client errors** (`InvalidInput`, `UnsupportedFormat`, `EmptyDocument`):
//!   the upload itself is unusable. These are raised before any collaborator
//!   is called where possible and surface to HTTP callers as 400 with their
//!   own message.
//!
//! * **Everything else**: a collaborator or local subprocess failed. The HTTP
//!   boundary reports these as 500 with a stage label prefixed to the
//!   message (see [`crate::server`]).
//!
//! There is no partial-failure variant: one failed page aborts the request.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request carried no usable payload (empty text, empty file, ...).
    #[error("{0}")]
    InvalidInput(String),

    /// Byte sniffing produced a format the pipeline cannot analyse.
    #[error("Unsupported file type '{detected}'. Use PDF, Office (DOCX, XLSX, PPTX) or images")]
    UnsupportedFormat { detected: String },

    /// The PDF yielded no pages, either because it has none or because
    /// pdfium could not open it at all.
    #[error("Could not extract any pages from the PDF")]
    EmptyDocument,

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    Rasterisation { page: usize, detail: String },

    /// The PDFium shared library could not be located or bound.
    #[error("PDFium library unavailable: {0}")]
    PdfiumUnavailable(String),

    // ── Collaborator errors ───────────────────────────────────────────────
    /// A collaborator answered with a non-2xx status.
    #[error("Error in {service} ({status}): {body}")]
    Collaborator {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// A collaborator could not be reached, timed out, or sent an unreadable body.
    #[error("{service} request failed: {detail}")]
    CollaboratorUnreachable {
        service: &'static str,
        detail: String,
    },

    /// The text-to-speech collaborator rejected the synthesis request.
    #[error("Speech synthesis failed ({status}): {body}")]
    Synthesis { status: u16, body: String },

    /// A collaborator returned no usable content.
    #[error("{stage} produced no response")]
    EmptyResponse { stage: String },

    // ── Local process errors ──────────────────────────────────────────────
    /// The office converter exited non-zero or produced no output.
    #[error("Office to PDF conversion failed: {0}")]
    Conversion(String),

    /// The office converter exceeded its wall-clock budget.
    #[error("Office to PDF conversion timed out after {secs}s")]
    ConversionTimeout { secs: u64 },

    /// The audio encoder exited non-zero, timed out, or could not be started.
    #[error("Audio encoding failed: {0}")]
    Encoding(String),

    // ── Config errors ─────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Convenience constructor for [`PipelineError::InvalidInput`].
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn empty_response(stage: impl Into<String>) -> Self {
        Self::EmptyResponse {
            stage: stage.into(),
        }
    }

    /// Whether the failure is the caller's fault (maps to HTTP 400).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::UnsupportedFormat { .. } | Self::EmptyDocument
        )
    }
}
