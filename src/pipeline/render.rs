//! PDF rasterisation: render pages to PNG via pdfium.
//!
//! pdfium keeps thread-local state and is CPU-bound, so all work happens
//! inside `spawn_blocking`. The PDF bytes are written to a named temp file
//! first; pdfium reads from a path and the file is removed when the handle
//! drops.
//!
//! `max_rendered_pixels` caps the longest edge regardless of physical page
//! size, which keeps memory bounded for posters and oversized scans.

use crate::error::PipelineError;
use crate::output::PageImage;
use crate::pipeline::encode;
use async_trait::async_trait;
use pdfium_auto::PdfiumLocator;
use pdfium_render::prelude::*;
use std::io::Write;
use tracing::{debug, info, warn};

/// Turns a PDF into an ordered list of page images.
///
/// Page numbers in the result are 1-based and contiguous. Implementations
/// must fail with [`PipelineError::EmptyDocument`] rather than return an
/// empty list.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render at most `max_pages` pages (all of them when `None`).
    async fn rasterize(
        &self,
        pdf: Vec<u8>,
        max_pages: Option<usize>,
    ) -> Result<Vec<PageImage>, PipelineError>;
}

/// [`Rasterizer`] backed by the PDFium library.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    dpi: u32,
    max_pixels: u32,
    locator: PdfiumLocator,
}

impl PdfiumRasterizer {
    pub fn new(dpi: u32, max_pixels: u32, locator: PdfiumLocator) -> Self {
        Self {
            dpi,
            max_pixels,
            locator,
        }
    }

    fn rasterize_blocking(
        &self,
        pdf: &[u8],
        max_pages: Option<usize>,
    ) -> Result<Vec<PageImage>, PipelineError> {
        let pdfium = self
            .locator
            .bind()
            .map_err(|e| PipelineError::PdfiumUnavailable(e.to_string()))?;

        let mut file = tempfile::Builder::new()
            .prefix("docvoice-")
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| PipelineError::Internal(format!("Failed to create temp file: {e}")))?;
        file.write_all(pdf)
            .and_then(|_| file.flush())
            .map_err(|e| PipelineError::Internal(format!("Failed to write temp PDF: {e}")))?;

        let document = match pdfium.load_pdf_from_file(file.path(), None) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("pdfium could not open the document: {:?}", e);
                return Err(PipelineError::EmptyDocument);
            }
        };

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        if total_pages == 0 {
            return Err(PipelineError::EmptyDocument);
        }
        let count = max_pages.map_or(total_pages, |m| m.min(total_pages));
        info!("PDF loaded: {} pages, rendering {}", total_pages, count);

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let mut results = Vec::with_capacity(count);
        for idx in 0..count {
            let page_num = idx + 1;
            let page = pages
                .get(idx as u16)
                .map_err(|e| PipelineError::Rasterisation {
                    page: page_num,
                    detail: format!("{:?}", e),
                })?;

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                PipelineError::Rasterisation {
                    page: page_num,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );

            let data = encode::png_bytes(&image).map_err(|e| PipelineError::Rasterisation {
                page: page_num,
                detail: e.to_string(),
            })?;
            results.push(PageImage {
                page_num,
                data,
                mime_type: "image/png",
            });
        }

        // `file` drops here and removes the temp PDF.
        Ok(results)
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(
        &self,
        pdf: Vec<u8>,
        max_pages: Option<usize>,
    ) -> Result<Vec<PageImage>, PipelineError> {
        if pdf.is_empty() {
            return Err(PipelineError::EmptyDocument);
        }
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.rasterize_blocking(&pdf, max_pages))
            .await
            .map_err(|e| PipelineError::Internal(format!("Render task panicked: {}", e)))?
    }
}
