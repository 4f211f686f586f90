//! Image encoding for the vision collaborator.
//!
//! Rendered pages are stored as PNG: lossless output keeps small print legible
//! for the model. Before a request leaves the process the bytes are base64
//! encoded, which is the form both Ollama's `images` array and the
//! edgequake-llm [`ImageData`] expect.

use crate::output::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// A page image ready to embed in a JSON request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub base64: String,
    pub mime_type: &'static str,
}

impl EncodedImage {
    pub fn from_page(page: &PageImage) -> Self {
        let base64 = STANDARD.encode(&page.data);
        debug!(
            "Encoded page {} → {} bytes base64",
            page.page_num,
            base64.len()
        );
        Self {
            base64,
            mime_type: page.mime_type,
        }
    }

    /// `detail: "high"` keeps OpenAI-style providers from downscaling to a
    /// single overview tile.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(self.base64.clone(), self.mime_type).with_detail("high")
    }
}

/// Serialise a rendered page as PNG.
pub fn png_bytes(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}
