//! Prompts sent to the inference collaborator.
//!
//! All prompt text lives here so that wording changes never touch the
//! orchestration code, and so tests can assert on the exact strings the
//! collaborators receive.

use crate::output::DocumentType;
use once_cell::sync::Lazy;

/// System prompt for chat and voice requests when the caller supplies none.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer concisely.";

/// System prompt for every vision request.
pub const DEFAULT_VISION_SYSTEM_PROMPT: &str =
    "You are an assistant specialised in analysing images and documents.";

/// User prompt for `/image` when the form carries none.
pub const DEFAULT_IMAGE_PROMPT: &str = "Describe this image in detail.";

/// User prompt for `/document` when the form carries none.
pub const DEFAULT_DOCUMENT_PROMPT: &str =
    "Analyze this document and extract the important information.";

/// Fixed prompt for `/classify`. Lists every [`DocumentType`] and pins the
/// three-line answer format [`crate::pipeline::classify::parse`] expects.
pub static CLASSIFICATION_PROMPT: Lazy<String> = Lazy::new(|| {
    let categories = DocumentType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Analyze this document and classify it into one of the following categories:\n\
         {categories}\n\
         \n\
         Answer ONLY with the format:\n\
         TYPE: [category]\n\
         CONFIDENCE: [high/medium/low]\n\
         DESCRIPTION: [short description of the document]\n\
         \n\
         If you cannot identify the document, use \"{other}\" as the type.",
        other = DocumentType::Other.as_str()
    )
});

/// Prompt for one page of a multi-page document.
pub fn page_prompt(page_num: usize, prompt: &str) -> String {
    format!("Page {page_num}: {prompt}")
}

/// Delimiter line placed above each page's text in the combined result.
pub fn page_header(page_num: usize) -> String {
    format!("--- Page {page_num} ---")
}

/// Sentence spoken back after a classification.
pub fn classification_summary(doc_type: DocumentType, description: &str) -> String {
    format!(
        "Document identified as {}. {}",
        doc_type.as_str(),
        description
    )
}
