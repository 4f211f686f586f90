//! Page analysis: drive page images through the vision collaborator.
//!
//! Pages go out one at a time, in order. The vision model is a shared,
//! capacity-bound service and the combined text must follow page order, so
//! there is no fan-out here. The first failing or empty page aborts the
//! whole analysis; no partial text is ever returned.

use crate::collaborators::Inference;
use crate::error::PipelineError;
use crate::output::{PageAnalysis, PageImage};
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::postprocess::clean_vision_text;
use crate::prompts;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Stage label used in errors and logs.
const STAGE: &str = "LLM Vision";

/// Analyse every page of a rasterised document.
///
/// Each page is sent with `"Page N: "` prefixed to `prompt`. Results come
/// back in page order.
pub async fn analyze_pages(
    inference: &dyn Inference,
    pages: &[PageImage],
    prompt: &str,
    system_prompt: &str,
) -> Result<Vec<PageAnalysis>, PipelineError> {
    if pages.is_empty() {
        return Err(PipelineError::EmptyDocument);
    }
    info!("Analysing {} page(s)", pages.len());

    let mut results = Vec::with_capacity(pages.len());
    for page in pages {
        let page_prompt = prompts::page_prompt(page.page_num, prompt);
        let analysis = analyze_one(inference, page, &page_prompt, system_prompt).await?;
        results.push(analysis);
    }
    Ok(results)
}

/// Analyse a single image with `prompt` sent verbatim.
///
/// Used for directly uploaded images and for classification, where no page
/// numbering is wanted.
pub async fn analyze_single(
    inference: &dyn Inference,
    image: &PageImage,
    prompt: &str,
    system_prompt: &str,
) -> Result<String, PipelineError> {
    analyze_one(inference, image, prompt, system_prompt)
        .await
        .map(|a| a.text)
}

/// Join per-page results under `--- Page N ---` headers, blank line between
/// pages.
pub fn combine(results: &[PageAnalysis]) -> String {
    results
        .iter()
        .map(|r| format!("{}\n{}", prompts::page_header(r.page_num), r.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

async fn analyze_one(
    inference: &dyn Inference,
    page: &PageImage,
    prompt: &str,
    system_prompt: &str,
) -> Result<PageAnalysis, PipelineError> {
    let start = Instant::now();
    let image = EncodedImage::from_page(page);

    let raw = inference.vision(system_prompt, prompt, &image).await.map_err(|e| {
        warn!("Page {}: vision call failed: {}", page.page_num, e);
        e
    })?;
    let text = clean_vision_text(&raw);
    if text.is_empty() {
        warn!("Page {}: vision model returned no text", page.page_num);
        return Err(PipelineError::empty_response(STAGE));
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    debug!(
        "Page {}: {} chars in {}ms",
        page.page_num,
        text.len(),
        duration_ms
    );
    Ok(PageAnalysis {
        page_num: page.page_num,
        text,
        duration_ms,
    })
}
