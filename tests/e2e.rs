//! End-to-end tests against the real local tools.
//!
//! These exercise pdfium, ffmpeg and (when a sample file is present)
//! LibreOffice for real, with the network services still faked. They are
//! gated behind `E2E_ENABLED` because the tools are rarely installed in CI.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! Office samples are read from `./test_cases/` (`sample.docx`,
//! `sample.xlsx`); missing samples skip their test.

mod common;

use common::*;
use docvoice::pipeline::office::{LibreOfficeConverter, OfficeConverter};
use docvoice::pipeline::render::{PdfiumRasterizer, Rasterizer};
use docvoice::pipeline::respond::{AudioEncoder, FfmpegOpusEncoder};
use docvoice::pipeline::sniff::{detect, DetectedFormat};
use docvoice::{Collaborators, Pipeline, PipelineError, ServiceConfig};
use pdfium_auto::PdfiumLocator;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_enabled {
    () => {
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    };
}

/// Skip unless E2E_ENABLED is set *and* the sample exists.
macro_rules! e2e_skip_unless_sample {
    ($name:expr) => {{
        e2e_skip_unless_enabled!();
        let p = test_cases_dir().join($name);
        if !p.exists() {
            println!("SKIP — sample not found: {}", p.display());
            return;
        }
        p
    }};
}

/// A PDF with `pages` blank Letter pages. pdfium rebuilds the xref table
/// when offsets are missing, so none are written.
fn blank_pdf(pages: usize) -> Vec<u8> {
    let kids = (0..pages)
        .map(|i| format!("{} 0 R", i + 3))
        .collect::<Vec<_>>()
        .join(" ");
    let mut pdf = format!(
        "%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
         2 0 obj\n<< /Type /Pages /Kids [{kids}] /Count {pages} >>\nendobj\n"
    );
    for i in 0..pages {
        pdf.push_str(&format!(
            "{} 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>\nendobj\n",
            i + 3
        ));
    }
    pdf.push_str("trailer\n<< /Root 1 0 R >>\n%%EOF\n");
    pdf.into_bytes()
}

/// 100 ms of 16 kHz mono silence.
fn silent_wav() -> Vec<u8> {
    let samples = 1600u32;
    let data_len = samples * 2;
    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&16_000u32.to_le_bytes());
    wav.extend_from_slice(&32_000u32.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 0);
    wav
}

fn rasterizer() -> PdfiumRasterizer {
    PdfiumRasterizer::new(100, 1000, PdfiumLocator::new())
}

// ── pdfium ───────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_rasterize_three_pages() {
    e2e_skip_unless_enabled!();

    let pages = rasterizer().rasterize(blank_pdf(3), None).await.unwrap();
    assert_eq!(pages.len(), 3);
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.page_num, i + 1);
        assert_eq!(page.mime_type, "image/png");
        assert_eq!(detect(&page.data), DetectedFormat::Png);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rasterize_first_page_only() {
    e2e_skip_unless_enabled!();

    let pages = rasterizer().rasterize(blank_pdf(4), Some(1)).await.unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].page_num, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_garbage_pdf_is_empty_document() {
    e2e_skip_unless_enabled!();

    let err = rasterizer()
        .rasterize(b"%PDF-1.7\nnot really a pdf".to_vec(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyDocument), "{err:?}");
}

// ── ffmpeg ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_encode_wav_to_opus() {
    e2e_skip_unless_enabled!();

    let encoder = FfmpegOpusEncoder::new("ffmpeg", "48k", Duration::from_secs(30));
    let ogg = encoder.encode(&silent_wav()).await.unwrap();
    assert!(ogg.starts_with(b"OggS"), "not an Ogg stream");
}

// ── LibreOffice ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_docx() {
    let path = e2e_skip_unless_sample!("sample.docx");

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(detect(&bytes), DetectedFormat::Docx);
    let converter = LibreOfficeConverter::new("libreoffice", Duration::from_secs(120));
    let pdf = converter.to_pdf(&bytes, DetectedFormat::Docx).await.unwrap();
    assert_eq!(detect(&pdf), DetectedFormat::Pdf);
}

#[tokio::test]
async fn test_convert_garbage_docx_fails() {
    e2e_skip_unless_enabled!();

    let converter = LibreOfficeConverter::new("libreoffice", Duration::from_secs(120));
    let result = converter
        .to_pdf(b"PK\x03\x04word/ but nothing else", DetectedFormat::Docx)
        .await;
    assert!(result.is_err());
}

// ── Full pipeline ────────────────────────────────────────────────────────────

/// Real office, pdfium and ffmpeg; fake STT, inference and TTS.
fn local_tools_pipeline(h: &Harness) -> Pipeline {
    let config = ServiceConfig::builder().dpi(100).build().unwrap();
    Pipeline::new(
        config,
        Collaborators {
            stt: h.stt.clone(),
            inference: h.inference.clone(),
            tts: Arc::new(WavTts),
            office: Arc::new(LibreOfficeConverter::new(
                "libreoffice",
                Duration::from_secs(120),
            )),
            rasterizer: Arc::new(rasterizer()),
            encoder: Arc::new(FfmpegOpusEncoder::new(
                "ffmpeg",
                "48k",
                Duration::from_secs(30),
            )),
        },
    )
}

/// Returns a real (silent) WAV so ffmpeg has something to chew on.
struct WavTts;

#[async_trait::async_trait]
impl docvoice::TextToSpeech for WavTts {
    async fn synthesize(
        &self,
        _text: &str,
        _language: Option<&str>,
    ) -> Result<docvoice::collaborators::SynthesizedSpeech, PipelineError> {
        Ok(docvoice::collaborators::SynthesizedSpeech {
            wav: silent_wav(),
            detected_language: Some("en".into()),
        })
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_document_pipeline_two_pages() {
    e2e_skip_unless_enabled!();

    let h = Harness::new(0, vec![Ok("blank one"), Ok("blank two")]);
    let reply = local_tools_pipeline(&h)
        .document(&upload(&blank_pdf(2), "two.pdf"), None, None)
        .await
        .unwrap();

    println!("{}", reply.text);
    assert_eq!(
        reply.text,
        "--- Page 1 ---\nblank one\n\n--- Page 2 ---\nblank two"
    );
    assert!(reply.audio.starts_with(b"OggS"));
    assert_eq!(reply.language, "en");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_classify_xlsx() {
    let path = e2e_skip_unless_sample!("sample.xlsx");

    let h = Harness::new(
        0,
        vec![Ok("TYPE: Bank statement\nCONFIDENCE: low\nDESCRIPTION: A spreadsheet")],
    );
    let bytes = std::fs::read(&path).unwrap();
    let result = local_tools_pipeline(&h)
        .classify(&upload(&bytes, "sample.xlsx"), None)
        .await
        .unwrap();

    assert_eq!(result.record.document_type.as_str(), "Bank statement");
    assert_eq!(h.inference.vision_count(), 1);
}
