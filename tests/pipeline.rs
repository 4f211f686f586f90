//! Pipeline integration tests against in-process fakes.
//!
//! No network, no LibreOffice, no pdfium, no ffmpeg: every collaborator is
//! replaced by a fake from `common`, so these run anywhere.

mod common;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::*;
use docvoice::pipeline::sniff::DetectedFormat;
use docvoice::{Confidence, DocumentType, PipelineError};

// ── Validation happens before any external call ─────────────────────────────

#[tokio::test]
async fn empty_document_is_rejected_without_outbound_calls() {
    let h = Harness::new(3, vec![]);
    let err = h
        .pipeline()
        .document(&upload(b"", "empty.pdf"), None, None)
        .await
        .unwrap_err();

    assert!(err.is_client_error());
    assert_eq!(err.to_string(), "File is empty");
    assert_eq!(h.outbound_calls(), 0);
}

#[tokio::test]
async fn unsupported_format_is_rejected_without_outbound_calls() {
    let h = Harness::new(3, vec![]);
    let err = h
        .pipeline()
        .document(&upload(b"just some text", "notes.pdf"), None, None)
        .await
        .unwrap_err();

    match &err {
        PipelineError::UnsupportedFormat { detected } => assert_eq!(detected, "unknown"),
        other => panic!("expected UnsupportedFormat, got {other:?}"),
    }
    assert!(err.is_client_error());
    assert_eq!(h.outbound_calls(), 0);
}

#[tokio::test]
async fn blank_chat_text_is_rejected_without_outbound_calls() {
    let h = Harness::new(0, vec![]);
    let err = h.pipeline().chat("   ", None, None).await.unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(h.outbound_calls(), 0);
}

#[tokio::test]
async fn image_endpoint_refuses_non_images() {
    let h = Harness::new(0, vec![]);
    let err = h
        .pipeline()
        .image(&upload(PDF_BYTES, "scan.png"), None, None)
        .await
        .unwrap_err();

    assert!(err.is_client_error());
    assert!(err.to_string().contains("'pdf'"), "{err}");
    assert_eq!(h.outbound_calls(), 0);
}

// ── Document analysis ───────────────────────────────────────────────────────

#[tokio::test]
async fn pages_are_analysed_in_order_and_combined() {
    let h = Harness::new(3, vec![Ok("alpha"), Ok("beta"), Ok("gamma")]);
    let reply = h
        .pipeline()
        .document(&upload(PDF_BYTES, "three.pdf"), Some("Summarise."), None)
        .await
        .unwrap();

    assert_eq!(
        reply.text,
        "--- Page 1 ---\nalpha\n\n--- Page 2 ---\nbeta\n\n--- Page 3 ---\ngamma"
    );
    assert_eq!(reply.audio, OGG_BYTES);
    assert_eq!(reply.language, "es");

    let calls = h.inference.vision_calls.lock().unwrap().clone();
    let prompts: Vec<_> = calls.iter().map(|c| c.prompt.as_str()).collect();
    assert_eq!(
        prompts,
        ["Page 1: Summarise.", "Page 2: Summarise.", "Page 3: Summarise."]
    );
    for (i, call) in calls.iter().enumerate() {
        let expected = STANDARD.encode(FakeRasterizer::page_bytes(i + 1));
        assert_eq!(call.base64, expected, "page {} sent out of order", i + 1);
    }
    assert_eq!(*h.rasterizer.calls.lock().unwrap(), vec![None]);
}

#[tokio::test]
async fn single_page_pdf_still_gets_a_header() {
    let h = Harness::new(1, vec![Ok("only page")]);
    let reply = h
        .pipeline()
        .document(&upload(PDF_BYTES, "one.pdf"), None, None)
        .await
        .unwrap();
    assert_eq!(reply.text, "--- Page 1 ---\nonly page");
}

#[tokio::test]
async fn uploaded_image_skips_rasterisation_and_headers() {
    let h = Harness::new(3, vec![Ok("a receipt")]);
    let reply = h
        .pipeline()
        .document(&upload(PNG_BYTES, "receipt.png"), Some("What is it?"), None)
        .await
        .unwrap();

    assert_eq!(reply.text, "a receipt");
    assert!(h.rasterizer.calls.lock().unwrap().is_empty());
    assert_eq!(h.inference.vision_calls.lock().unwrap()[0].prompt, "What is it?");
}

#[tokio::test]
async fn office_files_are_converted_first() {
    let h = Harness::new(2, vec![Ok("one"), Ok("two")]);
    h.pipeline()
        .document(&upload(DOCX_BYTES, "letter.docx"), None, None)
        .await
        .unwrap();

    assert_eq!(*h.office.calls.lock().unwrap(), vec![DetectedFormat::Docx]);
    assert_eq!(h.inference.vision_count(), 2);
}

#[tokio::test]
async fn failing_page_aborts_the_rest() {
    let h = Harness::new(3, vec![Ok("alpha"), Err("model crashed"), Ok("gamma")]);
    let err = h
        .pipeline()
        .document(&upload(PDF_BYTES, "three.pdf"), None, None)
        .await
        .unwrap_err();

    assert!(!err.is_client_error());
    assert!(err.to_string().contains("model crashed"), "{err}");
    assert_eq!(h.inference.vision_count(), 2);
    assert_eq!(h.tts.count(), 0);
}

#[tokio::test]
async fn empty_page_answer_is_fatal() {
    let h = Harness::new(2, vec![Ok("alpha"), Ok("  \n ")]);
    let err = h
        .pipeline()
        .document(&upload(PDF_BYTES, "two.pdf"), None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::EmptyResponse { .. }), "{err:?}");
    assert_eq!(h.tts.count(), 0);
}

#[tokio::test]
async fn zero_page_pdf_is_a_client_error() {
    let h = Harness::new(0, vec![]);
    let err = h
        .pipeline()
        .document(&upload(PDF_BYTES, "blank.pdf"), None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::EmptyDocument));
    assert!(err.is_client_error());
    assert_eq!(h.inference.vision_count(), 0);
}

// ── Classification ──────────────────────────────────────────────────────────

#[tokio::test]
async fn classification_reads_only_the_first_page() {
    let h = Harness::new(
        5,
        vec![Ok("TYPE: Invoice\nCONFIDENCE: high\nDESCRIPTION: Utility invoice for March")],
    );
    let result = h
        .pipeline()
        .classify(&upload(PDF_BYTES, "bill.pdf"), Some("en"))
        .await
        .unwrap();

    assert_eq!(result.record.document_type, DocumentType::Invoice);
    assert_eq!(result.record.confidence, Confidence::High);
    assert_eq!(result.record.description, "Utility invoice for March");
    assert_eq!(
        result.reply.text,
        "Document identified as Invoice. Utility invoice for March"
    );
    assert_eq!(result.reply.language, "en");

    assert_eq!(*h.rasterizer.calls.lock().unwrap(), vec![Some(1)]);
    let calls = h.inference.vision_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].prompt.starts_with("Analyze this document and classify it"));
    assert!(!calls[0].prompt.starts_with("Page "));
}

#[tokio::test]
async fn unparseable_classification_falls_back_to_other() {
    let h = Harness::new(1, vec![Ok("I am not sure what this is.")]);
    let result = h
        .pipeline()
        .classify(&upload(PDF_BYTES, "mystery.pdf"), None)
        .await
        .unwrap();

    assert_eq!(result.record.document_type, DocumentType::Other);
    assert_eq!(result.record.confidence, Confidence::Low);
    assert_eq!(result.record.description, "I am not sure what this is.");
}

// ── Chat and voice ──────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_uses_caller_system_prompt_and_language() {
    let h = Harness::new(0, vec![]);
    let reply = h
        .pipeline()
        .chat(" hello ", Some("fr"), Some("Answer in verse."))
        .await
        .unwrap();

    assert_eq!(reply.text, "It is noon.");
    assert_eq!(reply.language, "fr");
    let chat = h.inference.chat_calls.lock().unwrap();
    assert_eq!(chat[0], ("Answer in verse.".to_string(), "hello".to_string()));
    assert_eq!(
        h.tts.calls.lock().unwrap()[0],
        ("It is noon.".to_string(), Some("fr".to_string()))
    );
}

#[tokio::test]
async fn voice_replies_in_the_transcribed_language() {
    let h = Harness::new(0, vec![]);
    let reply = h
        .pipeline()
        .voice(&upload(OGG_BYTES, "note.ogg"))
        .await
        .unwrap();

    assert_eq!(reply.language, "en");
    assert_eq!(*h.stt.calls.lock().unwrap(), 1);
    assert_eq!(h.inference.chat_calls.lock().unwrap()[0].1, "what time is it");
    assert_eq!(h.tts.calls.lock().unwrap()[0].1.as_deref(), Some("en"));
}

#[tokio::test]
async fn empty_chat_answer_is_fatal() {
    let mut h = Harness::new(0, vec![]);
    h.inference = std::sync::Arc::new(FakeInference {
        chat_answer: "   ".into(),
        vision_answers: Default::default(),
        chat_calls: Default::default(),
        vision_calls: Default::default(),
    });
    let err = h.pipeline().chat("hi", None, None).await.unwrap_err();

    assert!(matches!(err, PipelineError::EmptyResponse { .. }), "{err:?}");
    assert_eq!(h.tts.count(), 0);
}
