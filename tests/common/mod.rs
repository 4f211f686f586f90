//! In-process fakes for every collaborator, with call counters.
//!
//! Each fake records what it was asked so tests can assert on prompts, page
//! order and on the absence of any outbound call.

#![allow(dead_code)]

use async_trait::async_trait;
use docvoice::collaborators::{SynthesizedSpeech, Transcription};
use docvoice::pipeline::encode::EncodedImage;
use docvoice::pipeline::office::OfficeConverter;
use docvoice::pipeline::render::Rasterizer;
use docvoice::pipeline::respond::AudioEncoder;
use docvoice::pipeline::sniff::DetectedFormat;
use docvoice::{
    Collaborators, Inference, Pipeline, PipelineError, RawUpload, ServiceConfig, SpeechToText,
    TextToSpeech,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const PDF_BYTES: &[u8] = b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n%%EOF";
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
pub const DOCX_BYTES: &[u8] = b"PK\x03\x04\x14\0\0\0\0\0word/document.xml";
pub const OGG_BYTES: &[u8] = b"OggS-fake-opus";

// ── STT ─────────────────────────────────────────────────────────────────────

pub struct FakeStt {
    pub transcription: Transcription,
    pub calls: Mutex<usize>,
}

#[async_trait]
impl SpeechToText for FakeStt {
    async fn transcribe(&self, _audio: &RawUpload) -> Result<Transcription, PipelineError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.transcription.clone())
    }
}

// ── Inference ───────────────────────────────────────────────────────────────

/// One recorded vision request.
#[derive(Debug, Clone)]
pub struct VisionCall {
    pub prompt: String,
    pub base64: String,
}

/// Answers chat with a fixed string and vision from a queue. An `Err`
/// entry in the queue fails that call.
pub struct FakeInference {
    pub chat_answer: String,
    pub vision_answers: Mutex<VecDeque<Result<String, String>>>,
    pub chat_calls: Mutex<Vec<(String, String)>>,
    pub vision_calls: Mutex<Vec<VisionCall>>,
}

impl FakeInference {
    pub fn vision_count(&self) -> usize {
        self.vision_calls.lock().unwrap().len()
    }

    pub fn chat_count(&self) -> usize {
        self.chat_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Inference for FakeInference {
    async fn chat(&self, system_prompt: &str, user_text: &str) -> Result<String, PipelineError> {
        self.chat_calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_text.to_string()));
        Ok(self.chat_answer.clone())
    }

    async fn vision(
        &self,
        _system_prompt: &str,
        prompt: &str,
        image: &EncodedImage,
    ) -> Result<String, PipelineError> {
        self.vision_calls.lock().unwrap().push(VisionCall {
            prompt: prompt.to_string(),
            base64: image.base64.clone(),
        });
        match self.vision_answers.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(body)) => Err(PipelineError::Collaborator {
                service: "LLM Vision",
                status: 500,
                body,
            }),
            None => Ok(String::new()),
        }
    }
}

// ── TTS ─────────────────────────────────────────────────────────────────────

pub struct FakeTts {
    pub detected_language: Option<String>,
    pub calls: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeTts {
    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TextToSpeech for FakeTts {
    async fn synthesize(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> Result<SynthesizedSpeech, PipelineError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), language.map(str::to_string)));
        Ok(SynthesizedSpeech {
            wav: b"RIFF\0\0\0\0WAVEfmt ".to_vec(),
            detected_language: self.detected_language.clone(),
        })
    }
}

// ── Office / rasteriser / encoder ───────────────────────────────────────────

pub struct FakeOffice {
    pub calls: Mutex<Vec<DetectedFormat>>,
}

#[async_trait]
impl OfficeConverter for FakeOffice {
    async fn to_pdf(&self, _bytes: &[u8], format: DetectedFormat) -> Result<Vec<u8>, PipelineError> {
        self.calls.lock().unwrap().push(format);
        Ok(PDF_BYTES.to_vec())
    }
}

/// Produces `pages` PNG pages whose bytes spell out their page number.
pub struct FakeRasterizer {
    pub pages: usize,
    pub calls: Mutex<Vec<Option<usize>>>,
}

impl FakeRasterizer {
    pub fn page_bytes(page_num: usize) -> Vec<u8> {
        format!("page-{page_num}").into_bytes()
    }
}

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn rasterize(
        &self,
        _pdf: Vec<u8>,
        max_pages: Option<usize>,
    ) -> Result<Vec<docvoice::output::PageImage>, PipelineError> {
        self.calls.lock().unwrap().push(max_pages);
        if self.pages == 0 {
            return Err(PipelineError::EmptyDocument);
        }
        let count = max_pages.map_or(self.pages, |m| m.min(self.pages));
        Ok((1..=count)
            .map(|n| docvoice::output::PageImage {
                page_num: n,
                data: Self::page_bytes(n),
                mime_type: "image/png",
            })
            .collect())
    }
}

pub struct FakeEncoder {
    pub calls: Mutex<usize>,
}

#[async_trait]
impl AudioEncoder for FakeEncoder {
    async fn encode(&self, _wav: &[u8]) -> Result<Vec<u8>, PipelineError> {
        *self.calls.lock().unwrap() += 1;
        Ok(OGG_BYTES.to_vec())
    }
}

// ── Harness ─────────────────────────────────────────────────────────────────

/// Every fake, shared with the [`Pipeline`] built from them.
pub struct Harness {
    pub stt: Arc<FakeStt>,
    pub inference: Arc<FakeInference>,
    pub tts: Arc<FakeTts>,
    pub office: Arc<FakeOffice>,
    pub rasterizer: Arc<FakeRasterizer>,
    pub encoder: Arc<FakeEncoder>,
}

impl Harness {
    pub fn new(pages: usize, vision_answers: Vec<Result<&str, &str>>) -> Self {
        Self {
            stt: Arc::new(FakeStt {
                transcription: Transcription {
                    text: "what time is it".into(),
                    language: Some("en".into()),
                    confidence: Some(0.93),
                },
                calls: Mutex::new(0),
            }),
            inference: Arc::new(FakeInference {
                chat_answer: "It is noon.".into(),
                vision_answers: Mutex::new(
                    vision_answers
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                chat_calls: Mutex::new(Vec::new()),
                vision_calls: Mutex::new(Vec::new()),
            }),
            tts: Arc::new(FakeTts {
                detected_language: None,
                calls: Mutex::new(Vec::new()),
            }),
            office: Arc::new(FakeOffice {
                calls: Mutex::new(Vec::new()),
            }),
            rasterizer: Arc::new(FakeRasterizer {
                pages,
                calls: Mutex::new(Vec::new()),
            }),
            encoder: Arc::new(FakeEncoder {
                calls: Mutex::new(0),
            }),
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            ServiceConfig::default(),
            Collaborators {
                stt: self.stt.clone(),
                inference: self.inference.clone(),
                tts: self.tts.clone(),
                office: self.office.clone(),
                rasterizer: self.rasterizer.clone(),
                encoder: self.encoder.clone(),
            },
        )
    }

    /// Total calls across every collaborator.
    pub fn outbound_calls(&self) -> usize {
        *self.stt.calls.lock().unwrap()
            + self.inference.chat_count()
            + self.inference.vision_count()
            + self.tts.count()
            + self.office.calls.lock().unwrap().len()
            + self.rasterizer.calls.lock().unwrap().len()
            + *self.encoder.calls.lock().unwrap()
    }
}

pub fn upload(bytes: &[u8], name: &str) -> RawUpload {
    RawUpload::new(bytes.to_vec(), Some(name.to_string()))
}
