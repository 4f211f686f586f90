use super::{endpoint, ensure_success, http_client, unreachable, SpeechToText, Transcription};
use crate::config::ServiceConfig;
use crate::error::PipelineError;
use crate::output::RawUpload;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Instant;
use tracing::debug;

const SERVICE: &str = "STT";

/// Speech-to-text over HTTP: multipart `POST {stt_url}/transcribe` with the
/// audio in the `audio` field.
#[derive(Debug, Clone)]
pub struct HttpSpeechToText {
    client: reqwest::Client,
    url: String,
}

impl HttpSpeechToText {
    pub fn new(config: &ServiceConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            client: http_client(config)?,
            url: endpoint(&config.stt_url, "transcribe"),
        })
    }
}

#[async_trait]
impl SpeechToText for HttpSpeechToText {
    async fn transcribe(&self, audio: &RawUpload) -> Result<Transcription, PipelineError> {
        let start = Instant::now();
        let filename = audio
            .filename
            .clone()
            .unwrap_or_else(|| "audio.ogg".to_string());
        let form = Form::new().part("audio", Part::bytes(audio.bytes.clone()).file_name(filename));

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| unreachable(SERVICE, e))?;
        let response = ensure_success(SERVICE, response).await?;

        let transcription: Transcription = response
            .json()
            .await
            .map_err(|e| unreachable(SERVICE, e))?;
        debug!(
            "STT: {} chars, language={:?}, {:?}",
            transcription.text.len(),
            transcription.language,
            start.elapsed()
        );
        Ok(transcription)
    }
}
