use super::{endpoint, http_client, unreachable, SynthesizedSpeech, TextToSpeech};
use crate::config::ServiceConfig;
use crate::error::PipelineError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Instant;
use tracing::debug;

/// Response header carrying the language the synthesiser used.
pub const DETECTED_LANGUAGE_HEADER: &str = "X-Detected-Language";

/// Synthesis body. Each field is sent under its English and its Spanish
/// name (`texto`, `idioma`) so both synthesiser generations accept it; each
/// ignores the pair it does not know.
#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    texto: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    idioma: Option<&'a str>,
}

impl<'a> SynthesisRequest<'a> {
    fn new(text: &'a str, language: Option<&'a str>) -> Self {
        Self {
            text,
            texto: text,
            language,
            idioma: language,
        }
    }
}

/// Text-to-speech over HTTP: JSON `POST {tts_url}/synthesize`, WAV bytes back.
#[derive(Debug, Clone)]
pub struct HttpTextToSpeech {
    client: reqwest::Client,
    url: String,
}

impl HttpTextToSpeech {
    pub fn new(config: &ServiceConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            client: http_client(config)?,
            url: endpoint(&config.tts_url, "synthesize"),
        })
    }
}

#[async_trait]
impl TextToSpeech for HttpTextToSpeech {
    async fn synthesize(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> Result<SynthesizedSpeech, PipelineError> {
        let start = Instant::now();
        let response = self
            .client
            .post(&self.url)
            .json(&SynthesisRequest::new(text, language))
            .send()
            .await
            .map_err(|e| unreachable("TTS", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Synthesis {
                status: status.as_u16(),
                body,
            });
        }

        let detected_language = response
            .headers()
            .get(DETECTED_LANGUAGE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let wav = response
            .bytes()
            .await
            .map_err(|e| unreachable("TTS", e))?
            .to_vec();

        debug!(
            "TTS: {} chars → {} bytes WAV (language={:?}), {:?}",
            text.len(),
            wav.len(),
            detected_language,
            start.elapsed()
        );
        Ok(SynthesizedSpeech {
            wav,
            detected_language,
        })
    }
}
