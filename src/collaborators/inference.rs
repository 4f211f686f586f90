use super::{endpoint, ensure_success, http_client, unreachable, Inference};
use crate::config::ServiceConfig;
use crate::error::PipelineError;
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

const CHAT_SERVICE: &str = "LLM";
const VISION_SERVICE: &str = "LLM Vision";

// ── Ollama-style endpoint ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<&'a str>>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaReply>,
}

#[derive(Debug, Deserialize)]
struct OllamaReply {
    #[serde(default)]
    content: String,
}

/// Inference through an Ollama-compatible `POST {llm_url}/api/chat`.
///
/// Text chat uses `chat_model`; image requests use `vision_model` with the
/// base64 image attached to the user message.
#[derive(Debug, Clone)]
pub struct OllamaInference {
    client: reqwest::Client,
    url: String,
    chat_model: String,
    vision_model: String,
}

impl OllamaInference {
    pub fn new(config: &ServiceConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            client: http_client(config)?,
            url: endpoint(&config.llm_url, "api/chat"),
            chat_model: config.chat_model.clone(),
            vision_model: config.vision_model.clone(),
        })
    }

    async fn execute(
        &self,
        service: &'static str,
        request: &OllamaChatRequest<'_>,
    ) -> Result<String, PipelineError> {
        let start = Instant::now();
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| unreachable(service, e))?;
        let response = ensure_success(service, response).await?;

        let body: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| unreachable(service, e))?;
        let content = body.message.map(|m| m.content).unwrap_or_default();
        debug!(
            "{} ({}): {} chars in {:?}",
            service,
            request.model,
            content.len(),
            start.elapsed()
        );
        Ok(content)
    }
}

#[async_trait]
impl Inference for OllamaInference {
    async fn chat(&self, system_prompt: &str, user_text: &str) -> Result<String, PipelineError> {
        let request = OllamaChatRequest {
            model: &self.chat_model,
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: system_prompt,
                    images: None,
                },
                OllamaMessage {
                    role: "user",
                    content: user_text,
                    images: None,
                },
            ],
            stream: false,
        };
        self.execute(CHAT_SERVICE, &request).await
    }

    async fn vision(
        &self,
        system_prompt: &str,
        prompt: &str,
        image: &EncodedImage,
    ) -> Result<String, PipelineError> {
        let request = OllamaChatRequest {
            model: &self.vision_model,
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: system_prompt,
                    images: None,
                },
                OllamaMessage {
                    role: "user",
                    content: prompt,
                    images: Some(vec![image.base64.as_str()]),
                },
            ],
            stream: false,
        };
        self.execute(VISION_SERVICE, &request).await
    }
}

// ── edgequake-llm provider ──────────────────────────────────────────────────

/// Inference through any edgequake-llm provider (OpenAI, Anthropic, Gemini,
/// Ollama, ...), selected by name.
pub struct ProviderInference {
    chat: Arc<dyn LLMProvider>,
    vision: Arc<dyn LLMProvider>,
}

impl ProviderInference {
    /// Resolve `provider_name` twice, once per model. API keys are read from
    /// the provider's usual environment variables.
    pub fn new(
        provider_name: &str,
        chat_model: &str,
        vision_model: &str,
    ) -> Result<Self, PipelineError> {
        let create = |model: &str| {
            ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
                PipelineError::InvalidConfig(format!(
                    "inference provider '{provider_name}' ({model}): {e}"
                ))
            })
        };
        Ok(Self::with_providers(create(chat_model)?, create(vision_model)?))
    }

    pub fn with_providers(chat: Arc<dyn LLMProvider>, vision: Arc<dyn LLMProvider>) -> Self {
        Self { chat, vision }
    }

    async fn complete(
        service: &'static str,
        provider: &Arc<dyn LLMProvider>,
        messages: Vec<ChatMessage>,
    ) -> Result<String, PipelineError> {
        let start = Instant::now();
        let response = provider
            .chat(&messages, Some(&build_options()))
            .await
            .map_err(|e| PipelineError::CollaboratorUnreachable {
                service,
                detail: e.to_string(),
            })?;
        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            service,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

#[async_trait]
impl Inference for ProviderInference {
    async fn chat(&self, system_prompt: &str, user_text: &str) -> Result<String, PipelineError> {
        let messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(user_text)];
        Self::complete(CHAT_SERVICE, &self.chat, messages).await
    }

    async fn vision(
        &self,
        system_prompt: &str,
        prompt: &str,
        image: &EncodedImage,
    ) -> Result<String, PipelineError> {
        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user_with_images(prompt, vec![image.to_image_data()]),
        ];
        Self::complete(VISION_SERVICE, &self.vision, messages).await
    }
}

fn build_options() -> CompletionOptions {
    CompletionOptions {
        temperature: Some(0.1),
        max_tokens: Some(4096),
        ..Default::default()
    }
}
