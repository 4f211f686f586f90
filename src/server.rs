//! HTTP surface (axum).
//!
//! Every handler is a thin adapter: decode the request, call the matching
//! [`Pipeline`] method, encode the reply. Errors go through [`ApiError`]:
//! client errors become 400 with their own message, everything else 500 with
//! the stage prefixed. The body is always `{"detail": "..."}`.

use crate::controller::{HealthReport, Pipeline};
use crate::error::PipelineError;
use crate::output::{ClassificationReply, PipelineReply, RawUpload};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Build the router with every endpoint, request tracing and permissive CORS.
pub fn router(pipeline: Pipeline) -> Router {
    let body_limit = pipeline.config().max_upload_bytes;
    Router::new()
        .route("/chat", post(chat))
        .route("/voice", post(voice))
        .route("/image", post(image))
        .route("/document", post(document))
        .route("/classify", post(classify))
        .route("/document-types", get(document_types))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(pipeline)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(pipeline: Pipeline, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(pipeline)).await
}

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(alias = "texto")]
    pub text: String,
    #[serde(default, alias = "idioma")]
    pub language: Option<String>,
    #[serde(default, alias = "system_prompt")]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyBody {
    pub text: String,
    pub audio_base64: String,
    pub language: String,
}

impl From<PipelineReply> for ReplyBody {
    fn from(reply: PipelineReply) -> Self {
        Self {
            text: reply.text,
            audio_base64: STANDARD.encode(&reply.audio),
            language: reply.language,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyBody {
    pub document_type: String,
    pub confidence: String,
    pub description: String,
    #[serde(flatten)]
    pub reply: ReplyBody,
}

impl From<ClassificationReply> for ClassifyBody {
    fn from(c: ClassificationReply) -> Self {
        Self {
            document_type: c.record.document_type.as_str().to_string(),
            confidence: c.record.confidence.as_str().to_string(),
            description: c.record.description,
            reply: c.reply.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentTypesBody {
    pub types: Vec<&'static str>,
}

// ── Errors ──────────────────────────────────────────────────────────────────

/// A [`PipelineError`] tagged with the stage that raised it.
#[derive(Debug)]
pub struct ApiError {
    stage: &'static str,
    error: PipelineError,
}

impl ApiError {
    pub fn new(stage: &'static str, error: PipelineError) -> Self {
        Self { stage, error }
    }

    pub fn status(&self) -> StatusCode {
        if self.error.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    pub fn detail(&self) -> String {
        if self.error.is_client_error() {
            self.error.to_string()
        } else {
            format!("Error processing {}: {}", self.stage, self.error)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail();
        if status.is_server_error() {
            error!("{}", detail);
        } else {
            warn!("{} rejected: {}", self.stage, detail);
        }
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

fn at(stage: &'static str) -> impl Fn(PipelineError) -> ApiError {
    move |e| ApiError::new(stage, e)
}

// ── Multipart ───────────────────────────────────────────────────────────────

/// The file and text fields of a multipart upload.
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<RawUpload>,
    prompt: Option<String>,
    language: Option<String>,
}

/// Collect the multipart body. The file is the first field named in
/// `file_fields`, or failing that the first field carrying a filename.
async fn read_form(
    mut multipart: Multipart,
    file_fields: &[&str],
) -> Result<UploadForm, PipelineError> {
    let mut form = UploadForm::default();
    let malformed = |e: axum::extract::multipart::MultipartError| {
        PipelineError::invalid_input(format!("Malformed multipart body: {e}"))
    };

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);

        match name.as_str() {
            "prompt" => form.prompt = Some(field.text().await.map_err(malformed)?),
            "language" | "idioma" => form.language = Some(field.text().await.map_err(malformed)?),
            _ if form.file.is_none()
                && (file_fields.contains(&name.as_str()) || filename.is_some()) =>
            {
                let bytes = field.bytes().await.map_err(malformed)?;
                form.file = Some(RawUpload::new(bytes.to_vec(), filename));
            }
            _ => {}
        }
    }
    Ok(form)
}

fn require_file(form: &mut UploadForm, missing: &str) -> Result<RawUpload, PipelineError> {
    form.file
        .take()
        .ok_or_else(|| PipelineError::invalid_input(missing.to_string()))
}

// ── Handlers ────────────────────────────────────────────────────────────────

async fn chat(
    State(pipeline): State<Pipeline>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ReplyBody>, ApiError> {
    let reply = pipeline
        .chat(
            &req.text,
            req.language.as_deref(),
            req.system_prompt.as_deref(),
        )
        .await
        .map_err(at("chat"))?;
    Ok(Json(reply.into()))
}

async fn voice(
    State(pipeline): State<Pipeline>,
    multipart: Multipart,
) -> Result<Json<ReplyBody>, ApiError> {
    let mut form = read_form(multipart, &["audio"]).await.map_err(at("voice"))?;
    let audio = require_file(&mut form, "Audio file is empty").map_err(at("voice"))?;
    let reply = pipeline.voice(&audio).await.map_err(at("voice"))?;
    Ok(Json(reply.into()))
}

async fn image(
    State(pipeline): State<Pipeline>,
    multipart: Multipart,
) -> Result<Json<ReplyBody>, ApiError> {
    let mut form = read_form(multipart, &["image", "imagen"])
        .await
        .map_err(at("image"))?;
    let upload = require_file(&mut form, "Image file is empty").map_err(at("image"))?;
    let reply = pipeline
        .image(&upload, form.prompt.as_deref(), form.language.as_deref())
        .await
        .map_err(at("image"))?;
    Ok(Json(reply.into()))
}

async fn document(
    State(pipeline): State<Pipeline>,
    multipart: Multipart,
) -> Result<Json<ReplyBody>, ApiError> {
    let mut form = read_form(multipart, &["file", "archivo"])
        .await
        .map_err(at("document"))?;
    let upload = require_file(&mut form, "File is empty").map_err(at("document"))?;
    let reply = pipeline
        .document(&upload, form.prompt.as_deref(), form.language.as_deref())
        .await
        .map_err(at("document"))?;
    Ok(Json(reply.into()))
}

async fn classify(
    State(pipeline): State<Pipeline>,
    multipart: Multipart,
) -> Result<Json<ClassifyBody>, ApiError> {
    let mut form = read_form(multipart, &["file", "archivo"])
        .await
        .map_err(at("classification"))?;
    let upload = require_file(&mut form, "File is empty").map_err(at("classification"))?;
    let reply = pipeline
        .classify(&upload, form.language.as_deref())
        .await
        .map_err(at("classification"))?;
    Ok(Json(reply.into()))
}

async fn document_types(State(pipeline): State<Pipeline>) -> Json<DocumentTypesBody> {
    Json(DocumentTypesBody {
        types: pipeline.document_types(),
    })
}

async fn health(State(pipeline): State<Pipeline>) -> Json<HealthReport> {
    Json(pipeline.health())
}
