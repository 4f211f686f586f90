//! CLI binary for docvoice.
//!
//! `serve` runs the HTTP API. `sniff`, `describe` and `classify` run one
//! request against the configured collaborators from the terminal, which is
//! handy when checking a deployment.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docvoice::pipeline::input::load_upload;
use docvoice::server::{ClassifyBody, ReplyBody};
use docvoice::{detect, Pipeline, ServiceConfig};
use indicatif::{ProgressBar, ProgressStyle};
use pdfium_auto::PdfiumLocator;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the API against the default container hostnames
  docvoice serve --port 8000

  # Point at a local Ollama and local STT/TTS services
  docvoice --llm-url http://localhost:11434 \
           --stt-url http://localhost:8001 --tts-url http://localhost:8002 serve

  # What is this file, really?
  docvoice sniff upload.bin

  # Describe a document and keep the spoken answer
  docvoice describe invoice.docx --prompt "List the line items." --audio-out answer.ogg

  # Classify a scanned document from a URL
  docvoice classify https://example.com/scan.pdf

ENVIRONMENT VARIABLES:
  STT_URL, TTS_URL, LLM_URL   Collaborator base URLs
  LLM_MODEL, LLM_IMG_MODEL    Chat and vision model names
  SYSTEM_PROMPT               System prompt for chat and voice
  PDFIUM_LIB_PATH             Path to an existing libpdfium, skips auto-download
  PDFIUM_AUTO_CACHE_DIR       Override the default pdfium cache directory
  RUST_LOG                    Log filter, overrides --verbose/--quiet
"#;

/// Documents, images and voice in; text and speech out.
#[derive(Parser, Debug)]
#[command(
    name = "docvoice",
    version,
    about = "Document, image and voice pipeline with spoken replies",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    service: ServiceArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCVOICE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCVOICE_QUIET")]
    quiet: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "DOCVOICE_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long, env = "DOCVOICE_HOST", default_value = "0.0.0.0")]
        host: String,
        #[arg(long, env = "DOCVOICE_PORT", default_value_t = 8000)]
        port: u16,
    },
    /// Print the format detected from a file's bytes.
    Sniff {
        /// Local path or HTTP/HTTPS URL.
        input: String,
    },
    /// Analyse every page of a document or image and print the reply.
    Describe {
        /// Local path or HTTP/HTTPS URL.
        input: String,
        /// Instruction for the vision model.
        #[arg(long)]
        prompt: Option<String>,
        /// Reply language tag (auto-detected when omitted).
        #[arg(long)]
        language: Option<String>,
        /// Write the Ogg/Opus reply to this file.
        #[arg(long)]
        audio_out: Option<PathBuf>,
    },
    /// Classify a document from its first page and print the reply.
    Classify {
        /// Local path or HTTP/HTTPS URL.
        input: String,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        audio_out: Option<PathBuf>,
    },
}

/// Every [`ServiceConfig`] field, as flags with environment fallbacks.
#[derive(Args, Debug)]
struct ServiceArgs {
    #[arg(long, global = true, env = "STT_URL", default_value = "http://stt:8000")]
    stt_url: String,

    #[arg(long, global = true, env = "TTS_URL", default_value = "http://tts:8000")]
    tts_url: String,

    #[arg(long, global = true, env = "LLM_URL", default_value = "http://llm:11434")]
    llm_url: String,

    #[arg(long, global = true, env = "LLM_MODEL", default_value = "qwen2.5:7b")]
    chat_model: String,

    #[arg(long, global = true, env = "LLM_IMG_MODEL", default_value = "llava:7b")]
    vision_model: String,

    /// Route inference through an edgequake-llm provider (openai, anthropic,
    /// gemini, ollama, ...) instead of the Ollama-style endpoint.
    #[arg(long, global = true, env = "DOCVOICE_INFERENCE_PROVIDER")]
    inference_provider: Option<String>,

    #[arg(long, global = true, env = "SYSTEM_PROMPT")]
    system_prompt: Option<String>,

    #[arg(long, global = true, env = "DOCVOICE_VISION_SYSTEM_PROMPT")]
    vision_system_prompt: Option<String>,

    #[arg(long, global = true, env = "DOCVOICE_DEFAULT_LANGUAGE", default_value = "es")]
    default_language: String,

    /// Rendering DPI (72–400).
    #[arg(long, global = true, env = "DOCVOICE_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    #[arg(long, global = true, env = "DOCVOICE_MAX_RENDERED_PIXELS", default_value_t = 2000)]
    max_rendered_pixels: u32,

    #[arg(long, global = true, env = "DOCVOICE_OFFICE_TIMEOUT", default_value_t = 120)]
    office_timeout: u64,

    #[arg(long, global = true, env = "DOCVOICE_ENCODER_TIMEOUT", default_value_t = 60)]
    encoder_timeout: u64,

    /// Total timeout for collaborator HTTP calls, in seconds.
    #[arg(long, global = true, env = "DOCVOICE_REQUEST_TIMEOUT", default_value_t = 300)]
    request_timeout: u64,

    #[arg(long, global = true, env = "DOCVOICE_CONNECT_TIMEOUT", default_value_t = 30)]
    connect_timeout: u64,

    #[arg(long, global = true, env = "DOCVOICE_CONVERTER_BIN", default_value = "libreoffice")]
    converter_bin: PathBuf,

    #[arg(long, global = true, env = "DOCVOICE_ENCODER_BIN", default_value = "ffmpeg")]
    encoder_bin: PathBuf,

    #[arg(long, global = true, env = "DOCVOICE_OPUS_BITRATE", default_value = "48k")]
    opus_bitrate: String,

    /// Largest accepted upload, in bytes.
    #[arg(long, global = true, env = "DOCVOICE_MAX_UPLOAD_BYTES", default_value_t = 50 * 1024 * 1024)]
    max_upload_bytes: usize,

    /// Path to libpdfium; searched for and downloaded when omitted.
    #[arg(long, global = true, env = "DOCVOICE_PDFIUM_LIBRARY")]
    pdfium_library: Option<PathBuf>,
}

impl ServiceArgs {
    fn to_config(&self) -> Result<ServiceConfig> {
        let mut builder = ServiceConfig::builder()
            .stt_url(&self.stt_url)
            .tts_url(&self.tts_url)
            .llm_url(&self.llm_url)
            .chat_model(&self.chat_model)
            .vision_model(&self.vision_model)
            .default_language(&self.default_language)
            .dpi(self.dpi)
            .max_rendered_pixels(self.max_rendered_pixels)
            .office_timeout_secs(self.office_timeout)
            .encoder_timeout_secs(self.encoder_timeout)
            .request_timeout_secs(self.request_timeout)
            .connect_timeout_secs(self.connect_timeout)
            .converter_bin(&self.converter_bin)
            .encoder_bin(&self.encoder_bin)
            .opus_bitrate(&self.opus_bitrate)
            .max_upload_bytes(self.max_upload_bytes);

        if let Some(ref name) = self.inference_provider {
            builder = builder.inference_provider(name);
        }
        if let Some(ref prompt) = self.system_prompt {
            builder = builder.system_prompt(prompt);
        }
        if let Some(ref prompt) = self.vision_system_prompt {
            builder = builder.vision_system_prompt(prompt);
        }
        if let Some(ref path) = self.pdfium_library {
            builder = builder.pdfium_library(path);
        }
        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match cli.command {
        Command::Serve { ref host, port } => {
            let config = cli.service.to_config()?;
            ensure_pdfium(&config, cli.quiet)?;
            let pipeline = Pipeline::from_config(config).context("Failed to start pipeline")?;
            docvoice::server::serve(pipeline, &format!("{host}:{port}"))
                .await
                .context("HTTP server failed")?;
        }
        Command::Sniff { ref input } => {
            let config = cli.service.to_config()?;
            let upload = load_upload(input, config.request_timeout_secs)
                .await
                .with_context(|| format!("Failed to load {input}"))?;
            println!("{}", detect(&upload.bytes));
        }
        Command::Describe {
            ref input,
            ref prompt,
            ref language,
            ref audio_out,
        } => {
            let config = cli.service.to_config()?;
            ensure_pdfium(&config, cli.quiet)?;
            let timeout = config.request_timeout_secs;
            let pipeline = Pipeline::from_config(config).context("Failed to start pipeline")?;
            let upload = load_upload(input, timeout)
                .await
                .with_context(|| format!("Failed to load {input}"))?;

            let spinner = spinner(cli.quiet, "Analysing");
            let result = pipeline
                .document(&upload, prompt.as_deref(), language.as_deref())
                .await;
            spinner.finish_and_clear();
            let reply = result.context("Document analysis failed")?;

            write_audio(audio_out.as_deref(), &reply.audio).await?;
            print_json(&ReplyBody::from(reply), audio_out.is_some())?;
        }
        Command::Classify {
            ref input,
            ref language,
            ref audio_out,
        } => {
            let config = cli.service.to_config()?;
            ensure_pdfium(&config, cli.quiet)?;
            let timeout = config.request_timeout_secs;
            let pipeline = Pipeline::from_config(config).context("Failed to start pipeline")?;
            let upload = load_upload(input, timeout)
                .await
                .with_context(|| format!("Failed to load {input}"))?;

            let spinner = spinner(cli.quiet, "Classifying");
            let result = pipeline.classify(&upload, language.as_deref()).await;
            spinner.finish_and_clear();
            let reply = result.context("Classification failed")?;

            write_audio(audio_out.as_deref(), &reply.reply.audio).await?;
            print_json(&ClassifyBody::from(reply), audio_out.is_some())?;
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli) {
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
}

/// Make sure libpdfium is on disk before the first request needs it.
///
/// On the very first run this downloads the library (~30 MB) into the cache;
/// later runs only check the path.
fn ensure_pdfium(config: &ServiceConfig, quiet: bool) -> Result<()> {
    let mut locator = PdfiumLocator::new();
    if let Some(ref path) = config.pdfium_library {
        locator = locator.with_library_path(path);
    }
    if locator.find_local().is_some() {
        return Ok(());
    }

    let bar = spinner(quiet, "PDF engine");
    bar.set_message(format!("downloading into {}", locator.cache_dir().display()));
    let located = tokio::task::block_in_place(|| locator.locate());
    match located {
        Ok(path) => {
            bar.finish_with_message(format!("ready ✓ {}", path.display()));
            Ok(())
        }
        Err(e) => {
            bar.finish_and_clear();
            Err(e).context("Failed to download PDFium engine")
        }
    }
}

fn spinner(quiet: bool, prefix: &'static str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix(prefix);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

async fn write_audio(path: Option<&Path>, audio: &[u8]) -> Result<()> {
    if let Some(path) = path {
        tokio::fs::write(path, audio)
            .await
            .with_context(|| format!("Failed to write audio to {}", path.display()))?;
        tracing::info!("Wrote {} bytes of audio to {}", audio.len(), path.display());
    }
    Ok(())
}

/// Print the reply as pretty JSON. The base64 audio is dropped unless it was
/// also written to a file; it is rarely useful on a terminal.
fn print_json<T: serde::Serialize>(body: &T, keep_audio: bool) -> Result<()> {
    let mut value = serde_json::to_value(body).context("Failed to serialise reply")?;
    if !keep_audio {
        if let Some(obj) = value.as_object_mut() {
            obj.remove("audioBase64");
        }
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&value).context("Failed to serialise reply")?
    );
    Ok(())
}
