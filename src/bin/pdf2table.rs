//! CLI binary for edgequake-pdf2table.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractorConfig`, then either serves the HTTP API or extracts one file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf2table::config::{DEFAULT_MODEL, GEMINI_PROVIDER};
use edgequake_pdf2table::server::{self, shutdown_signal};
use edgequake_pdf2table::{ExtractorConfig, InvoiceExtractor, OcrMode};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the API on port 8000
  GEMINI_API_KEY=... pdf2table serve

  # Extract tables from one invoice and pretty-print the response
  pdf2table extract invoice.pdf --pretty

  # Scanned invoices: fall back to Tesseract when there is no text layer
  pdf2table --ocr tesseract --ocr-language deu+eng serve

  # Use another provider through edgequake-llm (reads OPENAI_API_KEY)
  pdf2table --provider openai --model gpt-4.1-mini extract invoice.pdf

WITHOUT A KEY:
  Uploads are still validated and their text extracted; the response carries
  "No API key configured" and the first 500 characters of the text.
"#;

/// Extract invoice tables from PDFs using an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2table",
    version,
    about = "Extract invoice tables from PDF files using an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "PDF2TABLE_BIND", default_value = "0.0.0.0:8000")]
        bind: String,
    },

    /// Extract tables from a local PDF and print the response JSON.
    Extract {
        /// PDF file to process.
        file: PathBuf,

        /// Pretty-print the JSON.
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Gemini API key. Without it, no LLM call is made.
    #[arg(long, env = "GEMINI_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Generation backend: gemini, or any edgequake-llm provider name.
    #[arg(long, env = "PDF2TABLE_PROVIDER", global = true, default_value = "gemini")]
    provider: String,

    /// Model ID. Defaults to gemini-2.5-flash for gemini; required otherwise.
    #[arg(long, env = "GEMINI_MODEL", global = true)]
    model: Option<String>,

    /// Gemini REST API root.
    #[arg(long, env = "GEMINI_API_BASE", global = true)]
    api_base: Option<String>,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PDF2TABLE_API_TIMEOUT", global = true, default_value_t = 30)]
    api_timeout: u64,

    /// Retries on transient LLM failures.
    #[arg(long, env = "PDF2TABLE_MAX_RETRIES", global = true, default_value_t = 0)]
    max_retries: u32,

    /// Base retry backoff in milliseconds, doubled per attempt.
    #[arg(long, env = "PDF2TABLE_RETRY_BACKOFF_MS", global = true, default_value_t = 500)]
    retry_backoff_ms: u64,

    /// Largest accepted upload in bytes.
    #[arg(long, env = "MAX_FILE_SIZE", global = true, default_value_t = 10 * 1024 * 1024)]
    max_file_size: usize,

    /// Characters of text sent to the model.
    #[arg(long, env = "PDF2TABLE_PROMPT_CHARS", global = true, default_value_t = 3000)]
    prompt_chars: usize,

    /// Characters of text previewed when no API key is configured.
    #[arg(long, env = "PDF2TABLE_PREVIEW_CHARS", global = true, default_value_t = 500)]
    preview_chars: usize,

    /// Fallback for PDFs without a text layer.
    #[arg(long, env = "PDF2TABLE_OCR", global = true, value_enum, default_value = "none")]
    ocr: OcrArg,

    /// Rasterisation DPI for OCR (72–600).
    #[arg(long, env = "PDF2TABLE_OCR_DPI", global = true, default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    ocr_dpi: u32,

    /// Tesseract language code(s).
    #[arg(long, env = "PDF2TABLE_OCR_LANGUAGE", global = true, default_value = "eng")]
    ocr_language: String,

    /// Tesseract executable.
    #[arg(long, env = "TESSERACT_CMD", global = true, default_value = "tesseract")]
    tesseract_command: String,

    /// Provider for `--ocr vision`.
    #[arg(long, env = "PDF2TABLE_VISION_PROVIDER", global = true, default_value = "gemini")]
    vision_provider: String,

    /// Model for `--ocr vision`. Defaults to gemini-2.5-flash for gemini.
    #[arg(long, env = "PDF2TABLE_VISION_MODEL", global = true)]
    vision_model: Option<String>,

    /// Explicit pdfium shared library for OCR rasterisation.
    #[arg(long, env = "PDFIUM_LIB_PATH", global = true)]
    pdfium_lib_path: Option<PathBuf>,

    /// Allowed CORS origin; repeat for several. Default: any.
    #[arg(long = "cors-origin", env = "PDF2TABLE_CORS_ORIGINS", global = true, value_delimiter = ',')]
    cors_origins: Vec<String>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TABLE_VERBOSE", global = true)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OcrArg {
    None,
    Tesseract,
    Vision,
}

impl From<OcrArg> for OcrMode {
    fn from(v: OcrArg) -> Self {
        match v {
            OcrArg::None => OcrMode::Disabled,
            OcrArg::Tesseract => OcrMode::Tesseract,
            OcrArg::Vision => OcrMode::Vision,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.opts.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli.opts)?;
    let extractor = InvoiceExtractor::new(config).context("Failed to initialise extractor")?;

    match cli.command {
        Command::Serve { bind } => {
            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("Failed to bind {}", bind))?;
            let router = server::router(Arc::new(extractor));
            server::serve(listener, router, shutdown_signal())
                .await
                .context("Server error")?;
        }
        Command::Extract { file, pretty } => {
            let response = extractor
                .extract_file(&file)
                .await
                .with_context(|| format!("Extraction failed for {}", file.display()))?;
            let json = if pretty {
                serde_json::to_string_pretty(&response)?
            } else {
                serde_json::to_string(&response)?
            };
            println!("{json}");
        }
    }

    Ok(())
}

/// The explicit model, or the Gemini default when `provider` is gemini.
fn model_for(provider: &str, model: Option<&str>, flag: &str) -> Result<String> {
    match model {
        Some(m) => Ok(m.to_string()),
        None if provider.eq_ignore_ascii_case(GEMINI_PROVIDER) => Ok(DEFAULT_MODEL.to_string()),
        None => anyhow::bail!("{flag} is required for provider '{provider}'"),
    }
}

/// Map CLI args to `ExtractorConfig`.
fn build_config(opts: &GlobalOpts) -> Result<ExtractorConfig> {
    let model = model_for(&opts.provider, opts.model.as_deref(), "--model")?;
    let ocr: OcrMode = opts.ocr.clone().into();
    let vision_model = match ocr {
        OcrMode::Vision => model_for(
            &opts.vision_provider,
            opts.vision_model.as_deref(),
            "--vision-model",
        )?,
        _ => opts
            .vision_model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
    };

    let mut builder = ExtractorConfig::builder()
        .provider_name(opts.provider.clone())
        .model(model)
        .api_timeout_secs(opts.api_timeout)
        .max_retries(opts.max_retries)
        .retry_backoff_ms(opts.retry_backoff_ms)
        .max_upload_bytes(opts.max_file_size)
        .prompt_char_limit(opts.prompt_chars)
        .preview_char_limit(opts.preview_chars)
        .ocr(ocr)
        .ocr_dpi(opts.ocr_dpi)
        .ocr_language(opts.ocr_language.clone())
        .tesseract_command(opts.tesseract_command.clone())
        .vision_provider(opts.vision_provider.clone())
        .vision_model(vision_model)
        .cors_origins(opts.cors_origins.clone());

    if let Some(ref key) = opts.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref base) = opts.api_base {
        builder = builder.api_base(base.clone());
    }
    if let Some(ref path) = opts.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path.clone());
    }

    builder.build().context("Invalid configuration")
}
