//! Configuration types for PDF-to-table extraction.
//!
//! All service behaviour is controlled through [`ExtractorConfig`], built via
//! its [`ExtractorConfigBuilder`]. The binary maps CLI flags and environment
//! variables onto the builder; tests construct configs directly and inject a
//! test double through [`ExtractorConfigBuilder::generator`].

use crate::error::Pdf2TableError;
use crate::pipeline::llm::TextGenerator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default Gemini REST endpoint root.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Default generation model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Provider name selecting the built-in Gemini REST client.
pub const GEMINI_PROVIDER: &str = "gemini";

/// Configuration for the extraction service.
///
/// Built via [`ExtractorConfig::builder()`] or using
/// [`ExtractorConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2table::ExtractorConfig;
///
/// let config = ExtractorConfig::builder()
///     .api_key("AIza...")
///     .prompt_char_limit(4000)
///     .build()
///     .unwrap();
/// assert!(config.api_key_configured());
/// ```
#[derive(Clone)]
pub struct ExtractorConfig {
    /// Credential for the Gemini REST backend. `None` or empty means the
    /// remote call is skipped and a text preview is returned instead.
    pub api_key: Option<String>,

    /// Generation backend. `"gemini"` (default) uses the built-in REST client;
    /// any other name (`openai`, `anthropic`, `ollama`, …) is resolved through
    /// the `edgequake-llm` provider factory.
    pub provider_name: String,

    /// Model identifier. Default: `gemini-2.5-flash`.
    pub model: String,

    /// Root URL of the Gemini REST API. Overridable for proxies and tests.
    pub api_base: String,

    /// Per-call timeout for the remote LLM in seconds. Default: 30.
    pub api_timeout_secs: u64,

    /// Retry attempts on a transient remote failure. Default: 0.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds; doubles after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Sampling temperature for provider-factory backends. Default: 0.1.
    pub temperature: f32,

    /// Maximum output tokens for provider-factory backends. Default: 4096.
    pub max_tokens: usize,

    /// Characters of extracted text embedded in the prompt. Default: 3000.
    ///
    /// A cost and latency control, not a correctness bound: invoices with long
    /// terms-and-conditions pages lose only the tail.
    pub prompt_char_limit: usize,

    /// Characters of extracted text echoed back when no credential is
    /// configured. Default: 500.
    pub preview_char_limit: usize,

    /// Largest accepted upload in bytes. Default: 10 MiB.
    pub max_upload_bytes: usize,

    /// Optical fallback engine used when the text layer is blank. Default: disabled.
    pub ocr: OcrMode,

    /// Rasterisation DPI for the optical fallback. Range: 72–600. Default: 300.
    pub ocr_dpi: u32,

    /// Cap on the longest rendered edge in pixels. Default: 4000.
    pub max_rendered_pixels: u32,

    /// Tesseract language code(s), e.g. `eng` or `deu+eng`. Default: `eng`.
    pub ocr_language: String,

    /// Tesseract executable. Default: `tesseract` (looked up on `PATH`).
    pub tesseract_command: String,

    /// Provider used by [`OcrMode::Vision`]. Default: `gemini`.
    pub vision_provider: String,

    /// Model used by [`OcrMode::Vision`]. Default: `gemini-2.5-flash`.
    pub vision_model: String,

    /// Explicit pdfium shared library. `None` binds to the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,

    /// Pre-constructed generation backend. Takes precedence over
    /// `provider_name` and `api_key`.
    pub generator: Option<Arc<dyn TextGenerator>>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider_name: GEMINI_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_timeout_secs: 30,
            max_retries: 0,
            retry_backoff_ms: 500,
            temperature: 0.1,
            max_tokens: 4096,
            prompt_char_limit: 3000,
            preview_char_limit: 500,
            max_upload_bytes: 10 * 1024 * 1024,
            ocr: OcrMode::default(),
            ocr_dpi: 300,
            max_rendered_pixels: 4000,
            ocr_language: "eng".to_string(),
            tesseract_command: "tesseract".to_string(),
            vision_provider: GEMINI_PROVIDER.to_string(),
            vision_model: DEFAULT_MODEL.to_string(),
            pdfium_lib_path: None,
            cors_origins: Vec::new(),
            generator: None,
        }
    }
}

impl fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("prompt_char_limit", &self.prompt_char_limit)
            .field("preview_char_limit", &self.preview_char_limit)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("ocr", &self.ocr)
            .field("ocr_dpi", &self.ocr_dpi)
            .field("generator", &self.generator.as_ref().map(|_| "<dyn TextGenerator>"))
            .finish()
    }
}

impl ExtractorConfig {
    /// Create a new builder for `ExtractorConfig`.
    pub fn builder() -> ExtractorConfigBuilder {
        ExtractorConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when a non-empty Gemini credential is present.
    pub fn api_key_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// True when the built-in Gemini REST client is the selected backend.
    pub fn uses_gemini_rest(&self) -> bool {
        self.provider_name.eq_ignore_ascii_case(GEMINI_PROVIDER)
    }
}

/// Builder for [`ExtractorConfig`].
#[derive(Debug)]
pub struct ExtractorConfigBuilder {
    config: ExtractorConfig,
}

impl ExtractorConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn prompt_char_limit(mut self, n: usize) -> Self {
        self.config.prompt_char_limit = n;
        self
    }

    pub fn preview_char_limit(mut self, n: usize) -> Self {
        self.config.preview_char_limit = n;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn ocr(mut self, mode: OcrMode) -> Self {
        self.config.ocr = mode;
        self
    }

    pub fn ocr_dpi(mut self, dpi: u32) -> Self {
        self.config.ocr_dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_command(mut self, cmd: impl Into<String>) -> Self {
        self.config.tesseract_command = cmd.into();
        self
    }

    pub fn vision_provider(mut self, name: impl Into<String>) -> Self {
        self.config.vision_provider = name.into();
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = model.into();
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn cors_origins(mut self, origins: Vec<String>) -> Self {
        self.config.cors_origins = origins;
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.config.generator = Some(generator);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractorConfig, Pdf2TableError> {
        let c = &self.config;
        if c.ocr_dpi < 72 || c.ocr_dpi > 600 {
            return Err(Pdf2TableError::InvalidConfig(format!(
                "OCR DPI must be 72–600, got {}",
                c.ocr_dpi
            )));
        }
        if c.prompt_char_limit == 0 {
            return Err(Pdf2TableError::InvalidConfig(
                "Prompt character limit must be ≥ 1".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(Pdf2TableError::InvalidConfig(
                "Maximum upload size must be ≥ 1 byte".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Pdf2TableError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.provider_name.trim().is_empty() {
            return Err(Pdf2TableError::InvalidConfig(
                "Provider name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Engine used for the optical fallback on image-only PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrMode {
    /// No optical fallback; blank text layers produce the soft "no text" response. (default)
    #[default]
    Disabled,
    /// Run the `tesseract` executable on each rasterised page.
    Tesseract,
    /// Ask a vision-capable LLM provider to transcribe each rasterised page.
    Vision,
}
