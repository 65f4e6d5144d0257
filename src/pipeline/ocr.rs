//! Optical fallback for PDFs whose text layer is blank.
//!
//! Scanned invoices carry their content as images, so direct text
//! extraction yields nothing. When configured, the pipeline rasterises each
//! page ([`super::render`]) and hands it to an [`OcrEngine`]:
//!
//! * [`TesseractOcr`]: shells out to the `tesseract` CLI.
//! * [`VisionOcr`]: asks an `edgequake-llm` vision model to transcribe the
//!   page image.
//!
//! The fallback is best-effort. Any rasterisation or recognition failure is
//! logged and produces empty text, which the pipeline then reports as
//! "no text found".

use crate::config::{ExtractorConfig, OcrMode};
use crate::error::OcrError;
use crate::pipeline::encode::to_image_data;
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer, RenderedPage};
use crate::prompts::PAGE_TRANSCRIPTION_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::io::Write;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Recognises the text on one rendered page.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn recognize(&self, page: &RenderedPage) -> Result<String, OcrError>;
}

// ── Tesseract ────────────────────────────────────────────────────────────────

/// Runs `tesseract <image> stdout -l <language>` on a temp PNG per page.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    command: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, page: &RenderedPage) -> Result<String, OcrError> {
        let mut tmp = tempfile::Builder::new()
            .prefix("pdf2table-page-")
            .suffix(".png")
            .tempfile()?;
        tmp.write_all(&page.png)?;
        tmp.flush()?;

        let output = Command::new(&self.command)
            .arg(tmp.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .await?;

        if !output.status.success() {
            return Err(OcrError::Engine {
                engine: self.name().to_string(),
                page: page.page_num,
                detail: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ── Vision model ─────────────────────────────────────────────────────────────

/// Transcribes pages with a vision-capable chat model.
pub struct VisionOcr {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl VisionOcr {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractorConfig) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(0.0),
                max_tokens: Some(config.max_tokens),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    fn name(&self) -> &str {
        "vision"
    }

    async fn recognize(&self, page: &RenderedPage) -> Result<String, OcrError> {
        let messages = vec![
            ChatMessage::system(PAGE_TRANSCRIPTION_PROMPT),
            ChatMessage::user_with_images("", vec![to_image_data(&page.png)]),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| OcrError::Engine {
                engine: self.name().to_string(),
                page: page.page_num,
                detail: format!("{}", e),
            })?;

        debug!(
            "Page {}: vision OCR {} input tokens, {} output tokens",
            page.page_num, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Build the engine selected by [`ExtractorConfig::ocr`].
///
/// Returns `None` when OCR is disabled or the vision provider cannot be
/// constructed.
pub fn engine_from_config(config: &ExtractorConfig) -> Option<Arc<dyn OcrEngine>> {
    match config.ocr {
        OcrMode::Disabled => None,
        OcrMode::Tesseract => Some(Arc::new(TesseractOcr::new(
            config.tesseract_command.clone(),
            config.ocr_language.clone(),
        ))),
        OcrMode::Vision => {
            match ProviderFactory::create_llm_provider(&config.vision_provider, &config.vision_model)
            {
                Ok(provider) => Some(Arc::new(VisionOcr::new(provider, config))),
                Err(e) => {
                    warn!(
                        "Vision OCR provider '{}' unavailable ({}); OCR disabled",
                        config.vision_provider, e
                    );
                    None
                }
            }
        }
    }
}

// ── Fallback driver ──────────────────────────────────────────────────────────

/// Rasterise-then-recognise driver used when the text layer is blank.
#[derive(Clone)]
pub struct OpticalFallback {
    rasterizer: Arc<dyn PageRasterizer>,
    engine: Arc<dyn OcrEngine>,
}

impl OpticalFallback {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, engine: Arc<dyn OcrEngine>) -> Self {
        Self { rasterizer, engine }
    }

    /// pdfium rasteriser plus the configured engine, or `None` when OCR is off.
    pub fn from_config(config: &ExtractorConfig) -> Option<Self> {
        let engine = engine_from_config(config)?;
        let rasterizer = PdfiumRasterizer::new(
            config.ocr_dpi,
            config.max_rendered_pixels,
            config.pdfium_lib_path.clone(),
        );
        info!("Optical fallback enabled: {}", engine.name());
        Some(Self::new(Arc::new(rasterizer), engine))
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Recover text from `bytes` by OCR. Never fails; errors yield `""`.
    pub async fn recover_text(&self, bytes: Arc<[u8]>) -> String {
        match self.try_recover_text(bytes).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Optical fallback failed: {}", e);
                String::new()
            }
        }
    }

    async fn try_recover_text(&self, bytes: Arc<[u8]>) -> Result<String, OcrError> {
        let pages = self.rasterize(bytes).await?;
        self.ocr_text(&pages).await
    }

    /// Render every page on the blocking pool.
    pub async fn rasterize(&self, bytes: Arc<[u8]>) -> Result<Vec<RenderedPage>, OcrError> {
        let rasterizer = Arc::clone(&self.rasterizer);
        tokio::task::spawn_blocking(move || rasterizer.rasterize(&bytes))
            .await
            .map_err(|e| OcrError::Task(e.to_string()))?
    }

    /// Recognise `pages` in order, joining them with `\n`. Stops at the
    /// first failing page.
    pub async fn ocr_text(&self, pages: &[RenderedPage]) -> Result<String, OcrError> {
        let mut text = String::new();
        for page in pages {
            let page_text = self.engine.recognize(page).await?;
            debug!(
                "Page {} ({}x{} px): {} chars via {}",
                page.page_num,
                page.width,
                page.height,
                page_text.chars().count(),
                self.engine.name()
            );
            text.push_str(&page_text);
            text.push('\n');
        }
        Ok(text)
    }
}
