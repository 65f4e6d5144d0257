//! Request pipeline: one uploaded PDF in, one [`ExtractResponse`] out.
//!
//! ```text
//! Received ─▶ Validated ─▶ TextExtracted ─▶ [OCRAttempted] ─▶ TableExtracted ─▶ Responded
//!    │            │              │
//!    └────────────┴──────────────┴──▶ Rejected (400 / 413 / 422)
//! ```
//!
//! [`InvoiceExtractor`] is built once at startup and shared immutably across
//! requests behind an `Arc`. Each call to [`InvoiceExtractor::extract_upload`]
//! runs strictly sequentially.

use crate::config::ExtractorConfig;
use crate::error::Pdf2TableError;
use crate::output::{ExtractResponse, ExtractionResult};
use crate::pipeline::llm::TableExtractionClient;
use crate::pipeline::ocr::OpticalFallback;
use crate::pipeline::text::{self, TextSource};
use crate::progress::{Observer, TracingObserver};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// A PDF as received from the caller.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// Filename declared by the uploader; only its suffix is trusted.
    pub filename: String,
    pub bytes: Arc<[u8]>,
}

impl UploadedDocument {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// True when `filename` ends in `.pdf`, case-insensitively.
pub fn is_pdf_filename(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".pdf")
}

/// Reject any filename without a `.pdf` suffix.
pub fn validate_filename(filename: &str) -> Result<(), Pdf2TableError> {
    if is_pdf_filename(filename) {
        Ok(())
    } else {
        Err(Pdf2TableError::InvalidFileType {
            filename: filename.to_string(),
        })
    }
}

/// Shared extraction service: text layer, optional OCR, table extraction.
pub struct InvoiceExtractor {
    config: ExtractorConfig,
    tables: TableExtractionClient,
    optical: Option<OpticalFallback>,
    observer: Observer,
}

impl InvoiceExtractor {
    /// Build the extractor, resolving the LLM backend and OCR engine from
    /// `config`.
    pub fn new(config: ExtractorConfig) -> Result<Self, Pdf2TableError> {
        let tables = TableExtractionClient::from_config(&config)?;
        let optical = OpticalFallback::from_config(&config);
        if !tables.credential_configured() {
            info!("No LLM credential configured; responses will carry a text preview only");
        }
        Ok(Self {
            config,
            tables,
            optical,
            observer: Arc::new(TracingObserver),
        })
    }

    /// Replace the optical fallback (or enable one when OCR is off in config).
    pub fn with_optical_fallback(mut self, fallback: OpticalFallback) -> Self {
        self.optical = Some(fallback);
        self
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Whether the table-extraction backend has a credential.
    pub fn api_key_configured(&self) -> bool {
        self.tables.credential_configured()
    }

    pub fn ocr_available(&self) -> bool {
        self.optical.is_some()
    }

    /// Run the full pipeline for one upload.
    ///
    /// # Errors
    /// Only request-level failures: wrong file type (400), oversized upload
    /// (413), unreadable PDF container (422), or an internal task failure
    /// (500). A blank text layer and every remote-LLM failure are reported
    /// inside the `Ok` body.
    pub async fn extract_upload(
        &self,
        upload: UploadedDocument,
    ) -> Result<ExtractResponse, Pdf2TableError> {
        let start = Instant::now();
        let filename = upload.filename.clone();
        self.observer.on_received(&filename, upload.bytes.len());

        match self.run(upload).await {
            Ok(response) => {
                self.observer.on_responded(
                    &filename,
                    response.success,
                    start.elapsed().as_millis() as u64,
                );
                Ok(response)
            }
            Err(e) => {
                self.observer.on_rejected(&filename, &e);
                Err(e)
            }
        }
    }

    async fn run(&self, upload: UploadedDocument) -> Result<ExtractResponse, Pdf2TableError> {
        // ── Step 1: Validate ─────────────────────────────────────────────────
        validate_filename(&upload.filename)?;

        let size = upload.bytes.len();
        if size > self.config.max_upload_bytes {
            return Err(Pdf2TableError::FileTooLarge {
                size,
                max: self.config.max_upload_bytes,
            });
        }

        // ── Step 2: Text layer ───────────────────────────────────────────────
        let bytes = Arc::clone(&upload.bytes);
        let direct = tokio::task::spawn_blocking(move || text::extract_text(&bytes))
            .await
            .map_err(|e| Pdf2TableError::Internal(format!("Text extraction task failed: {e}")))??;

        // ── Step 3: Choose source, OCR if needed ─────────────────────────────
        let (source, text) = match text::choose_source(&direct, self.optical.is_some()) {
            Some(TextSource::Direct) => (TextSource::Direct, direct),
            Some(TextSource::Optical) => {
                let recovered = match self.optical {
                    Some(ref optical) => {
                        debug!("{}: blank text layer, trying {}", upload.filename, optical.engine_name());
                        optical.recover_text(Arc::clone(&upload.bytes)).await
                    }
                    None => String::new(),
                };
                self.observer
                    .on_ocr_attempted(&upload.filename, recovered.chars().count());
                (TextSource::Optical, recovered)
            }
            None => (TextSource::Direct, direct),
        };

        if text::is_blank(&text) {
            info!("{}: no text found", upload.filename);
            return Ok(ExtractResponse {
                success: false,
                filename: upload.filename,
                data: ExtractionResult::no_text(),
            });
        }

        self.observer
            .on_text_extracted(&upload.filename, source, text.chars().count());

        // ── Step 4: Tables ───────────────────────────────────────────────────
        let llm_start = Instant::now();
        let data = self.tables.extract_tables(&text).await;
        self.observer.on_tables_extracted(
            &upload.filename,
            &data,
            llm_start.elapsed().as_millis() as u64,
        );

        Ok(ExtractResponse {
            success: true,
            filename: upload.filename,
            data,
        })
    }

    /// Run the pipeline on a local file, using its file name as the
    /// declared filename.
    pub async fn extract_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<ExtractResponse, Pdf2TableError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            Pdf2TableError::Internal(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.extract_upload(UploadedDocument::new(filename, bytes))
            .await
    }
}
