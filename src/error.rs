//! Error types for the edgequake-pdf2table library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2TableError`]: **Fatal for the request**: the upload cannot be
//!   processed at all (wrong file type, too large, unreadable container).
//!   Each variant maps to exactly one HTTP status via
//!   [`Pdf2TableError::status_code`].
//!
//! * [`GenerationError`]: **Absorbed**: the remote LLM call failed. It never
//!   leaves the table-extraction stage; it is turned into an inline `error`
//!   field of [`crate::output::ExtractionResult`] instead.

use axum::http::StatusCode;
use thiserror::Error;

/// All request-level errors returned by the extraction pipeline.
#[derive(Debug, Error)]
pub enum Pdf2TableError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// Declared filename does not carry a `.pdf` suffix.
    #[error("Only PDF files are allowed")]
    InvalidFileType { filename: String },

    /// The multipart request did not contain a file field.
    #[error("No file uploaded; send the PDF in the `file` form field")]
    MissingUpload,

    /// Upload exceeds the configured maximum.
    #[error("File too large: {size} bytes exceeds the {max} byte limit")]
    FileTooLarge { size: usize, max: usize },

    /// The multipart body itself could not be read.
    #[error("Malformed upload: {detail}")]
    MalformedUpload { status: StatusCode, detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The PDF container could not be parsed at all.
    #[error("Could not read PDF: {detail}")]
    UnreadablePdf { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("{0}")]
    Internal(String),
}

impl Pdf2TableError {
    /// HTTP status the request handler answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Pdf2TableError::InvalidFileType { .. } | Pdf2TableError::MissingUpload => {
                StatusCode::BAD_REQUEST
            }
            Pdf2TableError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Pdf2TableError::MalformedUpload { status, .. } => *status,
            Pdf2TableError::UnreadablePdf { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Pdf2TableError::InvalidConfig(_) | Pdf2TableError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// A failed call to the remote generation backend.
///
/// Stays inside [`crate::pipeline::llm`]; the client converts it into the
/// `error` field of the extraction result.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Connection refused, DNS failure, TLS error, reset mid-body.
    #[error("transport error: {0}")]
    Transport(String),

    /// The call exceeded the configured timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The endpoint answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// 2xx response whose envelope did not contain generated text.
    #[error("unexpected response envelope: {0}")]
    Envelope(String),

    /// Error reported by an `edgequake-llm` provider.
    #[error("provider error: {0}")]
    Provider(String),
}

/// A failure on the optical fallback path.
///
/// Never surfaces to the caller: the fallback logs it and yields no text.
#[derive(Debug, Error)]
pub enum OcrError {
    /// Could not bind to a pdfium library.
    #[error("Failed to bind to pdfium library: {0}")]
    PdfiumBinding(String),

    /// pdfium could not open the document.
    #[error("pdfium could not open the document: {0}")]
    Load(String),

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    Rasterisation { page: usize, detail: String },

    /// PNG encoding of a rendered page failed.
    #[error("Image encoding failed for page {page}: {detail}")]
    Encoding { page: usize, detail: String },

    /// The OCR engine failed on a page.
    #[error("OCR engine '{engine}' failed on page {page}: {detail}")]
    Engine {
        engine: String,
        page: usize,
        detail: String,
    },

    /// Temp-file or subprocess I/O failed.
    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking render task panicked or was cancelled.
    #[error("Render task failed: {0}")]
    Task(String),
}

impl GenerationError {
    /// Whether retrying the same request may succeed.
    ///
    /// Timeouts, connection failures, 429 and 5xx are transient. Other 4xx
    /// (bad key, bad request) and envelope errors will fail identically.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Transport(_) | GenerationError::Timeout { .. } => true,
            GenerationError::Status { status, .. } => *status == 429 || *status >= 500,
            GenerationError::Envelope(_) => false,
            GenerationError::Provider(msg) => {
                let m = msg.to_ascii_lowercase();
                m.contains("timeout") || m.contains("rate limit") || m.contains("429")
            }
        }
    }
}
