//! Text-layer extraction from PDF bytes.
//!
//! Uses `pdf-extract`, a pure-Rust parser, so the common path needs no
//! native library. Pages are concatenated in order with a newline after each
//! page's text.
//!
//! `pdf-extract` can panic on malformed content streams; the call is wrapped
//! in `catch_unwind` and a panic is reported as an unreadable PDF.
//!
//! The functions here are blocking. Callers on an async runtime run them via
//! `tokio::task::spawn_blocking`.

use crate::error::Pdf2TableError;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::debug;

/// How far into the upload the `%PDF` marker may appear.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Where the text handed to table extraction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSource {
    /// The PDF's embedded text layer.
    Direct,
    /// OCR of rasterised pages.
    Optical,
}

/// True when `text` holds nothing but whitespace.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Decide which text source to use next.
///
/// A non-blank direct text layer always wins. A blank one falls back to OCR
/// when an engine is available; otherwise there is nothing to extract.
pub fn choose_source(direct_text: &str, optical_available: bool) -> Option<TextSource> {
    if !is_blank(direct_text) {
        Some(TextSource::Direct)
    } else if optical_available {
        Some(TextSource::Optical)
    } else {
        None
    }
}

/// Extract the text layer of every page, in page order.
///
/// # Errors
/// [`Pdf2TableError::UnreadablePdf`] when the bytes are not a parseable PDF
/// container. A valid PDF without a text layer returns `Ok` with blank text.
pub fn extract_text(bytes: &[u8]) -> Result<String, Pdf2TableError> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if !window.windows(4).any(|w| w == b"%PDF") {
        return Err(Pdf2TableError::UnreadablePdf {
            detail: "missing %PDF header".to_string(),
        });
    }

    let pages = catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }))
    .map_err(|_| Pdf2TableError::UnreadablePdf {
        detail: "parser panicked on malformed content".to_string(),
    })?
    .map_err(|e| Pdf2TableError::UnreadablePdf {
        detail: e.to_string(),
    })?;

    let mut text = String::new();
    for page in &pages {
        text.push_str(page);
        text.push('\n');
    }

    debug!(
        "Text layer: {} pages, {} chars",
        pages.len(),
        text.chars().count()
    );
    Ok(text)
}
