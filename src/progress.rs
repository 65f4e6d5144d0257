//! Observer trait for per-request extraction events.
//!
//! Attach an [`Arc<dyn PipelineObserver>`] via
//! [`crate::extract::InvoiceExtractor::with_observer`] to receive events as
//! each upload moves through the pipeline.
//!
//! # Why an observer instead of logging inline?
//!
//! The pipeline stays free of any particular metrics backend: hosts can
//! forward events to a counter, a database record, or (the default)
//! [`TracingObserver`], which turns them into structured `tracing` events.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2table::{PipelineObserver, TextSource};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct ScanCounter {
//!     scanned: Arc<AtomicUsize>,
//! }
//!
//! impl PipelineObserver for ScanCounter {
//!     fn on_text_extracted(&self, _filename: &str, source: TextSource, _chars: usize) {
//!         if source == TextSource::Optical {
//!             self.scanned.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//! ```

use crate::error::Pdf2TableError;
use crate::output::ExtractionResult;
use crate::pipeline::text::TextSource;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Called by the extraction pipeline at each stage of a request.
///
/// Requests are handled concurrently, so implementations must be
/// `Send + Sync` and protect shared mutable state. All methods default to
/// no-ops.
pub trait PipelineObserver: Send + Sync {
    /// An upload was accepted for processing.
    fn on_received(&self, filename: &str, size_bytes: usize) {
        let _ = (filename, size_bytes);
    }

    /// The upload was rejected with a request-level error.
    fn on_rejected(&self, filename: &str, error: &Pdf2TableError) {
        let _ = (filename, error);
    }

    /// Non-blank text is available for table extraction.
    ///
    /// # Arguments
    /// * `source`: direct text layer or OCR
    /// * `chars`: character count of the text
    fn on_text_extracted(&self, filename: &str, source: TextSource, chars: usize) {
        let _ = (filename, source, chars);
    }

    /// The optical fallback ran; `chars` is what it recovered (possibly 0).
    fn on_ocr_attempted(&self, filename: &str, chars: usize) {
        let _ = (filename, chars);
    }

    /// Table extraction finished, with or without an inline error.
    fn on_tables_extracted(&self, filename: &str, result: &ExtractionResult, elapsed_ms: u64) {
        let _ = (filename, result, elapsed_ms);
    }

    /// A response body was produced.
    fn on_responded(&self, filename: &str, success: bool, elapsed_ms: u64) {
        let _ = (filename, success, elapsed_ms);
    }
}

/// Emits every event as a `tracing` event. The default observer.
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_received(&self, filename: &str, size_bytes: usize) {
        info!(filename, size_bytes, "upload received");
    }

    fn on_rejected(&self, filename: &str, error: &Pdf2TableError) {
        warn!(
            filename,
            status = error.status_code().as_u16(),
            "upload rejected: {}",
            error
        );
    }

    fn on_text_extracted(&self, filename: &str, source: TextSource, chars: usize) {
        debug!(filename, ?source, chars, "text extracted");
    }

    fn on_ocr_attempted(&self, filename: &str, chars: usize) {
        info!(filename, chars, "optical fallback attempted");
    }

    fn on_tables_extracted(&self, filename: &str, result: &ExtractionResult, elapsed_ms: u64) {
        match result.error.as_deref() {
            Some(err) => warn!(filename, elapsed_ms, "table extraction degraded: {}", err),
            None => info!(
                filename,
                tables = result.tables.len(),
                elapsed_ms,
                "tables extracted"
            ),
        }
    }

    fn on_responded(&self, filename: &str, success: bool, elapsed_ms: u64) {
        info!(filename, success, elapsed_ms, "response ready");
    }
}

/// Convenience alias for the type held by the extractor.
pub type Observer = Arc<dyn PipelineObserver>;
