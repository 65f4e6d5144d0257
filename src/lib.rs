//! # edgequake-pdf2table
//!
//! Extract invoice tables from PDF documents with a Large Language Model.
//!
//! ## Why this crate?
//!
//! Invoice PDFs rarely carry machine-readable tables: a "table" is just text
//! positioned on a page. This crate pulls the text layer, asks an LLM to
//! reconstruct the tables and a short summary as JSON, and serves the result
//! over a small HTTP API. Scanned invoices without a text layer can fall
//! back to OCR.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Validate   `.pdf` suffix, size limit
//!  ├─ 2. Text       pdf-extract text layer (spawn_blocking)
//!  ├─ 3. OCR        optional: pdfium render → tesseract / vision model
//!  ├─ 4. LLM        Gemini generateContent, or any edgequake-llm provider
//!  ├─ 5. Recover    strip fences / prose around the JSON object
//!  └─ 6. Respond    {"success", "filename", "data": {tables, summary, …}}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2table::{ExtractorConfig, InvoiceExtractor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractorConfig::builder()
//!         .api_key(std::env::var("GEMINI_API_KEY")?)
//!         .build()?;
//!     let extractor = InvoiceExtractor::new(config)?;
//!     let response = extractor.extract_file("invoice.pdf").await?;
//!     for table in &response.data.tables {
//!         println!("{}: {} rows", table.title, table.rows.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2table` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractorConfig, ExtractorConfigBuilder, OcrMode};
pub use error::{GenerationError, OcrError, Pdf2TableError};
pub use extract::{InvoiceExtractor, UploadedDocument};
pub use output::{ExtractResponse, ExtractionResult, Summary, Table};
pub use pipeline::llm::{TableExtractionClient, TextGenerator};
pub use pipeline::ocr::{OcrEngine, OpticalFallback};
pub use pipeline::render::{PageRasterizer, RenderedPage};
pub use pipeline::text::TextSource;
pub use progress::{Observer, PipelineObserver, TracingObserver};
pub use server::router;
