//! Pipeline stages for PDF-to-table extraction.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and backends (OCR engine, LLM) can be swapped without
//! touching the other stages.
//!
//! ## Data Flow
//!
//! ```text
//!           ┌──── non-blank ──────────────────────────┐
//! text ─────┤                                          ├──▶ llm ──▶ postprocess
//! (pdf-extract) └─ blank ─▶ render ─▶ encode ─▶ ocr ───┘   (Gemini)   (JSON recovery)
//!                        (pdfium)   (PNG)   (tesseract / vision)
//! ```
//!
//! 1. [`text`]: pull the embedded text layer; decide whether OCR is needed
//! 2. [`render`]: rasterise pages for OCR; blocking, so run off the runtime
//! 3. [`encode`]: PNG-encode rendered pages, base64 for vision models
//! 4. [`ocr`]: best-effort text recovery from page images
//! 5. [`llm`]: table extraction call with optional retry; the only stage
//!    whose failures are absorbed into the response body
//! 6. [`postprocess`]: recover the JSON object from the model reply

pub mod encode;
pub mod llm;
pub mod ocr;
pub mod postprocess;
pub mod render;
pub mod text;
