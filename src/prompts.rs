//! Prompts for LLM-based table extraction and page transcription.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: changing what the model is asked for
//!    requires editing exactly one place.
//!
//! 2. **Testability**: unit tests can import and inspect prompts directly
//!    without calling a real model.

/// Instruction prepended to the invoice text.
///
/// The embedded example biases the model toward the exact
/// [`crate::output::ExtractionResult`] shape.
pub const TABLE_EXTRACTION_PROMPT: &str = r#"Extract all tabular data from this text. Focus on invoice data:
invoice numbers, dates, vendor and customer details, line items with
descriptions and amounts, subtotals and totals.

Return ONLY valid JSON with this exact structure:
{
    "tables": [
        {
            "title": "Invoice Items",
            "headers": ["Description", "Quantity", "Price", "Total"],
            "rows": [["Item 1", "2", "$10", "$20"]]
        }
    ],
    "summary": {
        "total_amount": 100,
        "invoice_count": 1,
        "date_range": "2024-2025"
    }
}

If no tabular data is found, return {"tables": [], "summary": null}

Text: "#;

/// System prompt for the vision OCR engine: plain transcription, no Markdown.
pub const PAGE_TRANSCRIPTION_PROMPT: &str = r#"You are an OCR engine. Transcribe ALL text visible on this scanned document page.

Rules:
- Preserve reading order as a human would read the page
- Keep table rows on one line each, separating cells with " | "
- Keep numbers, currency symbols and dates exactly as printed
- Output ONLY the transcribed text, with no commentary and no code fences"#;

/// Return at most the first `limit` characters of `text`.
///
/// Counts Unicode scalar values, never splitting a character.
pub fn char_prefix(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Build the full table-extraction prompt for `text`, truncated to `char_limit`.
pub fn table_extraction_prompt(text: &str, char_limit: usize) -> String {
    let body = char_prefix(text, char_limit);
    let mut prompt = String::with_capacity(TABLE_EXTRACTION_PROMPT.len() + body.len());
    prompt.push_str(TABLE_EXTRACTION_PROMPT);
    prompt.push_str(body);
    prompt
}
