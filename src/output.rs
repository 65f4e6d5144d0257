//! Output types: the extraction result and the HTTP response envelope.
//!
//! ## Contract
//!
//! Callers depend on exactly two keys of [`ExtractionResult`]: `tables`
//! (always present, possibly `[]`) and `summary` (always present, possibly
//! `null`). Everything else (`error`, `message`, `text_preview`,
//! `raw_response`, extra keys the model chose to emit) is advisory.
//!
//! ## Lenient decoding
//!
//! The model is asked for strings everywhere, but it regularly answers with
//! numbers in cells (`["Widget", 2, 9.99]`), `"$1,200.00"` as a total, or
//! `null` for a whole table list. Rather than rejecting an otherwise useful
//! reply, every field is decoded through a tolerant `serde_json::Value`
//! adapter below. Row length is never checked against header length.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Message returned when a readable PDF carries no text layer.
pub const NO_TEXT_MESSAGE: &str = "No text found - might be scanned PDF";

/// Message returned when no LLM credential is configured.
pub const NO_API_KEY_MESSAGE: &str = "No API key configured";

/// Error returned when the LLM endpoint could not be reached.
pub const CONNECTION_ERROR: &str = "Could not connect to LLM API";

/// Error returned when the LLM reply is not a JSON object.
pub const PARSE_ERROR: &str = "Could not parse AI response";

/// Body of a `200` response from `POST /api/extract`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractResponse {
    /// `false` only for the "no text layer" soft failure.
    pub success: bool,
    /// Filename as declared by the uploader.
    pub filename: String,
    /// Structured extraction output.
    pub data: ExtractionResult,
}

/// Structured tables and summary extracted from one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default, deserialize_with = "lenient_tables")]
    pub tables: Vec<Table>,

    #[serde(default, deserialize_with = "lenient_summary")]
    pub summary: Option<Summary>,

    /// Remote-dependency failure, absorbed into the body.
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,

    /// Informational status, e.g. missing credential or no text layer.
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub message: Option<String>,

    /// Prefix of the extracted text, returned when the remote call was skipped.
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub text_preview: Option<String>,

    /// Unparsed model reply, kept for diagnostics on parse failure.
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub raw_response: Option<String>,

    /// Any additional keys returned by the model, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExtractionResult {
    /// Soft-failure body for a readable PDF with a blank text layer.
    pub fn no_text() -> Self {
        Self {
            message: Some(NO_TEXT_MESSAGE.to_string()),
            ..Self::default()
        }
    }

    /// Body for a skipped remote call, echoing a preview of the text.
    pub fn no_credential(text_preview: String) -> Self {
        Self {
            message: Some(NO_API_KEY_MESSAGE.to_string()),
            text_preview: Some(text_preview),
            ..Self::default()
        }
    }

    /// Body for a transport-level failure of the remote call.
    pub fn connection_error() -> Self {
        Self {
            error: Some(CONNECTION_ERROR.to_string()),
            ..Self::default()
        }
    }

    /// Body for a reply that could not be parsed as a JSON object.
    pub fn parse_error(raw_response: impl Into<String>) -> Self {
        Self {
            error: Some(PARSE_ERROR.to_string()),
            raw_response: Some(raw_response.into()),
            ..Self::default()
        }
    }
}

/// One table found in the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,

    #[serde(default, deserialize_with = "lenient_cells")]
    pub headers: Vec<String>,

    #[serde(default, deserialize_with = "lenient_rows")]
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Number of rows whose length differs from the header count.
    pub fn ragged_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.len() != self.headers.len())
            .count()
    }
}

/// Document-level totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default, deserialize_with = "lenient_amount")]
    pub total_amount: Option<f64>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub invoice_count: Option<u64>,

    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub date_range: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Lenient field adapters ───────────────────────────────────────────────────

fn cell_to_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(cell_to_string(&Value::deserialize(d)?))
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        v => Some(cell_to_string(&v)),
    })
}

fn lenient_cells<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items.iter().map(cell_to_string).collect(),
        Value::Null => Vec::new(),
        single => vec![cell_to_string(&single)],
    })
}

fn lenient_rows<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<String>>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(rows) => rows
            .iter()
            .map(|row| match row {
                Value::Array(cells) => cells.iter().map(cell_to_string).collect(),
                // Some models emit rows as {"Description": "...", "Qty": 2}
                Value::Object(map) => map.values().map(cell_to_string).collect(),
                other => vec![cell_to_string(other)],
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_tables<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Table>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter(|v| v.is_object())
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_summary<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Summary>, D::Error> {
    Ok(match Value::deserialize(d)? {
        v @ Value::Object(_) => serde_json::from_value(v).ok(),
        _ => None,
    })
}

/// Parse `"$1,234.50"`, `"1234.5"`, `"USD 99"` into a number.
fn parse_amount(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

fn lenient_amount<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount(&s),
        _ => None,
    })
}

fn lenient_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
}
