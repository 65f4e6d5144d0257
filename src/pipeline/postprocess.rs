//! Post-processing: recover the JSON object from a free-form model reply.
//!
//! ## Why is post-processing necessary?
//!
//! Even when told to "return ONLY valid JSON", models routinely wrap the
//! object in a ` ```json ` fence or add a sentence before and after it. The
//! rules here strip that packaging deterministically before parsing:
//!
//! 1. A fenced block labelled `json` wins: its interior is taken, up to the
//!    closing fence or the end of the reply if the fence was never closed.
//! 2. Otherwise, if the reply contains `{` and a later `}`, the slice from
//!    the first `{` to the last `}` is taken.
//! 3. Otherwise the trimmed reply is parsed as-is (and will usually fail).
//!
//! Both rules are no-ops on an already-clean JSON object.

use crate::output::ExtractionResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde_json::Value;

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```json[ \t]*\r?\n?(.*?)(?:```|\z)").unwrap());

/// Return the substring of `reply` that should hold the JSON object.
pub fn extract_json_payload(reply: &str) -> &str {
    if let Some(inner) = RE_JSON_FENCE.captures(reply).and_then(|c| c.get(1)) {
        return inner.as_str().trim();
    }

    if let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) {
        if end > start {
            return &reply[start..=end];
        }
    }

    reply.trim()
}

/// Parse a model reply into an [`ExtractionResult`].
///
/// Fails when the payload is not valid JSON or is valid JSON but not an
/// object (`[]`, `"text"`, `42`).
pub fn parse_reply(reply: &str) -> Result<ExtractionResult, serde_json::Error> {
    let payload = extract_json_payload(reply);
    let value: Value = serde_json::from_str(payload)?;
    if !value.is_object() {
        return Err(serde_json::Error::custom(
            "model reply is not a JSON object",
        ));
    }
    serde_json::from_value(value)
}

// ── Tests ────────────────────────────────────────────────────────────────────
