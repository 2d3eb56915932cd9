//! Output normalization for hosted providers.
//!
//! Hosted models are asked for a strict JSON object but are not
//! contractually guaranteed to return one. [`normalize`] converts whatever
//! came back into a [`GenerationResult`] through three ordered attempts and
//! never returns an error — the last tier accepts arbitrary text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::GenerationResult;

/// Greedy brace-delimited object — the largest `{...}` span in the text.
static JSON_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("valid regex"));

static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

/// How much raw text the lowest-fidelity tier keeps in `debug.raw`.
const RAW_DEBUG_LIMIT: usize = 1000;

/// Convert an arbitrary provider response into a [`GenerationResult`].
///
/// Ordered attempts, first success wins:
/// 1. the whole text parses as a JSON object
/// 2. the first brace-delimited substring parses as a JSON object
/// 3. synthesize a result wrapping the raw text, recording a truncated copy
///    in `debug.raw`
pub fn normalize(raw: &str) -> GenerationResult {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(raw) {
        return from_object(&obj);
    }

    if let Some(m) = JSON_OBJECT_RE.find(raw) {
        if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(m.as_str()) {
            return from_object(&obj);
        }
    }

    let mut debug = Map::new();
    debug.insert(
        "raw".to_string(),
        Value::String(truncate_chars(raw, RAW_DEBUG_LIMIT).to_string()),
    );
    GenerationResult {
        summary: "Generated draft".to_string(),
        action_items: Vec::new(),
        draft_reply_html: format!("<p>{raw}</p>"),
        citations: Vec::new(),
        debug,
    }
}

/// Build a result from a parsed JSON object, coercing loosely-typed fields.
fn from_object(obj: &Map<String, Value>) -> GenerationResult {
    let action_items = match obj.get("action_items") {
        None => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(value_to_string).collect(),
        // Not a sequence — wrap its string form as a single entry.
        Some(other) => vec![value_to_string(other)],
    };

    GenerationResult {
        summary: coerce_string(obj.get("summary")),
        action_items,
        draft_reply_html: coerce_string(obj.get("draft_reply_html")),
        // Citations from upstream are never trusted through this path.
        citations: Vec::new(),
        debug: Map::new(),
    }
}

fn coerce_string(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(v) => value_to_string(v),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replace markup with spaces so the text can be re-tokenized.
pub(crate) fn strip_tags(html: &str) -> String {
    HTML_TAG_RE.replace_all(html, " ").into_owned()
}

/// Char-boundary-safe prefix of at most `limit` characters.
pub(crate) fn truncate_chars(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
