//! Result summarizer — digests raw tool results for the model's context.
//!
//! Maps a raw tool outcome plus the tool's declared output kind into a
//! bounded-size textual digest. The digest keeps concrete handles
//! (titles, URLs, filenames, key names) so the model can reference prior
//! results precisely, while the full payload stays out of the context
//! window — only working memory retains it.

use helmsman_core::tool::{OutputKind, ToolOutcome};
use serde_json::Value;

/// Text results longer than this are digested down to a length notice.
pub const LONG_TEXT_LIMIT: usize = 500;

/// Maximum itemized entries rendered for a results-list kind.
pub const MAX_LISTED_RESULTS: usize = 3;

/// Size bounds applied when digesting a result.
#[derive(Debug, Clone, Copy)]
pub struct DigestLimits {
    pub long_text_limit: usize,
    pub max_listed_results: usize,
}

impl Default for DigestLimits {
    fn default() -> Self {
        Self {
            long_text_limit: LONG_TEXT_LIMIT,
            max_listed_results: MAX_LISTED_RESULTS,
        }
    }
}

/// Produce the digest for one tool outcome with default limits.
pub fn digest(tool_name: &str, kind: OutputKind, outcome: &ToolOutcome) -> String {
    digest_with(tool_name, kind, outcome, DigestLimits::default())
}

/// Produce the digest for one tool outcome.
///
/// Policy is ordered, first match wins:
/// 1. failure marker
/// 2. results-list kinds (itemized, bounded)
/// 3. long text (length notice only)
/// 4. downloadable file (filename notice)
/// 5. structured values (key listing)
/// 6. stringify
pub fn digest_with(
    tool_name: &str,
    kind: OutputKind,
    outcome: &ToolOutcome,
    limits: DigestLimits,
) -> String {
    let value = match outcome {
        ToolOutcome::Failure(message) => {
            return format!("Tool '{tool_name}' failed with error: {message}");
        }
        ToolOutcome::Success(value) => value,
    };

    if kind.is_results_list() {
        return digest_results_list(tool_name, value, limits.max_listed_results);
    }

    if let Value::String(text) = value {
        let chars = text.chars().count();
        if chars > limits.long_text_limit {
            return format!(
                "Tool '{tool_name}' returned a text of {chars} characters. \
Full content is available for later steps."
            );
        }
    }

    if kind == OutputKind::DownloadableFile {
        let filename = value
            .get("filename")
            .and_then(Value::as_str)
            .unwrap_or("(unnamed)");
        return format!(
            "Tool '{tool_name}' successfully created the file '{filename}'. Ready for download."
        );
    }

    match value {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!(
                "Tool '{tool_name}' returned an object with keys: {}.",
                keys.join(", ")
            )
        }
        Value::Array(_) => format!("Tool '{tool_name}' returned a JSON object."),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn digest_results_list(tool_name: &str, value: &Value, max_items: usize) -> String {
    let items = match value.as_array() {
        Some(items) if !items.is_empty() => items,
        _ => return format!("Tool '{tool_name}' returned no results."),
    };

    let mut digest = format!("Tool '{tool_name}' returned {} results:", items.len());
    for (index, item) in items.iter().take(max_items).enumerate() {
        let title = item
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("(untitled)");
        match item.get("url").and_then(Value::as_str) {
            Some(url) => digest.push_str(&format!("\n[{}] {title} ({url})", index + 1)),
            None => digest.push_str(&format!("\n[{}] {title}", index + 1)),
        }
    }
    digest
}
