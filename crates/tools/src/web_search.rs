//! Web search tool — stub that returns mock search results.
//!
//! In production this would call a real search API (DuckDuckGo, Brave,
//! etc.). The stub returns plausible `{title, url, text}` items so the
//! agent loop and summarizer can be tested end-to-end without network
//! access.

use async_trait::async_trait;
use helmsman_core::error::ToolError;
use helmsman_core::tool::{OutputKind, ParamKind, Tool, ToolParameter};
use serde_json::{Map, Value};

pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Searches the web for up-to-date information. Returns a list of relevant results with titles, URLs, and snippets."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("query", ParamKind::String, "The search query."),
            ToolParameter::optional(
                "max_results",
                ParamKind::Integer,
                "The maximum number of results to return (default 7).",
            ),
        ]
    }

    fn output_kind(&self) -> OutputKind {
        OutputKind::WebSearchResults
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let max_results = args
            .get("max_results")
            .and_then(Value::as_u64)
            .unwrap_or(7)
            .min(10) as usize;

        Ok(Value::Array(mock_results(query, max_results)))
    }
}

fn mock_results(query: &str, count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            serde_json::json!({
                "type": "web",
                "title": format!("Result {} for: {}", i + 1, query),
                "url": format!("https://example.com/search?q={}&p={}", urlencode(query), i + 1),
                "text": format!(
                    "This is a mock search result for the query '{query}'. In production, this would contain real snippet content."
                ),
            })
        })
        .collect()
}

fn urlencode(s: &str) -> String {
    s.replace(' ', "+")
}
