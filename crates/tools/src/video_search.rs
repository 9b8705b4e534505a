//! Video search tool — stub returning mock video results.
//!
//! In production this would scrape a video platform's search page the
//! way the web tools do; the stub keeps the same result shape.

use async_trait::async_trait;
use helmsman_core::error::ToolError;
use helmsman_core::tool::{OutputKind, ParamKind, Tool, ToolParameter};
use serde_json::{Map, Value};

pub struct VideoSearchTool;

#[async_trait]
impl Tool for VideoSearchTool {
    fn name(&self) -> &str {
        "video_search"
    }

    fn description(&self) -> &str {
        "Searches for videos matching a query. Returns video URLs with titles, channel names, and durations."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("query", ParamKind::String, "The video search query."),
            ToolParameter::optional(
                "max_results",
                ParamKind::Integer,
                "The maximum number of videos to return (default 5).",
            ),
        ]
    }

    fn output_kind(&self) -> OutputKind {
        OutputKind::VideoSearchResults
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let max_results = args
            .get("max_results")
            .and_then(Value::as_u64)
            .unwrap_or(5)
            .min(10) as usize;

        let items: Vec<Value> = (0..max_results)
            .map(|i| {
                serde_json::json!({
                    "title": format!("{query} explained (part {})", i + 1),
                    "url": format!("https://video.example.com/watch?v=vid{:04}", i + 1),
                    "channel": "Example Channel",
                    "duration": format!("{}:{:02}", 4 + i, 30),
                })
            })
            .collect();

        Ok(Value::Array(items))
    }
}
