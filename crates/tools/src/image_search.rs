//! Image search tool — stub returning mock image results.
//!
//! In production this would drive an image search backend and filter out
//! thumbnails, icons, and other low-quality hits before returning.

use async_trait::async_trait;
use helmsman_core::error::ToolError;
use helmsman_core::tool::{OutputKind, ParamKind, Tool, ToolParameter};
use serde_json::{Map, Value};

pub struct ImageSearchTool;

#[async_trait]
impl Tool for ImageSearchTool {
    fn name(&self) -> &str {
        "image_search"
    }

    fn description(&self) -> &str {
        "Searches for high-quality images matching a query. Returns image URLs with titles and thumbnails."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("query", ParamKind::String, "The image search query."),
            ToolParameter::optional(
                "max_results",
                ParamKind::Integer,
                "The maximum number of images to return (default 6).",
            ),
        ]
    }

    fn output_kind(&self) -> OutputKind {
        OutputKind::ImageSearchResults
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let max_results = args
            .get("max_results")
            .and_then(Value::as_u64)
            .unwrap_or(6)
            .min(12) as usize;

        let slug = query.to_lowercase().replace(' ', "-");
        let items: Vec<Value> = (0..max_results)
            .map(|i| {
                serde_json::json!({
                    "title": format!("{query} — image {}", i + 1),
                    "url": format!("https://images.example.com/{slug}/{}_full.jpg", i + 1),
                    "thumbnail": format!("https://images.example.com/{slug}/{}_thumb.jpg", i + 1),
                })
            })
            .collect();

        Ok(Value::Array(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_image_items() {
        let tool = ImageSearchTool;
        let mut args = Map::new();
        args.insert("query".into(), Value::String("northern lights".into()));

        let result = tool.execute(args).await.unwrap();
        let items = result.as_array().unwrap();
        assert_eq!(items.len(), 6);
        assert!(items[0]["url"].as_str().unwrap().contains("northern-lights"));
        assert!(items[0]["thumbnail"].is_string());
    }

    #[test]
    fn output_kind_is_image_results() {
        assert_eq!(
            ImageSearchTool.output_kind(),
            OutputKind::ImageSearchResults
        );
    }
}
