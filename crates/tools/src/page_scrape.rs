//! Page scrape tool — stub that returns extracted page text.
//!
//! In production this would fetch the URL, strip boilerplate, and return
//! the readable text. The stub synthesizes a deterministic body long
//! enough to exercise the long-text summarization path.

use async_trait::async_trait;
use helmsman_core::error::ToolError;
use helmsman_core::tool::{OutputKind, ParamKind, Tool, ToolParameter};
use serde_json::{Map, Value};

pub struct PageScrapeTool;

#[async_trait]
impl Tool for PageScrapeTool {
    fn name(&self) -> &str {
        "page_scrape"
    }

    fn description(&self) -> &str {
        "Fetches a web page and extracts its readable text content. Use this to read an article or page found via web_search."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::required(
            "url",
            ParamKind::String,
            "The URL of the page to fetch and extract.",
        )]
    }

    fn output_kind(&self) -> OutputKind {
        OutputKind::TextContent
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError> {
        let url = args
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::ExecutionFailed {
                tool_name: "page_scrape".into(),
                reason: format!("Unsupported URL scheme: {url}"),
            });
        }

        let paragraph = format!(
            "Extracted content from {url}. This paragraph stands in for the page's \
readable text: the production scraper strips navigation, ads, and markup, \
returning only the article body. "
        );
        // Repeat to cross the long-text digest threshold
        Ok(Value::String(paragraph.repeat(4)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scrape_returns_long_text() {
        let tool = PageScrapeTool;
        let mut args = Map::new();
        args.insert(
            "url".into(),
            Value::String("https://example.com/article".into()),
        );

        let result = tool.execute(args).await.unwrap();
        let text = result.as_str().unwrap();
        assert!(text.contains("example.com/article"));
        assert!(text.chars().count() > 500);
    }

    #[tokio::test]
    async fn rejects_non_http_url() {
        let tool = PageScrapeTool;
        let mut args = Map::new();
        args.insert("url".into(), Value::String("ftp://example.com".into()));

        let err = tool.execute(args).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
