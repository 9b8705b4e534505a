//! Current context tool — reports ambient caller context.
//!
//! Demonstrates the open context-argument channel: the caller's identity,
//! timezone, and locale are injected by the host at dispatch time and are
//! deliberately absent from the public parameter schema the model sees.

use async_trait::async_trait;
use chrono::Utc;
use helmsman_core::error::ToolError;
use helmsman_core::tool::{OutputKind, Tool, ToolParameter};
use serde_json::{Map, Value};

pub struct CurrentContextTool;

#[async_trait]
impl Tool for CurrentContextTool {
    fn name(&self) -> &str {
        "current_context"
    }

    fn description(&self) -> &str {
        "Returns the current date, time, and session context. Use this when the user's request depends on 'today', 'now', or their local settings."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        // No public parameters — everything arrives via context arguments
        vec![]
    }

    fn output_kind(&self) -> OutputKind {
        OutputKind::JsonResponse
    }

    fn accepts_context_args(&self) -> bool {
        true
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError> {
        let timezone = args
            .get("caller_timezone")
            .and_then(Value::as_str)
            .unwrap_or("UTC");
        let locale = args
            .get("caller_locale")
            .and_then(Value::as_str)
            .unwrap_or("en-US");

        let now = Utc::now();
        Ok(serde_json::json!({
            "utc_now": now.to_rfc3339(),
            "date": now.format("%Y-%m-%d").to_string(),
            "timezone": timezone,
            "locale": locale,
        }))
    }
}
