//! OpenAI-compatible transport implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, Fireworks
//! AI, and any endpoint exposing an OpenAI-compatible
//! `/v1/chat/completions` route.
//!
//! Supports:
//! - Streaming SSE chat completions
//! - Tool use / function calling (partial deltas are accumulated and
//!   emitted as complete invocations)
//! - Reasoning deltas, surfaced as thought chunks

use async_trait::async_trait;
use futures::StreamExt;
use helmsman_core::error::TransportError;
use helmsman_core::message::{Role, Turn};
use helmsman_core::tool::{ToolDefinition, ToolInvocation};
use helmsman_core::transport::{ModelChunk, ModelTransport};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

/// An OpenAI-compatible streaming model transport.
pub struct OpenAiCompatTransport {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl OpenAiCompatTransport {
    /// Create a new OpenAI-compatible transport.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: "gpt-4o".into(),
            timeout_secs: 120,
            client: reqwest::Client::new(),
        }
    }

    /// Create an OpenRouter transport (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an OpenAI transport (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama transport (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Set the model to request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self.client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(secs))
            .build()
            .unwrap_or_default();
        self
    }

    /// Convert our Turn types to OpenAI API format.
    fn to_api_messages(turns: &[Turn]) -> Vec<ApiMessage> {
        turns
            .iter()
            .map(|t| ApiMessage {
                role: match t.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                    Role::Tool => "tool".into(),
                },
                content: Some(t.content.clone()),
                tool_calls: if t.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        t.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: Value::Object(tc.arguments.clone()).to_string(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: t.call_id.clone(),
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }
}

#[async_trait]
impl ModelTransport for OpenAiCompatTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream_generate(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        thinking: bool,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<ModelChunk, TransportError>>,
        TransportError,
    > {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(turns),
            "stream": true,
        });

        if !tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(tools));
        }

        if thinking {
            body["reasoning"] = serde_json::json!({ "enabled": true });
        }

        debug!(transport = %self.name, model = %self.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(e.to_string())
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(TransportError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(TransportError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Transport streaming error");
            return Err(TransportError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let transport_name = self.name.clone();

        // Spawn task to read the SSE byte stream and parse chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            // Accumulators for tool call deltas (keyed by index)
            let mut accumulators: std::collections::HashMap<u32, ToolCallAccumulator> =
                std::collections::HashMap::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(TransportError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                // Append new bytes to our line buffer
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // Process complete lines
                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    // Skip empty lines and SSE comments
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    // Handle "data: ..." lines
                    if let Some(data) = line.strip_prefix("data: ") {
                        let data = data.trim();

                        // "[DONE]" signals end of stream
                        if data == "[DONE]" {
                            flush_tool_calls(&tx, &mut accumulators).await;
                            return;
                        }

                        // Parse the JSON chunk
                        match serde_json::from_str::<StreamResponse>(data) {
                            Ok(stream_resp) => {
                                let Some(choice) = stream_resp.choices.first() else {
                                    continue;
                                };
                                let delta = &choice.delta;

                                // Accumulate tool call deltas
                                if let Some(ref tc_deltas) = delta.tool_calls {
                                    for tc_delta in tc_deltas {
                                        let acc = accumulators
                                            .entry(tc_delta.index)
                                            .or_insert_with(|| {
                                                ToolCallAccumulator::new(tc_delta.index)
                                            });

                                        if let Some(ref id) = tc_delta.id {
                                            acc.id = id.clone();
                                        }
                                        if let Some(ref func) = tc_delta.function {
                                            if let Some(ref name) = func.name {
                                                acc.name = name.clone();
                                            }
                                            if let Some(ref args) = func.arguments {
                                                acc.arguments.push_str(args);
                                            }
                                        }
                                    }
                                }

                                // Surface reasoning deltas as thought chunks
                                if let Some(ref reasoning) = delta.reasoning {
                                    if !reasoning.is_empty()
                                        && tx
                                            .send(Ok(ModelChunk::Thought(reasoning.clone())))
                                            .await
                                            .is_err()
                                    {
                                        return; // receiver dropped
                                    }
                                }

                                // Send content delta
                                if let Some(ref content) = delta.content {
                                    if !content.is_empty()
                                        && tx
                                            .send(Ok(ModelChunk::Text(content.clone())))
                                            .await
                                            .is_err()
                                    {
                                        return;
                                    }
                                }

                                // Finish reason closes the turn
                                if choice.finish_reason.is_some() {
                                    flush_tool_calls(&tx, &mut accumulators).await;
                                    return;
                                }
                            }
                            Err(e) => {
                                trace!(
                                    transport = %transport_name,
                                    data = %data,
                                    error = %e,
                                    "Ignoring unparseable SSE chunk"
                                );
                            }
                        }
                    }
                }
            }

            // Stream ended without [DONE] — flush whatever we have
            flush_tool_calls(&tx, &mut accumulators).await;
        });

        Ok(rx)
    }
}

/// Emit accumulated tool calls as complete invocations, in index order.
async fn flush_tool_calls(
    tx: &tokio::sync::mpsc::Sender<Result<ModelChunk, TransportError>>,
    accumulators: &mut std::collections::HashMap<u32, ToolCallAccumulator>,
) {
    let mut accs: Vec<ToolCallAccumulator> = accumulators.drain().map(|(_, a)| a).collect();
    accs.sort_by_key(|a| a.index);
    for acc in accs {
        let _ = tx.send(Ok(ModelChunk::ToolCall(acc.into_invocation()))).await;
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: Value,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta — arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Accumulates incremental tool call deltas into a complete invocation.
struct ToolCallAccumulator {
    index: u32,
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn new(index: u32) -> Self {
        Self {
            index,
            id: String::new(),
            name: String::new(),
            arguments: String::new(),
        }
    }

    fn into_invocation(self) -> ToolInvocation {
        let arguments: Map<String, Value> = match serde_json::from_str(&self.arguments) {
            Ok(Value::Object(map)) => map,
            _ => {
                if !self.arguments.trim().is_empty() {
                    warn!(
                        tool = %self.name,
                        "Discarding unparseable tool-call arguments"
                    );
                }
                Map::new()
            }
        };
        let id = if self.id.is_empty() {
            format!("call_{}", self.index)
        } else {
            self.id
        };
        ToolInvocation {
            id,
            name: self.name,
            arguments,
        }
    }
}
