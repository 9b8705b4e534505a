//! Model transport implementations for Helmsman.
//!
//! A transport turns one conversation into one streamed model turn of
//! typed chunks (thought / text / tool call). The OpenAI-compatible
//! transport covers the vast majority of hosted endpoints: OpenAI,
//! OpenRouter, Ollama, vLLM, Together AI, and anything else exposing a
//! `/v1/chat/completions` SSE stream.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatTransport;

use helmsman_config::AppConfig;
use helmsman_core::error::TransportError;

/// Build the configured transport.
pub fn build_from_config(config: &AppConfig) -> Result<OpenAiCompatTransport, TransportError> {
    let api_key = config
        .transport
        .api_key
        .clone()
        .ok_or_else(|| TransportError::NotConfigured("no API key configured".into()))?;
    Ok(OpenAiCompatTransport::new(
        "openai-compat",
        &config.transport.base_url,
        api_key,
    )
    .with_model(&config.transport.model)
    .with_timeout_secs(config.transport.request_timeout_secs))
}
