//! ModelTransport trait — the abstraction over the model-call channel.
//!
//! A transport knows how to send a conversation (plus the available tool
//! definitions) to an LLM and hand back an ordered stream of typed chunks:
//! thinking traces, answer text, and tool-call requests. The agent loop
//! consumes this stream without knowing anything about the wire format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::message::Turn;
use crate::tool::{ToolDefinition, ToolInvocation};

/// One typed chunk of a model's streamed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelChunk {
    /// A fragment of the model's reasoning trace (display-only; never
    /// folded back into the conversation).
    Thought(String),

    /// A fragment of answer text.
    Text(String),

    /// A complete tool invocation request. Transports accumulate partial
    /// call deltas internally and only emit fully-assembled requests.
    ToolCall(ToolInvocation),
}

/// The model-call channel consumed by the agent loop.
///
/// One `stream_generate` call corresponds to one model turn: the returned
/// receiver yields chunks in order and closes when the turn is finished.
/// An `Err` chunk (or an `Err` return) is fatal to the run — the loop
/// does not retry the model.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// A human-readable name for this transport (e.g., "openai", "openrouter").
    fn name(&self) -> &str;

    /// Stream one model turn for the given conversation.
    async fn stream_generate(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        thinking: bool,
    ) -> Result<mpsc::Receiver<Result<ModelChunk, TransportError>>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_serialization_roundtrip() {
        let chunk = ModelChunk::Text("hello".into());
        let json = serde_json::to_string(&chunk).unwrap();
        let back: ModelChunk = serde_json::from_str(&json).unwrap();
        match back {
            ModelChunk::Text(t) => assert_eq!(t, "hello"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn tool_call_chunk_carries_invocation() {
        let inv = ToolInvocation {
            id: "call_1".into(),
            name: "web_search".into(),
            arguments: serde_json::Map::new(),
        };
        let chunk = ModelChunk::ToolCall(inv);
        match chunk {
            ModelChunk::ToolCall(inv) => assert_eq!(inv.name, "web_search"),
            _ => panic!("wrong variant"),
        }
    }
}
