//! Agent-level streaming events.
//!
//! `AgentEvent` is the one-way channel of typed progress events the loop
//! emits for its caller. It carries observability and the final answer —
//! it is never an input to the loop's own decisions.
//!
//! Event vocabulary:
//! - `step`           — a status line (thinking/acting/info/warning/error/done)
//! - tool payloads    — full raw result of a caller-visible tool, named by
//!   its output kind (e.g. `downloadable_file`)
//! - `answer_chunk`   — an incremental fragment of answer text
//! - `final_response` — terminal payload; exactly one per run

use helmsman_core::tool::OutputKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status tag on a `step` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Thinking,
    Acting,
    Info,
    Warning,
    Error,
    Done,
}

/// The terminal payload of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinalPayload {
    /// The final answer text (or failure description)
    pub content: String,

    /// Downloadable files and other artifacts produced during the run
    pub artifacts: Vec<Value>,

    /// Web sources surfaced by search tools
    pub sources: Vec<Value>,

    /// Follow-up suggestions
    pub suggestions: Vec<Value>,

    /// Image results surfaced during the run
    #[serde(rename = "imageResults")]
    pub image_results: Vec<Value>,

    /// Video results surfaced during the run
    #[serde(rename = "videoResults")]
    pub video_results: Vec<Value>,
}

/// Events emitted by the agent during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A progress status line.
    Step { status: StepStatus, text: String },

    /// Full raw payload of a caller-visible tool result.
    ToolPayload { kind: OutputKind, payload: Value },

    /// An incremental fragment of the answer text.
    AnswerChunk { content: String },

    /// The terminal payload — exactly one per run.
    FinalResponse(FinalPayload),
}

impl AgentEvent {
    /// SSE event name for this event type.
    ///
    /// Tool payloads report their output-kind tag, so a downloadable file
    /// arrives as a `downloadable_file` event, mirroring how the kinds
    /// appear on the wire.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Step { .. } => "step",
            Self::ToolPayload { kind, .. } => kind.as_str(),
            Self::AnswerChunk { .. } => "answer_chunk",
            Self::FinalResponse(_) => "final_response",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_serialization() {
        let event = AgentEvent::Step {
            status: StepStatus::Thinking,
            text: "Planning multi-step research...".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"step""#));
        assert!(json.contains(r#""status":"thinking""#));
    }

    #[test]
    fn answer_chunk_serialization() {
        let event = AgentEvent::AnswerChunk {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"answer_chunk""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn final_response_serialization_uses_camel_case_result_keys() {
        let event = AgentEvent::FinalResponse(FinalPayload {
            content: "done".into(),
            ..FinalPayload::default()
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"final_response""#));
        assert!(json.contains(r#""imageResults":[]"#));
        assert!(json.contains(r#""videoResults":[]"#));
    }

    #[test]
    fn tool_payload_event_type_is_output_kind() {
        let event = AgentEvent::ToolPayload {
            kind: OutputKind::DownloadableFile,
            payload: serde_json::json!({"filename": "notes.txt"}),
        };
        assert_eq!(event.event_type(), "downloadable_file");
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            AgentEvent::Step {
                status: StepStatus::Done,
                text: "x".into()
            }
            .event_type(),
            "step"
        );
        assert_eq!(
            AgentEvent::AnswerChunk {
                content: "x".into()
            }
            .event_type(),
            "answer_chunk"
        );
        assert_eq!(
            AgentEvent::FinalResponse(FinalPayload::default()).event_type(),
            "final_response"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"answer_chunk","content":"hi"}"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentEvent::AnswerChunk { content } => assert_eq!(content, "hi"),
            _ => panic!("Wrong variant"),
        }
    }
}
