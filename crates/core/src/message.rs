//! Turn and Conversation domain types.
//!
//! These are the core value objects that flow through the agent loop:
//! the caller supplies prior turns, the loop appends model output, tool
//! requests, and tool-result digests, and the final answer is read back
//! out. A conversation is append-only — turns are never rewritten once
//! pushed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::ToolInvocation;

/// Unique identifier for a conversation (one agent run or session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a turn in a conversation.
///
/// External history may label the model's turns `assistant` or `model`
/// depending on which API produced them; both deserialize to
/// [`Role::Assistant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The model's own turns
    #[serde(alias = "model")]
    Assistant,
    /// System instructions (tool-use policy, artifact protocol)
    System,
    /// Tool execution result digest
    Tool,
}

impl Role {
    /// Normalize an externally-supplied role label.
    ///
    /// Unrecognized labels fall back to `User` so that a malformed history
    /// entry degrades to ordinary input rather than being dropped.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "assistant" | "model" | "agent" => Role::Assistant,
            "system" => Role::System,
            "tool" | "function" => Role::Tool,
            _ => Role::User,
        }
    }
}

/// A single turn in a conversation.
///
/// The payload is one of: free text, a set of requested tool invocations
/// (assistant turns), or a tool-result digest keyed by tool name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// Who produced this turn
    pub role: Role,

    /// The text content (or result digest for tool turns)
    pub content: String,

    /// Tool invocations requested by the model (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,

    /// If this is a tool result, which invocation it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,

    /// If this is a tool result, the name of the tool that produced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Create a new system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    /// Create an assistant turn that requests tool invocations.
    ///
    /// `content` may be empty — some models emit a text preamble alongside
    /// their calls, some don't.
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolInvocation>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    /// Create a tool-result turn keyed by tool name.
    pub fn tool_result(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        digest: impl Into<String>,
    ) -> Self {
        Self {
            call_id: Some(call_id.into()),
            tool_name: Some(tool_name.into()),
            ..Self::plain(Role::Tool, digest)
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            call_id: None,
            tool_name: None,
            timestamp: Utc::now(),
        }
    }
}

/// A conversation is an ordered, append-only sequence of turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Ordered turns
    pub turns: Vec<Turn>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last turn was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn to the conversation.
    pub fn push(&mut self, turn: Turn) {
        self.updated_at = Utc::now();
        self.turns.push(turn);
    }

    /// The last turn, if any.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
