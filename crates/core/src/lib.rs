//! # Helmsman Core
//!
//! Domain types, traits, and error definitions for the Helmsman agent runtime.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod tool;
pub mod transport;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, ToolError, TransportError};
pub use message::{Conversation, ConversationId, Role, Turn};
pub use tool::{
    ARTIFACT_TOOL, OutputKind, ParamKind, Tool, ToolDefinition, ToolInvocation, ToolOutcome,
    ToolParameter, ToolRegistry,
};
pub use transport::{ModelChunk, ModelTransport};
