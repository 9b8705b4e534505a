//! The core agent loop — the heart of Helmsman.
//!
//! The agent follows a **Plan → Act → Observe** cycle:
//!
//! 1. **Plan**: stream one model turn (thoughts, text, tool calls)
//! 2. **Act**: dispatch the requested tool batch through the registry
//! 3. **Observe**: digest each result back into the conversation and
//!    replace working memory with the batch's raw outputs
//! 4. Repeat until the model settles on a short final answer, or the
//!    iteration bound is hit
//!
//! Progress is streamed to the caller as typed [`AgentEvent`]s; the run
//! always ends with exactly one `final_response`.

pub mod loop_runner;
pub mod stream_event;
pub mod summarizer;
pub mod working_memory;

pub use loop_runner::AgentLoop;
pub use stream_event::{AgentEvent, FinalPayload, StepStatus};
pub use working_memory::WorkingMemory;
