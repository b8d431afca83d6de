//! Pipeline Orchestration
//!
//! Sequences the processing stages that turn a request (fresh question, or
//! a satisfaction verdict) into a finished response, threading a typed
//! state through the active stage path.

pub mod context;
pub mod orchestrator;
pub mod prompts;
pub mod state;

pub use context::ContextAssembler;
pub use orchestrator::{Orchestrator, PipelineResponse, Stage};
pub use state::{MemoryEntry, PipelineRequest, PipelineState, StateUpdate, Verdict};
