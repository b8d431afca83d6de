//! Pipeline request and state types.
//!
//! The per-invocation state is an explicit struct with typed fields, and
//! each stage returns a [`StateUpdate`] that the scheduler merges into it.
//! The state lives for exactly one invocation; only designated stages copy
//! specific fields into the durable stores.

use crate::memory::HistoryRecord;
use serde::Serialize;
use std::path::PathBuf;

/// The satisfaction signal on an incoming request.
///
/// Entry-stage selection is an exhaustive match on this enum: `Fresh`
/// enters at document loading, `Satisfied` and `Unsatisfied` enter at the
/// corresponding feedback-recording stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verdict {
    /// No verdict: a fresh question
    #[default]
    Fresh,

    /// The user was satisfied with the last answer
    Satisfied,

    /// The user was not satisfied; regeneration follows
    Unsatisfied,
}

/// One incoming request: a session id plus either a question or a verdict.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub session_id: String,
    pub question: Option<String>,
    pub verdict: Verdict,
    /// Free-text dissatisfaction feedback, used as the effective query on
    /// regeneration.
    pub feedback: Option<String>,
}

impl PipelineRequest {
    /// A fresh question for the session.
    pub fn ask(session_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            question: Some(question.into()),
            verdict: Verdict::Fresh,
            feedback: None,
        }
    }

    /// A satisfaction verdict about the session's last answer.
    pub fn verdict(
        session_id: impl Into<String>,
        satisfied: bool,
        feedback: Option<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            question: None,
            verdict: if satisfied {
                Verdict::Satisfied
            } else {
                Verdict::Unsatisfied
            },
            feedback,
        }
    }
}

/// Draft memory entry produced by answer generation and consumed by the
/// memory-write stage.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryEntry {
    pub question: String,
    pub answer: String,
    pub context: String,
    pub feedback: Option<String>,
    pub ts: f64,
}

/// Transient per-invocation state accumulated across stages.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub session_id: String,
    pub question: Option<String>,
    pub verdict: Verdict,
    pub feedback: Option<String>,
    pub documents: Vec<String>,
    pub retrieved_docs: Vec<String>,
    pub context: String,
    pub answer: String,
    pub user_intent: Vec<String>,
    /// Deduplicated recent unsatisfied-feedback strings, newest first
    pub feedbacks: Vec<String>,
    pub memory_hits: Vec<HistoryRecord>,
    pub index_dir: Option<PathBuf>,
    pub new_memory_entry: Option<MemoryEntry>,
}

impl PipelineState {
    /// Seed the state from an incoming request.
    pub fn from_request(request: PipelineRequest) -> Self {
        Self {
            session_id: request.session_id,
            question: request.question,
            verdict: request.verdict,
            feedback: request.feedback,
            ..Self::default()
        }
    }

    /// The effective retrieval query: regeneration feedback text when
    /// present, else the question.
    pub fn effective_query(&self) -> Option<&str> {
        self.feedback
            .as_deref()
            .filter(|f| !f.is_empty())
            .or(self.question.as_deref())
    }

    /// Merge a stage's partial update into the state.
    pub fn merge(&mut self, update: StateUpdate) {
        if let Some(question) = update.question {
            self.question = Some(question);
        }
        if let Some(feedback) = update.feedback {
            self.feedback = Some(feedback);
        }
        if let Some(documents) = update.documents {
            self.documents = documents;
        }
        if let Some(retrieved_docs) = update.retrieved_docs {
            self.retrieved_docs = retrieved_docs;
        }
        if let Some(context) = update.context {
            self.context = context;
        }
        if let Some(answer) = update.answer {
            self.answer = answer;
        }
        if let Some(user_intent) = update.user_intent {
            self.user_intent = user_intent;
        }
        if let Some(feedbacks) = update.feedbacks {
            self.feedbacks = feedbacks;
        }
        if let Some(memory_hits) = update.memory_hits {
            self.memory_hits = memory_hits;
        }
        if let Some(index_dir) = update.index_dir {
            self.index_dir = Some(index_dir);
        }
        if let Some(entry) = update.new_memory_entry {
            self.new_memory_entry = Some(entry);
        }
    }
}

/// Partial update returned by one stage. `None` fields leave the state
/// untouched; an empty update is the defined no-op outcome.
#[derive(Debug, Default)]
pub struct StateUpdate {
    pub question: Option<String>,
    pub feedback: Option<String>,
    pub documents: Option<Vec<String>>,
    pub retrieved_docs: Option<Vec<String>>,
    pub context: Option<String>,
    pub answer: Option<String>,
    pub user_intent: Option<Vec<String>>,
    pub feedbacks: Option<Vec<String>>,
    pub memory_hits: Option<Vec<HistoryRecord>>,
    pub index_dir: Option<PathBuf>,
    pub new_memory_entry: Option<MemoryEntry>,
}
