//! Pipeline Orchestrator
//!
//! The stage graph. Entry routing is an exhaustive match on the request's
//! [`Verdict`]; from there the active path is a fixed stage sequence. The
//! scheduler loop applies uniform instrumentation around every stage:
//! publish the stage's status line to the progress stream, log the entry,
//! run the stage, merge its partial update.
//!
//! Failure policy: "nothing found" conditions (no documents, no index, no
//! memory hits, no prior exchange) and unreadable storage degrade to empty
//! values inside the owning stage. Only a generation-capability error
//! aborts the invocation; even then the progress stream still terminates
//! with its sentinel.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

use crate::documents::{DocumentStore, TextExtractor};
use crate::index::VectorIndex;
use crate::llm::{parse_intent_list, GenerationProvider, Message};
use crate::memory::{now_ts, FeedbackRecord, FeedbackStore, Role, SessionStore};
use crate::pipeline::context::ContextAssembler;
use crate::pipeline::prompts;
use crate::pipeline::state::{
    MemoryEntry, PipelineRequest, PipelineState, StateUpdate, Verdict,
};
use crate::progress::{ProgressBroadcaster, ProgressEvent};

/// How many memory hits the scorer contributes to the context.
const MEMORY_TOP_K: usize = 3;

/// How many vector hits retrieval asks the index for.
const VECTOR_TOP_K: usize = 3;

/// How many recent unsatisfied feedback strings the prompt carries.
const FEEDBACK_LIMIT: usize = 10;

/// How many predicted follow-up questions are kept.
const INTENT_LIMIT: usize = 3;

/// The pipeline's processing stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadDocuments,
    BuildIndex,
    FeedbackRead,
    MemoryRead,
    Retrieve,
    GenerateAnswer,
    InferIntent,
    MemoryWrite,
    RecordSatisfied,
    RecordUnsatisfied,
    SummaryAnswer,
}

impl Stage {
    /// Stable stage name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::LoadDocuments => "load_documents",
            Stage::BuildIndex => "build_index",
            Stage::FeedbackRead => "feedback_read",
            Stage::MemoryRead => "memory_read",
            Stage::Retrieve => "retrieve",
            Stage::GenerateAnswer => "generate_answer",
            Stage::InferIntent => "infer_intent",
            Stage::MemoryWrite => "memory_write",
            Stage::RecordSatisfied => "record_satisfied",
            Stage::RecordUnsatisfied => "record_unsatisfied",
            Stage::SummaryAnswer => "summary_answer",
        }
    }

    /// Human-readable status line published to the progress stream.
    pub fn status(&self) -> &'static str {
        match self {
            Stage::LoadDocuments => "parsing uploaded documents",
            Stage::BuildIndex => "building vector index",
            Stage::FeedbackRead => "collecting past feedback",
            Stage::MemoryRead => "matching prior memory",
            Stage::Retrieve => "retrieving related context",
            Stage::GenerateAnswer => "generating answer, this can take a while",
            Stage::InferIntent => "inferring follow-up intents",
            Stage::MemoryWrite => "writing conversation memory",
            Stage::RecordSatisfied => "recording feedback",
            Stage::RecordUnsatisfied => "recording feedback",
            Stage::SummaryAnswer => "finalizing answer",
        }
    }
}

/// The fresh-question path: full chain from document loading to the
/// terminal merge point.
const FRESH_PATH: &[Stage] = &[
    Stage::LoadDocuments,
    Stage::BuildIndex,
    Stage::FeedbackRead,
    Stage::MemoryRead,
    Stage::Retrieve,
    Stage::GenerateAnswer,
    Stage::InferIntent,
    Stage::MemoryWrite,
    Stage::SummaryAnswer,
];

/// The satisfied path: record the judgment and exit.
const SATISFIED_PATH: &[Stage] = &[Stage::RecordSatisfied, Stage::SummaryAnswer];

/// The unsatisfied path: record the judgment, then regenerate using the
/// feedback text as the effective query.
const UNSATISFIED_PATH: &[Stage] = &[
    Stage::RecordUnsatisfied,
    Stage::FeedbackRead,
    Stage::MemoryRead,
    Stage::Retrieve,
    Stage::GenerateAnswer,
    Stage::InferIntent,
    Stage::MemoryWrite,
    Stage::SummaryAnswer,
];

/// Select the active stage path for a verdict.
pub fn entry_path(verdict: Verdict) -> &'static [Stage] {
    match verdict {
        Verdict::Fresh => FRESH_PATH,
        Verdict::Satisfied => SATISFIED_PATH,
        Verdict::Unsatisfied => UNSATISFIED_PATH,
    }
}

/// Public fields of the accumulated state, returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResponse {
    pub session_id: String,
    pub question: String,
    pub context: String,
    pub answer: String,
    pub user_intent: Vec<String>,
}

/// Drives one request through its stage path.
pub struct Orchestrator {
    sessions: Arc<SessionStore>,
    feedback: Arc<FeedbackStore>,
    documents: Arc<DocumentStore>,
    extractor: Arc<dyn TextExtractor>,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn GenerationProvider>,
    progress: Arc<ProgressBroadcaster>,
    assembler: ContextAssembler,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<SessionStore>,
        feedback: Arc<FeedbackStore>,
        documents: Arc<DocumentStore>,
        extractor: Arc<dyn TextExtractor>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn GenerationProvider>,
        progress: Arc<ProgressBroadcaster>,
    ) -> Self {
        Self {
            sessions,
            feedback,
            documents,
            extractor,
            index,
            llm,
            progress,
            assembler: ContextAssembler::new(),
        }
    }

    /// Execute one invocation end to end.
    ///
    /// Exactly one stream-complete sentinel is published for the session,
    /// whether the invocation succeeds or aborts on a generation error.
    pub async fn run(&self, request: PipelineRequest) -> Result<PipelineResponse> {
        let mut state = PipelineState::from_request(request);
        let result = self.drive(&mut state).await;
        self.progress
            .publish(&state.session_id, ProgressEvent::Done)
            .await;
        result?;
        Ok(PipelineResponse {
            session_id: state.session_id,
            question: state.question.unwrap_or_default(),
            context: state.context,
            answer: state.answer,
            user_intent: state.user_intent,
        })
    }

    async fn drive(&self, state: &mut PipelineState) -> Result<()> {
        for stage in entry_path(state.verdict) {
            self.progress
                .publish(
                    &state.session_id,
                    ProgressEvent::Status(stage.status().to_string()),
                )
                .await;
            tracing::info!(
                stage = stage.name(),
                session_id = %state.session_id,
                "entering stage"
            );
            let update = self.run_stage(*stage, state).await?;
            state.merge(update);
        }
        Ok(())
    }

    async fn run_stage(&self, stage: Stage, state: &PipelineState) -> Result<StateUpdate> {
        match stage {
            Stage::LoadDocuments => self.load_documents(state).await,
            Stage::BuildIndex => self.build_index(state).await,
            Stage::FeedbackRead => Ok(self.feedback_read(state)),
            Stage::MemoryRead => Ok(self.memory_read(state)),
            Stage::Retrieve => self.retrieve(state).await,
            Stage::GenerateAnswer => self.generate_answer(state).await,
            Stage::InferIntent => self.infer_intent(state).await,
            Stage::MemoryWrite => Ok(self.memory_write(state)),
            Stage::RecordSatisfied => Ok(self.record_feedback(state, true)),
            Stage::RecordUnsatisfied => Ok(self.record_feedback(state, false)),
            Stage::SummaryAnswer => Ok(StateUpdate::default()),
        }
    }

    /// Read the session's uploaded documents as raw text and make sure its
    /// history exists.
    async fn load_documents(&self, state: &PipelineState) -> Result<StateUpdate> {
        let documents = match self
            .documents
            .load_texts(&state.session_id, self.extractor.as_ref())
            .await
        {
            Ok(documents) => documents,
            Err(e) => {
                tracing::warn!(session_id = %state.session_id, error = %e, "document load failed, continuing without documents");
                Vec::new()
            }
        };
        if let Err(e) = self.sessions.init(&state.session_id) {
            tracing::warn!(session_id = %state.session_id, error = %e, "session init failed");
        }
        Ok(StateUpdate {
            documents: Some(documents),
            ..StateUpdate::default()
        })
    }

    /// Hand the documents to the external index capability. No-op when the
    /// session has no documents.
    async fn build_index(&self, state: &PipelineState) -> Result<StateUpdate> {
        if state.documents.is_empty() {
            return Ok(StateUpdate::default());
        }
        match self.index.build(&state.session_id, &state.documents).await {
            Ok(index_dir) => Ok(StateUpdate {
                index_dir,
                ..StateUpdate::default()
            }),
            Err(e) => {
                tracing::warn!(session_id = %state.session_id, error = %e, "index build failed, continuing without index");
                Ok(StateUpdate::default())
            }
        }
    }

    /// Collect the deduplicated recent unsatisfied-feedback strings,
    /// newest first, capped at [`FEEDBACK_LIMIT`].
    fn feedback_read(&self, state: &PipelineState) -> StateUpdate {
        let records = self.feedback.load_all(&state.session_id);
        let mut seen = std::collections::HashSet::new();
        let mut feedbacks = Vec::new();
        for record in records.iter().rev() {
            if record.satisfied {
                continue;
            }
            let Some(text) = record.feedback.as_deref().filter(|t| !t.is_empty()) else {
                continue;
            };
            if seen.insert(text.to_string()) {
                feedbacks.push(text.to_string());
                if feedbacks.len() == FEEDBACK_LIMIT {
                    break;
                }
            }
        }
        StateUpdate {
            feedbacks: Some(feedbacks),
            ..StateUpdate::default()
        }
    }

    /// Score the session history against the effective query.
    fn memory_read(&self, state: &PipelineState) -> StateUpdate {
        let Some(query) = state.effective_query() else {
            return StateUpdate::default();
        };
        let memory_hits = match self
            .sessions
            .score_relevant(&state.session_id, query, MEMORY_TOP_K)
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(session_id = %state.session_id, error = %e, "memory scoring failed");
                Vec::new()
            }
        };
        StateUpdate {
            memory_hits: Some(memory_hits),
            ..StateUpdate::default()
        }
    }

    /// Assemble the grounding context from vector hits, raw documents, and
    /// memory hits.
    async fn retrieve(&self, state: &PipelineState) -> Result<StateUpdate> {
        let query = state.effective_query().unwrap_or_default();
        let vector_hits = match self
            .index
            .search(&state.session_id, query, VECTOR_TOP_K)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(session_id = %state.session_id, error = %e, "vector search failed, using fallback scan");
                Vec::new()
            }
        };
        let (retrieved_docs, context) =
            self.assembler
                .assemble(query, vector_hits, &state.documents, &state.memory_hits);
        Ok(StateUpdate {
            retrieved_docs: Some(retrieved_docs),
            context: Some(context),
            ..StateUpdate::default()
        })
    }

    /// Record the question in history, then call the generation capability
    /// with the assembled context and past dissatisfaction feedback.
    async fn generate_answer(&self, state: &PipelineState) -> Result<StateUpdate> {
        let question = state.question.clone().unwrap_or_default();
        if let Err(e) = self
            .sessions
            .append(&state.session_id, Role::User, &question)
        {
            tracing::warn!(session_id = %state.session_id, error = %e, "failed to append question to history");
        }

        let prompt = prompts::answer_prompt(&question, &state.context, &state.feedbacks);
        let answer = self.llm.generate(&[Message::user(prompt)]).await?;

        let entry = MemoryEntry {
            question,
            answer: answer.clone(),
            context: state.context.clone(),
            feedback: state.feedback.clone(),
            ts: now_ts(),
        };
        Ok(StateUpdate {
            answer: Some(answer),
            new_memory_entry: Some(entry),
            ..StateUpdate::default()
        })
    }

    /// Ask the generation capability for 1-3 predicted follow-up questions.
    async fn infer_intent(&self, state: &PipelineState) -> Result<StateUpdate> {
        let question = state.question.as_deref().unwrap_or_default();
        let prompt = prompts::intent_prompt(question, &state.answer, &state.context);
        let response = self.llm.generate(&[Message::user(prompt)]).await?;

        let mut user_intent = parse_intent_list(&response);
        user_intent.truncate(INTENT_LIMIT);
        if user_intent.is_empty() {
            tracing::warn!(session_id = %state.session_id, "intent response was not parseable, returning no intents");
        }
        Ok(StateUpdate {
            user_intent: Some(user_intent),
            ..StateUpdate::default()
        })
    }

    /// Persist the assistant's reply into history.
    fn memory_write(&self, state: &PipelineState) -> StateUpdate {
        if let Some(entry) = &state.new_memory_entry {
            if let Err(e) = self
                .sessions
                .append(&state.session_id, Role::Assistant, &entry.answer)
            {
                tracing::warn!(session_id = %state.session_id, error = %e, "failed to append answer to history");
            }
        }
        StateUpdate::default()
    }

    /// Attribute the verdict to the session's last exchange and persist a
    /// feedback record. With no prior user turn the stage is a defined
    /// no-op: nothing is written and the state is left unmodified.
    fn record_feedback(&self, state: &PipelineState, satisfied: bool) -> StateUpdate {
        let exchange = match self.sessions.find_last_exchange(&state.session_id) {
            Ok(exchange) => exchange,
            Err(e) => {
                tracing::warn!(session_id = %state.session_id, error = %e, "history lookup failed, dropping feedback");
                return StateUpdate::default();
            }
        };
        let Some((question, reply)) = exchange else {
            tracing::warn!(session_id = %state.session_id, "no prior exchange to attribute feedback to, dropping it");
            return StateUpdate::default();
        };

        let answer = reply.map(|r| r.text);
        let record = FeedbackRecord {
            session_id: state.session_id.clone(),
            question: question.text.clone(),
            answer: answer.clone(),
            satisfied,
            feedback: state.feedback.clone(),
            ts: 0.0,
        };
        if let Err(e) = self.feedback.save(record) {
            tracing::warn!(session_id = %state.session_id, error = %e, "failed to persist feedback record");
        }

        StateUpdate {
            question: Some(question.text),
            answer,
            feedback: state.feedback.clone(),
            ..StateUpdate::default()
        }
    }
}
