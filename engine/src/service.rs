//! Service boundary surface.
//!
//! Bundles the stores, broadcaster, and orchestrator behind the four
//! operations a front end consumes: upload, ask, feedback, and the
//! progress stream. HTTP/GUI presentation stays outside this crate.

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::documents::{generate_session_id, DocumentStore, TextExtractor, UploadedFile};
use crate::index::VectorIndex;
use crate::llm::GenerationProvider;
use crate::memory::{FeedbackStore, SessionStore};
use crate::pipeline::{Orchestrator, PipelineRequest, PipelineResponse};
use crate::progress::{ProgressBroadcaster, ProgressSubscription};

/// Result of an upload: the (possibly generated) session id and the file
/// names that were accepted.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UploadReceipt {
    pub session_id: String,
    pub accepted: Vec<String>,
}

/// The document-QA service.
pub struct InsightService {
    sessions: Arc<SessionStore>,
    documents: Arc<DocumentStore>,
    progress: Arc<ProgressBroadcaster>,
    orchestrator: Orchestrator,
}

impl InsightService {
    /// Wire up the service from config plus the two external capabilities.
    pub fn new(
        config: &Config,
        extractor: Arc<dyn TextExtractor>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn GenerationProvider>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(config.core.memory_dir()));
        let feedback = Arc::new(FeedbackStore::new(config.core.feedback_dir()));
        let documents = Arc::new(DocumentStore::new(config.core.uploads_dir()));
        let progress = Arc::new(ProgressBroadcaster::new());

        let orchestrator = Orchestrator::new(
            Arc::clone(&sessions),
            feedback,
            Arc::clone(&documents),
            extractor,
            index,
            llm,
            Arc::clone(&progress),
        );

        Self {
            sessions,
            documents,
            progress,
            orchestrator,
        }
    }

    /// Store uploaded files for the session (generating a session id when
    /// none was supplied) and make sure the session's history exists.
    pub async fn upload(
        &self,
        session_id: Option<String>,
        files: Vec<UploadedFile>,
    ) -> Result<UploadReceipt> {
        let session_id = session_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_session_id);
        let accepted = self.documents.save_files(&session_id, &files).await?;
        self.sessions.init(&session_id)?;
        tracing::info!(session_id = %session_id, files = accepted.len(), "upload accepted");
        Ok(UploadReceipt {
            session_id,
            accepted,
        })
    }

    /// Ask a fresh question in the session.
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<PipelineResponse> {
        self.orchestrator
            .run(PipelineRequest::ask(session_id, question))
            .await
    }

    /// Submit a satisfaction verdict about the session's last answer.
    /// An unsatisfied verdict regenerates the answer; a satisfied one is
    /// merely acknowledged.
    pub async fn feedback(
        &self,
        session_id: &str,
        satisfied: bool,
        feedback: Option<String>,
    ) -> Result<PipelineResponse> {
        self.orchestrator
            .run(PipelineRequest::verdict(session_id, satisfied, feedback))
            .await
    }

    /// Subscribe to the session's progress stream.
    pub async fn progress(&self, session_id: &str) -> ProgressSubscription {
        self.progress.subscribe(session_id).await
    }

    /// The broadcaster, exposed for callers that manage their own
    /// subscription lifecycle.
    pub fn broadcaster(&self) -> &Arc<ProgressBroadcaster> {
        &self.progress
    }
}
