//! Vector Index Abstraction
//!
//! Embedding computation and similarity search are external capabilities.
//! The pipeline only needs two operations: build artifacts for a session's
//! documents, and fetch top-k hits for a query. [`NoopIndex`] is the
//! reference implementation used when no vector backend is wired in; it
//! builds nothing and finds nothing, which makes the pipeline fall back to
//! the naive substring scan over raw documents.

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Session-scoped vector index capability.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Build (or rebuild) index artifacts for the session's documents.
    ///
    /// Returns the artifact directory, or `None` when nothing was built
    /// (e.g. no documents, or the backend keeps no on-disk artifacts).
    async fn build(&self, session_id: &str, documents: &[String]) -> Result<Option<PathBuf>>;

    /// Top-k similarity hits for the query. Empty when no index exists
    /// for the session.
    async fn search(&self, session_id: &str, query: &str, k: usize) -> Result<Vec<String>>;
}

/// Reference implementation with no backing index.
pub struct NoopIndex;

#[async_trait]
impl VectorIndex for NoopIndex {
    async fn build(&self, _session_id: &str, _documents: &[String]) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    async fn search(&self, _session_id: &str, _query: &str, _k: usize) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_index_builds_nothing() {
        let index = NoopIndex;
        let built = index.build("s1", &["doc".to_string()]).await.unwrap();
        assert!(built.is_none());
        let hits = index.search("s1", "anything", 3).await.unwrap();
        assert!(hits.is_empty());
    }
}
