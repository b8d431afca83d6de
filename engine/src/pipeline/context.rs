//! Context Assembler
//!
//! Merges external vector hits with memory hits into the single context
//! blob handed to the generation capability. When the vector index has
//! nothing, falls back to a naive case-insensitive substring scan over the
//! session's raw uploaded documents.

use crate::memory::HistoryRecord;

/// Maximum characters taken from each document matched by the fallback scan.
const FALLBACK_SNIPPET_CHARS: usize = 1000;

pub struct ContextAssembler {
    snippet_chars: usize,
}

impl ContextAssembler {
    pub fn new() -> Self {
        Self {
            snippet_chars: FALLBACK_SNIPPET_CHARS,
        }
    }

    /// Assemble the retrieved-document list and final context string.
    ///
    /// Vector hits, when present, are the retrieved documents. Otherwise
    /// every raw document containing the query (case-insensitive) is taken,
    /// truncated to a fixed-size prefix. The context is the blank-line
    /// separated concatenation of retrieved documents followed by the
    /// memory-hit texts; an empty context is a valid outcome.
    pub fn assemble(
        &self,
        query: &str,
        vector_hits: Vec<String>,
        documents: &[String],
        memory_hits: &[HistoryRecord],
    ) -> (Vec<String>, String) {
        let retrieved = if !vector_hits.is_empty() {
            vector_hits
        } else {
            let needle = query.to_lowercase();
            documents
                .iter()
                .filter(|d| !needle.is_empty() && d.to_lowercase().contains(&needle))
                .map(|d| d.chars().take(self.snippet_chars).collect::<String>())
                .collect()
        };

        let mut parts: Vec<&str> = retrieved.iter().map(String::as_str).collect();
        parts.extend(memory_hits.iter().map(|h| h.text.as_str()));
        let context = parts.join("\n\n");

        (retrieved, context)
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new()
    }
}
