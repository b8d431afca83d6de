//! Session History Store
//!
//! One JSON file per session (`session_<id>.json`) holding an append-only
//! `history` array of conversation records. Also provides the keyword
//! relevance scorer used by the pipeline's memory-read stage.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use super::now_ts;

/// Role of a history record author
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User turn
    User,

    /// Assistant turn
    Assistant,

    /// System note
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// One conversational turn. Never mutated after being appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    /// Author of the turn
    pub role: Role,

    /// Turn text
    pub text: String,

    /// UNIX timestamp (fractional seconds) stamped at append time
    pub ts: f64,
}

/// On-disk shape of a session file
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    history: Vec<HistoryRecord>,
}

/// Append-only per-session conversation history.
///
/// Persistence is whole-file rewrite: `append` loads the current history,
/// pushes one record, and writes the file back. Readers never observe a
/// partially written history, but concurrent writers can lose updates.
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, session_id: &str) -> PathBuf {
        self.root.join(format!("session_{}.json", session_id))
    }

    /// Create an empty history for the session if none exists.
    ///
    /// Idempotent: an existing history is never overwritten.
    pub fn init(&self, session_id: &str) -> Result<()> {
        let path = self.path(session_id);
        if path.exists() {
            return Ok(());
        }
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create {}", self.root.display()))?;
        let contents = serde_json::to_string_pretty(&SessionFile::default())?;
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!(session_id, "initialized session history");
        Ok(())
    }

    /// Load the full history for the session, initializing it if absent.
    pub fn load(&self, session_id: &str) -> Result<Vec<HistoryRecord>> {
        self.init(session_id)?;
        let path = self.path(session_id);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file: SessionFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(file.history)
    }

    /// Append one record with the current timestamp.
    pub fn append(&self, session_id: &str, role: Role, text: &str) -> Result<()> {
        let mut history = self.load(session_id)?;
        history.push(HistoryRecord {
            role,
            text: text.to_string(),
            ts: now_ts(),
        });
        let path = self.path(session_id);
        let contents = serde_json::to_string_pretty(&SessionFile { history })?;
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Find the most recent `user` record and, if present, the record
    /// immediately following it (normally the paired assistant reply).
    ///
    /// Returns `Ok(None)` when the history contains no user record at all.
    pub fn find_last_exchange(
        &self,
        session_id: &str,
    ) -> Result<Option<(HistoryRecord, Option<HistoryRecord>)>> {
        let history = self.load(session_id)?;
        for (i, record) in history.iter().enumerate().rev() {
            if record.role == Role::User {
                let reply = history.get(i + 1).cloned();
                return Ok(Some((record.clone(), reply)));
            }
        }
        Ok(None)
    }

    /// Rank history records against the query by keyword occurrence count.
    ///
    /// The query is split on whitespace into lowercase tokens longer than
    /// one character (deduplicated); each record scores the sum of
    /// non-overlapping token occurrences in its lowercased text. Results
    /// are sorted descending by score (stable, so ties keep their original
    /// relative order), zero-score records are excluded, and at most
    /// `top_k` records are returned.
    pub fn score_relevant(
        &self,
        session_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<HistoryRecord>> {
        let history = self.load(session_id)?;
        let tokens: HashSet<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .filter(|t| t.chars().count() > 1)
            .collect();

        let mut scored: Vec<(usize, HistoryRecord)> = history
            .into_iter()
            .map(|record| {
                let text = record.text.to_lowercase();
                let score = tokens.iter().map(|t| text.matches(t.as_str()).count()).sum();
                (score, record)
            })
            .collect();

        scored.sort_by_key(|(score, _)| std::cmp::Reverse(*score));
        Ok(scored
            .into_iter()
            .filter(|(score, _)| *score > 0)
            .take(top_k)
            .map(|(_, record)| record)
            .collect())
    }
}
