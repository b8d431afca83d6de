//! Feedback Store
//!
//! One JSON file per session (`feedback_<id>.json`) holding a flat array of
//! judged-answer records. Records are append-only; an unreadable or corrupt
//! file is treated as an empty array rather than an error, accepting silent
//! data loss over a failed request.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use super::now_ts;

/// A persisted judgment about one prior question/answer pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackRecord {
    /// Session the judged exchange belongs to
    pub session_id: String,

    /// The question of the judged exchange
    pub question: String,

    /// The answer of the judged exchange, when one existed
    #[serde(default)]
    pub answer: Option<String>,

    /// Whether the user was satisfied with the answer
    pub satisfied: bool,

    /// Free-text feedback, present on unsatisfied judgments that carry text
    #[serde(default)]
    pub feedback: Option<String>,

    /// UNIX timestamp (fractional seconds) stamped at save time
    #[serde(default)]
    pub ts: f64,
}

/// Append-only per-session feedback log.
pub struct FeedbackStore {
    root: PathBuf,
}

impl FeedbackStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, session_id: &str) -> PathBuf {
        self.root.join(format!("feedback_{}.json", session_id))
    }

    /// Append one record, stamping its timestamp.
    ///
    /// The session's full array is read back, extended, and rewritten.
    pub fn save(&self, mut entry: FeedbackRecord) -> Result<()> {
        entry.ts = now_ts();
        let session_id = entry.session_id.clone();
        let mut records = self.load_all(&session_id);
        records.push(entry);

        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create {}", self.root.display()))?;
        let path = self.path(&session_id);
        let contents = serde_json::to_string_pretty(&records)?;
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Load the full feedback sequence for the session.
    ///
    /// A missing, unreadable, or corrupt file yields an empty vector.
    pub fn load_all(&self, session_id: &str) -> Vec<FeedbackRecord> {
        let path = self.path(session_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&contents) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    session_id,
                    error = %e,
                    "corrupt feedback file, treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// The last `limit` records in original (oldest-first) order.
    pub fn recent(&self, session_id: &str, limit: usize) -> Vec<FeedbackRecord> {
        let records = self.load_all(session_id);
        let skip = records.len().saturating_sub(limit);
        records.into_iter().skip(skip).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(session_id: &str, question: &str, satisfied: bool) -> FeedbackRecord {
        FeedbackRecord {
            session_id: session_id.to_string(),
            question: question.to_string(),
            answer: Some("an answer".to_string()),
            satisfied,
            feedback: None,
            ts: 0.0,
        }
    }

    #[test]
    fn test_save_appends_and_stamps_timestamp() {
        let dir = tempdir().unwrap();
        let store = FeedbackStore::new(dir.path());

        store.save(record("s1", "q1", true)).unwrap();
        store.save(record("s1", "q2", false)).unwrap();

        let records = store.load_all("s1");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].question, "q1");
        assert_eq!(records[1].question, "q2");
        assert!(records[0].ts > 0.0);
        assert!(records[0].ts <= records[1].ts);
    }

    #[test]
    fn test_load_all_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = FeedbackStore::new(dir.path());
        assert!(store.load_all("nope").is_empty());
    }

    #[test]
    fn test_load_all_corrupt_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = FeedbackStore::new(dir.path());
        std::fs::write(dir.path().join("feedback_s1.json"), "{not json!").unwrap();
        assert!(store.load_all("s1").is_empty());
    }

    #[test]
    fn test_save_over_corrupt_file_starts_fresh() {
        let dir = tempdir().unwrap();
        let store = FeedbackStore::new(dir.path());
        std::fs::write(dir.path().join("feedback_s1.json"), "][").unwrap();

        store.save(record("s1", "q1", false)).unwrap();
        let records = store.load_all("s1");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_recent_returns_tail_in_original_order() {
        let dir = tempdir().unwrap();
        let store = FeedbackStore::new(dir.path());
        for i in 0..5 {
            store.save(record("s1", &format!("q{}", i), false)).unwrap();
        }

        let recent = store.recent("s1", 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].question, "q3");
        assert_eq!(recent[1].question, "q4");

        // Fewer records than the limit: return them all.
        assert_eq!(store.recent("s1", 50).len(), 5);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let dir = tempdir().unwrap();
        let store = FeedbackStore::new(dir.path());
        store.save(record("s1", "q1", true)).unwrap();
        assert!(store.load_all("s2").is_empty());
    }
}
