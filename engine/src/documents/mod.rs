//! Uploaded Document Storage
//!
//! Raw uploaded files live under a per-session directory. Text extraction
//! is behind the [`TextExtractor`] trait so per-format parsers (PDF,
//! spreadsheets, ...) can be plugged in externally; the built-in extractor
//! handles plain text (`.txt` / `.md`) only.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One file submitted through the upload surface.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// File name as submitted (only the final path component is kept)
    pub name: String,

    /// Raw file bytes
    pub bytes: Vec<u8>,
}

/// Turns a stored file into raw text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Whether this extractor can handle the given file name.
    fn supports(&self, file_name: &str) -> bool;

    /// Extract the full text of the file.
    async fn extract(&self, path: &Path) -> Result<String>;
}

/// Built-in extractor for plain-text formats.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    fn supports(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        lower.ends_with(".txt") || lower.ends_with(".md")
    }

    async fn extract(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

/// Per-session storage of raw uploaded files.
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the session's uploaded files.
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    /// Persist uploaded files into the session directory, returning the
    /// accepted file names. Uploads are incremental: existing files from
    /// earlier uploads are kept, and a re-uploaded name is overwritten.
    pub async fn save_files(
        &self,
        session_id: &str,
        files: &[UploadedFile],
    ) -> Result<Vec<String>> {
        let dir = self.session_dir(session_id);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut accepted = Vec::new();
        for file in files {
            // Keep only the final path component of whatever name was sent.
            let name = Path::new(&file.name)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            if name.is_empty() {
                tracing::warn!(session_id, raw_name = %file.name, "skipping unnamed upload");
                continue;
            }
            let path = dir.join(&name);
            fs::write(&path, &file.bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            accepted.push(name);
        }
        Ok(accepted)
    }

    /// Extract raw text from every supported file in the session directory,
    /// in file-name order. A missing directory yields an empty list.
    pub async fn load_texts(
        &self,
        session_id: &str,
        extractor: &dyn TextExtractor,
    ) -> Result<Vec<String>> {
        let dir = self.session_dir(session_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&dir)
            .await
            .with_context(|| format!("Failed to list {}", dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if extractor.supports(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        let mut texts = Vec::new();
        for name in names {
            match extractor.extract(&dir.join(&name)).await {
                Ok(text) => texts.push(text),
                Err(e) => {
                    tracing::warn!(session_id, file = %name, error = %e, "skipping unreadable upload");
                }
            }
        }
        Ok(texts)
    }
}

/// Generate a short opaque session id (first 8 hex chars of a UUID v4).
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn upload(name: &str, contents: &str) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            bytes: contents.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_save_and_load_texts() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        let accepted = store
            .save_files("s1", &[upload("b.txt", "bravo"), upload("a.md", "alpha")])
            .await
            .unwrap();
        assert_eq!(accepted, vec!["b.txt", "a.md"]);

        let texts = store.load_texts("s1", &PlainTextExtractor).await.unwrap();
        assert_eq!(texts, vec!["alpha", "bravo"]);
    }

    #[tokio::test]
    async fn test_unsupported_files_are_ignored() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        store
            .save_files("s1", &[upload("doc.txt", "text"), upload("img.png", "png")])
            .await
            .unwrap();

        let texts = store.load_texts("s1", &PlainTextExtractor).await.unwrap();
        assert_eq!(texts, vec!["text"]);
    }

    #[tokio::test]
    async fn test_load_texts_missing_session_is_empty() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        let texts = store.load_texts("nope", &PlainTextExtractor).await.unwrap();
        assert!(texts.is_empty());
    }

    #[tokio::test]
    async fn test_uploads_are_incremental() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        store.save_files("s1", &[upload("a.txt", "one")]).await.unwrap();
        store.save_files("s1", &[upload("b.txt", "two")]).await.unwrap();

        let texts = store.load_texts("s1", &PlainTextExtractor).await.unwrap();
        assert_eq!(texts.len(), 2);
    }

    #[tokio::test]
    async fn test_path_components_are_stripped() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        let accepted = store
            .save_files("s1", &[upload("../../etc/notes.txt", "safe")])
            .await
            .unwrap();
        assert_eq!(accepted, vec!["notes.txt"]);
        assert!(dir.path().join("s1").join("notes.txt").is_file());
    }

    #[test]
    fn test_generate_session_id_shape() {
        let id = generate_session_id();
        assert_eq!(id.len(), 8);
        assert_ne!(id, generate_session_id());
    }
}
