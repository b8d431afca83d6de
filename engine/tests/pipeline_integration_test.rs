//! End-to-end pipeline tests with a scripted generation provider.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use insight_engine::config::{Config, CoreConfig, LLMConfig};
use insight_engine::documents::{PlainTextExtractor, UploadedFile};
use insight_engine::index::NoopIndex;
use insight_engine::llm::{GenerationProvider, Message};
use insight_engine::memory::{FeedbackStore, Role, SessionStore};
use insight_engine::service::InsightService;

/// Deterministic provider: records every prompt, answers questions with a
/// numbered string, and returns a fixed intents payload for intent prompts.
struct ScriptedProvider {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, messages: &[Message]) -> insight_engine::llm::Result<String> {
        let prompt = messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt.clone());
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains("\"intents\"") {
            Ok(r#"{"intents": ["follow-up one", "follow-up two"]}"#.to_string())
        } else {
            Ok(format!("scripted answer {}", n))
        }
    }
}

fn test_config(data_dir: &Path) -> Config {
    Config {
        core: CoreConfig {
            data_dir: data_dir.to_path_buf(),
            log_level: "info".to_string(),
        },
        llm: LLMConfig::default(),
    }
}

fn build_service(data_dir: &Path) -> (InsightService, Arc<ScriptedProvider>) {
    let provider = Arc::new(ScriptedProvider::new());
    let service = InsightService::new(
        &test_config(data_dir),
        Arc::new(PlainTextExtractor),
        Arc::new(NoopIndex),
        Arc::clone(&provider) as Arc<dyn GenerationProvider>,
    );
    (service, provider)
}

#[tokio::test]
async fn test_ask_with_empty_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let (service, provider) = build_service(dir.path());

    let response = service.ask("abc123", "What is X?").await.unwrap();

    assert_eq!(response.session_id, "abc123");
    assert_eq!(response.question, "What is X?");
    assert_eq!(response.context, "");
    assert!(response.answer.starts_with("scripted answer"));
    assert!(!response.user_intent.is_empty() && response.user_intent.len() <= 3);
    // One generation call, one intent call.
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_ask_persists_the_exchange() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _provider) = build_service(dir.path());

    service.ask("s1", "remember me").await.unwrap();

    let sessions = SessionStore::new(test_config(dir.path()).core.memory_dir());
    let history = sessions.load("s1").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].text, "remember me");
    assert_eq!(history[1].role, Role::Assistant);
}

#[tokio::test]
async fn test_upload_then_ask_uses_document_context() {
    let dir = tempfile::tempdir().unwrap();
    let (service, provider) = build_service(dir.path());

    let receipt = service
        .upload(
            None,
            vec![UploadedFile {
                name: "notes.txt".to_string(),
                bytes: b"Rust is a systems programming language.".to_vec(),
            }],
        )
        .await
        .unwrap();
    assert_eq!(receipt.accepted, vec!["notes.txt"]);
    assert_eq!(receipt.session_id.len(), 8);

    let response = service.ask(&receipt.session_id, "Rust").await.unwrap();
    assert!(response.context.contains("systems programming"));

    // The answer prompt embeds the assembled context.
    let prompts = provider.prompts();
    assert!(prompts[0].contains("systems programming"));
}

#[tokio::test]
async fn test_satisfied_verdict_skips_generation() {
    let dir = tempfile::tempdir().unwrap();
    let (service, provider) = build_service(dir.path());

    let sessions = SessionStore::new(test_config(dir.path()).core.memory_dir());
    sessions.append("s1", Role::User, "explain Y").unwrap();
    sessions.append("s1", Role::Assistant, "Y is ...").unwrap();

    let response = service.feedback("s1", true, None).await.unwrap();

    assert_eq!(provider.call_count(), 0);
    assert_eq!(response.question, "explain Y");
    assert_eq!(response.answer, "Y is ...");

    let feedback = FeedbackStore::new(test_config(dir.path()).core.feedback_dir());
    let records = feedback.load_all("s1");
    assert_eq!(records.len(), 1);
    assert!(records[0].satisfied);
}

#[tokio::test]
async fn test_feedback_without_prior_exchange_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let (service, provider) = build_service(dir.path());

    let response = service.feedback("empty", true, None).await.unwrap();

    assert_eq!(provider.call_count(), 0);
    assert_eq!(response.question, "");
    assert_eq!(response.answer, "");

    let feedback = FeedbackStore::new(test_config(dir.path()).core.feedback_dir());
    assert!(feedback.load_all("empty").is_empty());
}

#[tokio::test]
async fn test_unsatisfied_verdict_attributes_and_regenerates() {
    let dir = tempfile::tempdir().unwrap();
    let (service, provider) = build_service(dir.path());

    let sessions = SessionStore::new(test_config(dir.path()).core.memory_dir());
    sessions.append("s1", Role::User, "explain Y").unwrap();
    sessions.append("s1", Role::Assistant, "Y is ...").unwrap();

    let response = service
        .feedback("s1", false, Some("too technical".to_string()))
        .await
        .unwrap();

    // Exactly one attributed record.
    let feedback = FeedbackStore::new(test_config(dir.path()).core.feedback_dir());
    let records = feedback.load_all("s1");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].question, "explain Y");
    assert_eq!(records[0].answer.as_deref(), Some("Y is ..."));
    assert!(!records[0].satisfied);
    assert_eq!(records[0].feedback.as_deref(), Some("too technical"));

    // The original turns are untouched; regeneration appended a new pair.
    let history = sessions.load("s1").unwrap();
    assert_eq!(history[0].text, "explain Y");
    assert_eq!(history[1].text, "Y is ...");
    assert_eq!(history.len(), 4);

    // Regeneration happened and the prompt adapted to the feedback.
    assert!(response.answer.starts_with("scripted answer"));
    assert_eq!(provider.call_count(), 2);
    assert!(provider.prompts()[0].contains("- too technical"));
}

#[tokio::test]
async fn test_corrupt_feedback_file_does_not_break_regeneration() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _provider) = build_service(dir.path());

    let sessions = SessionStore::new(test_config(dir.path()).core.memory_dir());
    sessions.append("s1", Role::User, "q").unwrap();
    sessions.append("s1", Role::Assistant, "a").unwrap();

    let feedback_dir = test_config(dir.path()).core.feedback_dir();
    std::fs::create_dir_all(&feedback_dir).unwrap();
    std::fs::write(feedback_dir.join("feedback_s1.json"), "{oops").unwrap();

    let response = service
        .feedback("s1", false, Some("start over".to_string()))
        .await
        .unwrap();
    assert!(!response.answer.is_empty());

    // The corrupt file was replaced by a fresh array with the new record.
    let feedback = FeedbackStore::new(feedback_dir);
    assert_eq!(feedback.load_all("s1").len(), 1);
}

#[tokio::test]
async fn test_progress_stream_terminates_and_deregisters() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _provider) = build_service(dir.path());

    let mut subscription = service.progress("s1").await;
    service.ask("s1", "anything").await.unwrap();

    let mut lines = Vec::new();
    while let Some(line) = subscription.next().await {
        lines.push(line);
    }

    assert!(lines.iter().any(|l| l.contains("generating answer")));
    assert!(lines.iter().any(|l| l.contains("finalizing answer")));
    assert!(!service.broadcaster().is_registered("s1").await);
}

#[tokio::test]
async fn test_satisfied_progress_stream_is_short() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _provider) = build_service(dir.path());

    let mut subscription = service.progress("s1").await;
    service.feedback("s1", true, None).await.unwrap();

    let mut lines = Vec::new();
    while let Some(line) = subscription.next().await {
        lines.push(line);
    }

    // record_satisfied + summary_answer only.
    assert_eq!(lines.len(), 2);
    assert!(!lines.iter().any(|l| l.contains("parsing uploaded documents")));
}
