// Insight Document-QA Engine
// Main entry point for the insight binary

use anyhow::{bail, Context};
use clap::Parser;
use std::sync::Arc;

use insight_engine::cli::{Cli, Command};
use insight_engine::config::Config;
use insight_engine::documents::{PlainTextExtractor, UploadedFile};
use insight_engine::index::NoopIndex;
use insight_engine::llm::openai::OpenAIProvider;
use insight_engine::pipeline::PipelineResponse;
use insight_engine::service::InsightService;
use insight_engine::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize basic telemetry first (before config is loaded)
    init_telemetry();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // Re-initialize telemetry with config-driven log level
    // (only takes effect if RUST_LOG env var is not set)
    let level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(level);

    if let Command::ConfigPath = cli.command {
        println!("{}", Config::default_path().display());
        return Ok(());
    }

    let service = InsightService::new(
        &config,
        Arc::new(PlainTextExtractor),
        Arc::new(NoopIndex),
        Arc::new(OpenAIProvider::new(config.llm.clone())),
    );

    match cli.command {
        Command::Upload { files, session } => {
            let mut uploads = Vec::new();
            for path in &files {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .with_context(|| format!("Bad file name: {}", path.display()))?
                    .to_string();
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                uploads.push(UploadedFile { name, bytes });
            }

            let receipt = service.upload(session, uploads).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            } else {
                println!("session: {}", receipt.session_id);
                println!("uploaded: {}", receipt.accepted.join(", "));
            }
            Ok(())
        }

        Command::Ask { question, session } => {
            let printer = spawn_progress_printer(&service, &session).await;
            let response = service.ask(&session, &question).await?;
            printer.await.ok();
            print_response(&response, cli.json)
        }

        Command::Feedback {
            session,
            satisfied,
            unsatisfied,
            text,
        } => {
            if satisfied == unsatisfied {
                bail!("pass exactly one of --satisfied or --unsatisfied");
            }
            let printer = spawn_progress_printer(&service, &session).await;
            let response = service.feedback(&session, satisfied, text).await?;
            printer.await.ok();
            print_response(&response, cli.json)
        }

        Command::ConfigPath => unreachable!("handled above"),
    }
}

/// Stream the session's stage status lines to stderr while the pipeline
/// runs; the task ends when the stream-complete sentinel arrives.
async fn spawn_progress_printer(
    service: &InsightService,
    session_id: &str,
) -> tokio::task::JoinHandle<()> {
    let mut subscription = service.progress(session_id).await;
    tokio::spawn(async move {
        while let Some(line) = subscription.next().await {
            eprintln!(".. {}", line);
        }
    })
}

fn print_response(response: &PipelineResponse, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }
    println!("{}", response.answer);
    if !response.user_intent.is_empty() {
        println!("\nYou might ask next:");
        for intent in &response.user_intent {
            println!("  - {}", intent);
        }
    }
    Ok(())
}
