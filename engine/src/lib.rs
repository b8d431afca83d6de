//! Insight Engine Library
//!
//! This library provides the core functionality of the Insight document-QA
//! engine: session memory, feedback memory, the progress broadcaster, and
//! the pipeline orchestrator. It is used by both the main binary and
//! integration tests.

/// Configuration management module
pub mod config;

/// Uploaded document storage and text extraction
pub mod documents;

/// Vector index abstraction layer
pub mod index;

/// LLM provider abstraction layer
pub mod llm;

/// Session and feedback memory stores
pub mod memory;

/// Pipeline orchestration module
pub mod pipeline;

/// Per-session progress event broadcasting
pub mod progress;

/// Service boundary surface (upload / ask / feedback / progress)
pub mod service;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;
