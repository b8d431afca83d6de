//! CLI interface for Insight
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for the document-QA engine.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Insight Document-QA Engine
///
/// Upload documents into a session, ask context-grounded questions, and
/// steer regeneration with satisfaction feedback.
#[derive(Parser, Debug)]
#[command(name = "insight")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload documents into a session (creates one when --session is omitted)
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Session to add the documents to
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Ask a question against a session's documents
    Ask {
        /// The question to answer
        question: String,

        /// Session holding the documents
        #[arg(short, long)]
        session: String,
    },

    /// Judge the session's last answer; an unsatisfied verdict regenerates it
    Feedback {
        /// Session whose last answer is being judged
        #[arg(short, long)]
        session: String,

        /// The last answer was satisfying
        #[arg(long, conflicts_with = "unsatisfied")]
        satisfied: bool,

        /// The last answer was not satisfying
        #[arg(long)]
        unsatisfied: bool,

        /// Feedback text used to steer the regenerated answer
        text: Option<String>,
    },

    /// Print the configuration file path
    ConfigPath,
}
