//! Configuration management
//!
//! This module handles loading, validation, and management of the Insight
//! configuration. Configuration is stored in TOML format at
//! ~/.insight/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Data directory and log level
//! - **llm**: OpenAI-compatible generation endpoint settings
//!
//! # Path Expansion
//!
//! The configuration system automatically expands ~ to the user's home
//! directory and creates the data directory if it doesn't exist.
//!
//! # Data Layout
//!
//! All durable per-session state lives under `core.data_dir`:
//!
//! - `memory/session_<id>.json` — conversation history
//! - `feedback/feedback_<id>.json` — judged-answer records
//! - `uploads/<id>/` — raw uploaded files
//! - `index/<id>/` — vector index artifacts

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
///
/// This structure represents the complete Insight configuration loaded from
/// ~/.insight/config.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// LLM endpoint configuration
    #[serde(default)]
    pub llm: LLMConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

impl CoreConfig {
    /// Directory holding per-session conversation history files
    pub fn memory_dir(&self) -> PathBuf {
        self.data_dir.join("memory")
    }

    /// Directory holding per-session feedback record files
    pub fn feedback_dir(&self) -> PathBuf {
        self.data_dir.join("feedback")
    }

    /// Directory holding per-session uploaded raw files
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Directory holding per-session vector index artifacts
    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }
}

/// OpenAI-compatible generation endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Base URL of the chat-completions API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name passed to the endpoint
    #[serde(default = "default_model")]
    pub model: String,

    /// API key (optional; local endpoints usually need none)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable consulted when `api_key` is not set
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
        }
    }
}

impl LLMConfig {
    /// Resolve the API key from config or the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.is_empty())
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.insight/data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Config {
    /// Default configuration file path: ~/.insight/config.toml
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".insight")
            .join("config.toml")
    }

    /// Load the configuration from the default location, creating a default
    /// config file there if none exists.
    pub fn load_or_create() -> Result<Self> {
        let path = Self::default_path();
        if !path.exists() {
            let config = Config::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let contents =
                toml::to_string_pretty(&config).context("Failed to serialize default config")?;
            fs::write(&path, contents)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Created default config at {}", path.display());
        }
        Self::load_from_path(&path)
    }

    /// Load the configuration from an explicit path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.core.data_dir = expand_tilde(&config.core.data_dir);
        fs::create_dir_all(&config.core.data_dir).with_context(|| {
            format!(
                "Failed to create data directory {}",
                config.core.data_dir.display()
            )
        })?;
        Ok(config)
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.core.log_level, "info");
        assert!(config.llm.base_url.starts_with("https://"));
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_data_layout_dirs() {
        let core = CoreConfig {
            data_dir: PathBuf::from("/tmp/insight-data"),
            log_level: "debug".to_string(),
        };
        assert_eq!(core.memory_dir(), PathBuf::from("/tmp/insight-data/memory"));
        assert_eq!(
            core.feedback_dir(),
            PathBuf::from("/tmp/insight-data/feedback")
        );
        assert_eq!(
            core.uploads_dir(),
            PathBuf::from("/tmp/insight-data/uploads")
        );
        assert_eq!(core.index_dir(), PathBuf::from("/tmp/insight-data/index"));
    }

    #[test]
    fn test_load_from_path_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let config_path = dir.path().join("config.toml");
        let contents = format!(
            "[core]\ndata_dir = \"{}\"\n\n[llm]\nmodel = \"test-model\"\n",
            data_dir.display()
        );
        std::fs::write(&config_path, contents).unwrap();

        let config = Config::load_from_path(&config_path).unwrap();
        assert_eq!(config.llm.model, "test-model");
        // Defaults fill in the unspecified fields
        assert_eq!(config.core.log_level, "info");
        // Data directory gets created on load
        assert!(data_dir.is_dir());
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde(Path::new("~/foo/bar"));
        assert!(!expanded.starts_with("~"));
        let absolute = expand_tilde(Path::new("/opt/data"));
        assert_eq!(absolute, PathBuf::from("/opt/data"));
    }
}
