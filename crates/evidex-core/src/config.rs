//! Application configuration model.
//!
//! Loaded from `config.toml` by the infrastructure layer; every field has a
//! default so a missing or partial file still yields a usable config.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// System prompt injected into imported transcripts that lack one.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a professional technical interviewer assessing how a candidate reasons.";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct EvidexConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Location of the persisted collection; defaults to the data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,
    /// Indent the store file so it can be read and diffed by hand
    #[serde(default)]
    pub pretty: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            default_system_prompt: default_system_prompt(),
            pretty: false,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Retries after the first attempt when the response is unusable
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_log_filter() -> String {
    "info".to_string()
}
