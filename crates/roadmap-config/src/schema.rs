// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Fallback notice appended to the transcript when the completion service
/// cannot produce a reply.
pub const DEFAULT_FALLBACK_NOTICE: &str =
    "I'm sorry, there was an issue communicating with the AI. Please try again.";

/// Greeting shown when a chat is opened on an empty transcript.
pub const DEFAULT_GREETING: &str =
    "Hello! I am your AI assistant. How can I help you with your ML roadmap today?";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub roadmap: RoadmapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// "google" (alias "gemini") or "mock"
    pub provider: String,
    /// Gemini model id, e.g. "gemini-2.5-flash"
    pub name: String,
    /// Name of the environment variable the API key is read from
    pub api_key_env: Option<String>,
    /// Inline API key.  Takes precedence over `api_key_env`; keep it out of
    /// shared config files.
    pub api_key: Option<String>,
    /// Alternative API root, e.g. a local proxy
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "google".into(),
            name: "gemini-2.5-flash".into(),
            api_key_env: Some("GEMINI_API_KEY".into()),
            api_key: None,
            base_url: None,
            max_tokens: Some(8192),
            temperature: Some(0.2),
        }
    }
}

fn default_fallback_notice() -> String {
    DEFAULT_FALLBACK_NOTICE.into()
}
fn default_greeting() -> String {
    DEFAULT_GREETING.into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Assistant message appended when a request fails.  Must be non-empty;
    /// a blank value falls back to the built-in notice.
    #[serde(default = "default_fallback_notice")]
    pub fallback_notice: String,
    /// First assistant message of a fresh chat.
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl ChatConfig {
    /// The notice actually shown to the user; never empty.
    pub fn effective_fallback_notice(&self) -> &str {
        if self.fallback_notice.trim().is_empty() {
            DEFAULT_FALLBACK_NOTICE
        } else {
            &self.fallback_notice
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            fallback_notice: default_fallback_notice(),
            greeting: default_greeting(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// File holding the persisted progress.  Defaults to
    /// `<data dir>/roadmap/progress.json`.
    pub file: Option<PathBuf>,
}

impl ProgressConfig {
    pub fn effective_file(&self) -> PathBuf {
        self.file.clone().unwrap_or_else(default_progress_file)
    }
}

/// `$XDG_DATA_HOME/roadmap/progress.json`, falling back to
/// `~/.local/share/roadmap/progress.json`.
pub fn default_progress_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local")
                .join("share")
        })
        .join("roadmap")
        .join("progress.json")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoadmapConfig {
    /// JSON file replacing the built-in roadmap.
    pub path: Option<PathBuf>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
