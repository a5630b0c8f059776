// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of the chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: ChatRole::User, text: text.into(), timestamp: Utc::now() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, text: text.into(), timestamp: Utc::now() }
    }
}

/// Ordered, append-only log of the messages exchanged in one session.
///
/// Only the chat orchestrator appends; everyone else gets read access.
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    id: String,
    messages: Vec<ChatMessage>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4().to_string(), messages: Vec::new() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn push(&mut self, msg: ChatMessage) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transcript_has_unique_id() {
        assert_ne!(Transcript::new().id(), Transcript::new().id());
    }

    #[test]
    fn new_transcript_starts_empty() {
        let t = Transcript::new();
        assert!(t.is_empty());
        assert!(t.last().is_none());
    }

    #[test]
    fn push_preserves_order() {
        let mut t = Transcript::new();
        t.push(ChatMessage::user("q"));
        t.push(ChatMessage::assistant("a"));
        let roles: Vec<_> = t.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::User, ChatRole::Assistant]);
        assert_eq!(t.last().map(|m| m.text.as_str()), Some("a"));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn message_serializes_with_lowercase_role() {
        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["text"], "hi");
        assert!(json["timestamp"].is_string());
    }
}
