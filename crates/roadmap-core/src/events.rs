// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use crate::session::ChatMessage;

/// Transcript changes emitted by the chat orchestrator, in append order.
/// Front ends subscribe to these to render entries as they arrive.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// The greeting was added to an empty transcript
    Greeting(ChatMessage),
    /// A submission was accepted and appended
    UserMessage(ChatMessage),
    /// The completion service answered
    Reply(ChatMessage),
    /// The completion service failed; the message holds the fallback notice
    Fallback(ChatMessage),
}

impl ChatEvent {
    pub fn message(&self) -> &ChatMessage {
        match self {
            ChatEvent::Greeting(m)
            | ChatEvent::UserMessage(m)
            | ChatEvent::Reply(m)
            | ChatEvent::Fallback(m) => m,
        }
    }
}
