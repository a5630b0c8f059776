// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use roadmap_config::ChatConfig;
use roadmap_model::{CompletionRequest, Message, ModelProvider, ResponseEvent};

use crate::{
    events::ChatEvent,
    prompts::context_prompt,
    roadmap::Roadmap,
    session::{ChatMessage, Transcript},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    AwaitingReply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The text was empty or whitespace only
    Blank,
    /// A reply to an earlier submission is still outstanding
    Busy,
}

/// What became of one call to [`Chat::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing was appended and no request was sent
    Ignored(IgnoreReason),
    /// The service's reply was appended
    Replied,
    /// The fallback notice was appended
    Failed,
}

/// Why a request produced no usable reply.  Only ever logged; the user sees
/// the fallback notice regardless of the kind.
#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    /// Unreachable, error status, or the stream broke off
    #[error("completion service failed: {0:#}")]
    Service(anyhow::Error),
    #[error("completion service returned an empty reply")]
    Empty,
}

struct Inner {
    state: ChatState,
    transcript: Transcript,
    /// Provider-side conversation: the context primer followed by every
    /// completed exchange.  Created on first use and dropped after a failure
    /// so the next submission starts over.  `None` while a request is in
    /// flight as well.
    conversation: Option<Vec<Message>>,
}

/// The chat orchestrator.  Owns the transcript and the service session and
/// forwards one submission at a time to the completion service.
pub struct Chat {
    model: Arc<dyn ModelProvider>,
    context: String,
    config: ChatConfig,
    inner: Mutex<Inner>,
    events: Option<mpsc::UnboundedSender<ChatEvent>>,
}

impl Chat {
    /// `context` is the instruction block every service session is primed with.
    pub fn new(model: Arc<dyn ModelProvider>, context: impl Into<String>, config: ChatConfig) -> Self {
        Self {
            model,
            context: context.into(),
            config,
            inner: Mutex::new(Inner {
                state: ChatState::Idle,
                transcript: Transcript::new(),
                conversation: None,
            }),
            events: None,
        }
    }

    /// Chat primed with the assistant instructions for `roadmap`.
    pub fn for_roadmap(
        model: Arc<dyn ModelProvider>,
        roadmap: &Roadmap,
        config: ChatConfig,
    ) -> anyhow::Result<Self> {
        Ok(Self::new(model, context_prompt(roadmap)?, config))
    }

    /// Forward every transcript append to `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<ChatEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn state(&self) -> ChatState {
        self.lock().state
    }

    /// Snapshot of the transcript.
    pub fn transcript(&self) -> Transcript {
        self.lock().transcript.clone()
    }

    /// Append the configured greeting if nothing has been said yet.
    /// Returns whether it was appended.
    pub fn greet(&self) -> bool {
        let msg = {
            let mut inner = self.lock();
            if !inner.transcript.is_empty() || self.config.greeting.trim().is_empty() {
                return false;
            }
            let msg = ChatMessage::assistant(self.config.greeting.clone());
            inner.transcript.push(msg.clone());
            msg
        };
        self.emit(ChatEvent::Greeting(msg));
        true
    }

    /// Submit user text.
    ///
    /// Blank text and any submission made while a reply is outstanding are
    /// ignored without touching the transcript.  Otherwise the text is
    /// appended, exactly one request is sent, and the reply (or the fallback
    /// notice) is appended before returning.  Failures are not retried.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let (mut messages, user_msg, session_id) = {
            let mut inner = self.lock();
            if inner.state == ChatState::AwaitingReply {
                debug!("submission ignored, reply pending");
                return SubmitOutcome::Ignored(IgnoreReason::Busy);
            }
            if text.trim().is_empty() {
                return SubmitOutcome::Ignored(IgnoreReason::Blank);
            }

            let user_msg = ChatMessage::user(text);
            inner.transcript.push(user_msg.clone());
            inner.state = ChatState::AwaitingReply;

            let mut messages = match inner.conversation.take() {
                Some(conv) => conv,
                None => {
                    info!(session = %inner.transcript.id(), "starting completion session");
                    vec![Message::system(self.context.clone())]
                }
            };
            messages.push(Message::user(text));
            (messages, user_msg, inner.transcript.id().to_string())
        };
        self.emit(ChatEvent::UserMessage(user_msg));

        let mut guard = InFlight { chat: self, finished: false };
        let result = self.request_reply(messages.clone()).await;
        guard.finished = true;

        let (event, outcome) = {
            let mut inner = self.lock();
            inner.state = ChatState::Idle;
            match result {
                Ok(reply) => {
                    messages.push(Message::assistant(reply.clone()));
                    inner.conversation = Some(messages);
                    let msg = ChatMessage::assistant(reply);
                    inner.transcript.push(msg.clone());
                    (ChatEvent::Reply(msg), SubmitOutcome::Replied)
                }
                Err(e) => {
                    warn!(session = %session_id, error = %e, "chat request failed");
                    inner.conversation = None;
                    let msg = ChatMessage::assistant(self.config.effective_fallback_notice());
                    inner.transcript.push(msg.clone());
                    (ChatEvent::Fallback(msg), SubmitOutcome::Failed)
                }
            }
        };
        self.emit(event);
        outcome
    }

    async fn request_reply(&self, messages: Vec<Message>) -> Result<String, ReplyError> {
        debug!(
            provider = self.model.name(),
            model = self.model.model_name(),
            messages = messages.len(),
            "requesting completion"
        );
        let req = CompletionRequest { messages, stream: true };
        let mut stream = self.model.complete(req).await.map_err(ReplyError::Service)?;

        let mut reply = String::new();
        while let Some(event) = stream.next().await {
            match event.map_err(ReplyError::Service)? {
                ResponseEvent::TextDelta(delta) => reply.push_str(&delta),
                ResponseEvent::Usage { input_tokens, output_tokens } => {
                    debug!(input_tokens, output_tokens, "completion usage");
                }
                ResponseEvent::Error(msg) => warn!(%msg, "completion service warning"),
                ResponseEvent::Done => break,
            }
        }

        if reply.trim().is_empty() {
            return Err(ReplyError::Empty);
        }
        Ok(reply)
    }

    fn emit(&self, event: ChatEvent) {
        if let Some(tx) = &self.events {
            // A closed receiver only means nobody is rendering any more.
            let _ = tx.send(event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the chat to `Idle` if a `submit` future is dropped mid-request.
/// The transcript is left as is and the service session is discarded.
struct InFlight<'a> {
    chat: &'a Chat,
    finished: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("chat request abandoned before completion");
            let mut inner = self.chat.lock();
            inner.state = ChatState::Idle;
            inner.conversation = None;
        }
    }
}
