// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream;
use tokio::sync::Semaphore;

use crate::{provider::ResponseStream, CompletionRequest, ResponseEvent};

/// Offline provider that answers every request with `MOCK: <last user text>`.
#[derive(Debug, Default)]
pub struct MockProvider;

#[async_trait]
impl crate::ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let echoed = req.last_user_text().unwrap_or_default();
        let events = text_reply(format!("MOCK: {echoed}"));
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}

/// One scripted answer of a [`ScriptedMockProvider`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// The request succeeds and the stream yields these events.
    Events(Vec<ResponseEvent>),
    /// The request itself fails with this message (unreachable service,
    /// error status).
    Fail(String),
    /// The stream starts, yields these events, then breaks with an error.
    BreakAfter(Vec<ResponseEvent>, String),
}

/// Provider that plays back a queue of [`MockReply`]s, one per request, and
/// keeps every request it receives for inspection.
///
/// Once the queue is empty each request gets the text `[no more scripts]`.
pub struct ScriptedMockProvider {
    queue: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedMockProvider {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            queue: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// A single successful text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![MockReply::Events(text_reply(reply))])
    }

    /// A single request-level failure.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(vec![MockReply::Fail(message.into())])
    }

    /// Hold each request, after it has been recorded, until a permit is
    /// added to the returned semaphore.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Number of `complete` calls received so far.
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        lock(&self.requests).last().cloned()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }
}

/// Events of a successful single-delta text reply.
pub fn text_reply(reply: impl Into<String>) -> Vec<ResponseEvent> {
    vec![
        ResponseEvent::TextDelta(reply.into()),
        ResponseEvent::Usage { input_tokens: 5, output_tokens: 5 },
        ResponseEvent::Done,
    ]
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl crate::ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        "scripted-mock"
    }
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        lock(&self.requests).push(req);

        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }

        let next = lock(&self.queue).pop_front();
        let items: Vec<anyhow::Result<ResponseEvent>> =
            match next.unwrap_or_else(|| MockReply::Events(text_reply("[no more scripts]"))) {
                MockReply::Events(events) => events.into_iter().map(Ok).collect(),
                MockReply::Fail(message) => anyhow::bail!(message),
                MockReply::BreakAfter(events, message) => events
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(anyhow::anyhow!(message))))
                    .collect(),
            };
        Ok(Box::pin(stream::iter(items)))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
