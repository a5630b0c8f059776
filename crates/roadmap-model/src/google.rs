//! Google Gemini driver for the native Generative Language API.
//!
//! Replies are streamed from `streamGenerateContent` as server-sent events.
//! The key goes in the `x-goog-api-key` header.
//!
//! `POST {base}/v1beta/models/{model}:streamGenerateContent?alt=sse`

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{provider::ResponseStream, CompletionRequest, Message, ResponseEvent, Role};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

// ─── Provider ────────────────────────────────────────────────────────────────

pub struct GoogleProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
    generation: GenerationConfig,
    http: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            model,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            generation: GenerationConfig {
                max_output_tokens: max_tokens.unwrap_or(8192),
                temperature: temperature.unwrap_or(0.2),
            },
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model,
        )
    }

    /// System messages are folded into one `systemInstruction`; the rest
    /// become `contents` in order, with the assistant speaking as `model`.
    fn request_body<'a>(&self, messages: &'a [Message]) -> GenerateRequest<'a> {
        let (system, turns): (Vec<&Message>, Vec<&Message>) =
            messages.iter().partition(|m| m.role == Role::System);

        let system_instruction = (!system.is_empty()).then(|| Content {
            role: None,
            parts: system.iter().map(|m| Part { text: m.as_text() }).collect(),
        });
        let contents = turns
            .into_iter()
            .map(|m| Content {
                role: Some(if m.role == Role::Assistant { "model" } else { "user" }),
                parts: vec![Part { text: m.as_text() }],
            })
            .collect();

        GenerateRequest { contents, system_instruction, generation_config: self.generation }
    }
}

#[async_trait]
impl crate::ModelProvider for GoogleProvider {
    fn name(&self) -> &str { "google" }
    fn model_name(&self) -> &str { &self.model }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let key = self.api_key.as_deref().context("GEMINI_API_KEY not set")?;

        debug!(model = %self.model, messages = req.messages.len(), "sending Gemini request");

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .json(&self.request_body(&req.messages))
            .send()
            .await
            .context("Gemini request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            bail!("Gemini returned {status}: {detail}");
        }

        let events = decode_sse(resp.bytes_stream());
        Ok(Box::pin(events))
    }
}

// ─── Stream decoding ─────────────────────────────────────────────────────────

/// Turn a body of SSE bytes into response events.
///
/// A line may straddle two network chunks; its head waits in `pending`
/// until the newline arrives.  Whatever is left when the body ends is
/// decoded as a final line.
fn decode_sse<S, B, E>(body: S) -> impl Stream<Item = anyhow::Result<ResponseEvent>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = (Box::pin(body), Vec::<u8>::new(), false);
    stream::unfold(state, |(mut body, mut pending, ended)| async move {
        if ended {
            return None;
        }
        match body.next().await {
            Some(Ok(chunk)) => {
                pending.extend_from_slice(chunk.as_ref());
                let batch = drain_sse_lines(&mut pending);
                Some((batch, (body, pending, false)))
            }
            Some(Err(e)) => {
                let batch = vec![Err(anyhow::Error::new(e).context("Gemini stream interrupted"))];
                Some((batch, (body, pending, false)))
            }
            None if pending.is_empty() => None,
            None => {
                pending.push(b'\n');
                let batch = drain_sse_lines(&mut pending);
                Some((batch, (body, pending, true)))
            }
        }
    })
    .flat_map(stream::iter)
}

/// Take every complete line out of `buf` and decode its `data:` payload.
fn drain_sse_lines(buf: &mut Vec<u8>) -> Vec<anyhow::Result<ResponseEvent>> {
    let mut out = Vec::new();
    while let Some(newline) = buf.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buf.drain(..=newline).collect();
        let line = String::from_utf8_lossy(&line);
        let payload = match line.trim_end().strip_prefix("data:") {
            Some(p) => p.trim(),
            None => continue,
        };
        match payload {
            "" => {}
            "[DONE]" => out.push(Ok(ResponseEvent::Done)),
            json => match serde_json::from_str::<Value>(json) {
                Ok(chunk) => out.extend(decode_chunk(&chunk)),
                Err(e) => out.push(Err(anyhow!("malformed Gemini event: {e}"))),
            },
        }
    }
    out
}

/// Translate one `GenerateContentResponse` chunk.
fn decode_chunk(chunk: &Value) -> Vec<anyhow::Result<ResponseEvent>> {
    if let Some(err) = chunk.get("error") {
        let msg = err["message"].as_str().unwrap_or("unknown error");
        return vec![Err(anyhow!("Gemini stream error: {msg}"))];
    }

    let candidate = &chunk["candidates"][0];
    let parts = candidate["content"]["parts"].as_array().map(Vec::as_slice).unwrap_or(&[]);

    // Thought summaries are not part of the reply.
    let mut out: Vec<anyhow::Result<ResponseEvent>> = parts
        .iter()
        .filter(|p| p["thought"].as_bool() != Some(true))
        .filter_map(|p| p["text"].as_str())
        .map(|text| Ok(ResponseEvent::TextDelta(text.to_owned())))
        .collect();

    if let Some(reason) = chunk["promptFeedback"]["blockReason"].as_str() {
        out.push(Ok(ResponseEvent::Error(format!("prompt blocked: {reason}"))));
    }
    if let Some(usage) = chunk.get("usageMetadata") {
        let count = |field: &str| usage[field].as_u64().unwrap_or(0) as u32;
        out.push(Ok(ResponseEvent::Usage {
            input_tokens: count("promptTokenCount"),
            output_tokens: count("candidatesTokenCount"),
        }));
    }
    if candidate.get("finishReason").is_some_and(Value::is_string) {
        out.push(Ok(ResponseEvent::Done));
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ModelProvider;

    fn gemini() -> GoogleProvider {
        GoogleProvider::new("gemini-2.5-flash".into(), None, None, None, None)
    }

    fn body(messages: &[Message]) -> Value {
        serde_json::to_value(gemini().request_body(messages)).unwrap()
    }

    fn decoded(chunk: Value) -> Vec<ResponseEvent> {
        decode_chunk(&chunk).into_iter().map(|e| e.unwrap()).collect()
    }

    #[test]
    fn reports_google_and_model() {
        let p = gemini();
        assert_eq!(p.name(), "google");
        assert_eq!(p.model_name(), "gemini-2.5-flash");
    }

    #[test]
    fn endpoint_ignores_trailing_slash_on_base() {
        let p = GoogleProvider::new("m".into(), None, Some("http://localhost:9/".into()), None, None);
        assert_eq!(p.endpoint(), "http://localhost:9/v1beta/models/m:streamGenerateContent?alt=sse");
    }

    #[test]
    fn context_goes_to_system_instruction() {
        let b = body(&[
            Message::system("roadmap context"),
            Message::user("hi"),
            Message::assistant("hello"),
            Message::user("month 2?"),
        ]);
        assert_eq!(b["systemInstruction"]["parts"][0]["text"], "roadmap context");
        assert!(b["systemInstruction"].get("role").is_none());
        let roles: Vec<_> = b["contents"].as_array().unwrap().iter().map(|c| c["role"].clone()).collect();
        assert_eq!(roles, vec![json!("user"), json!("model"), json!("user")]);
        assert_eq!(b["generationConfig"]["maxOutputTokens"], 8192);
    }

    #[test]
    fn system_instruction_omitted_when_absent() {
        let b = body(&[Message::user("hi")]);
        assert!(b.get("systemInstruction").is_none());
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let req = CompletionRequest { messages: vec![Message::user("hi")], stream: true };
        let err = gemini().complete(req).await.err().unwrap();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn text_then_usage() {
        let events = decoded(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Month 1 covers Python." }] } }],
            "usageMetadata": { "promptTokenCount": 120, "candidatesTokenCount": 7 }
        }));
        assert_eq!(events, vec![
            ResponseEvent::TextDelta("Month 1 covers Python.".into()),
            ResponseEvent::Usage { input_tokens: 120, output_tokens: 7 },
        ]);
    }

    #[test]
    fn thought_parts_dropped() {
        let events = decoded(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "considering month 3", "thought": true },
                { "text": "See month 3." }
            ] } }]
        }));
        assert_eq!(events, vec![ResponseEvent::TextDelta("See month 3.".into())]);
    }

    #[test]
    fn finish_reason_yields_done() {
        let events = decoded(json!({
            "candidates": [{ "content": { "parts": [{ "text": "!" }] }, "finishReason": "STOP" }]
        }));
        assert_eq!(events.last(), Some(&ResponseEvent::Done));
    }

    #[test]
    fn blocked_prompt_is_a_warning() {
        let events = decoded(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        assert_eq!(events, vec![ResponseEvent::Error("prompt blocked: SAFETY".into())]);
    }

    #[test]
    fn error_payload_fails_the_stream() {
        let events = decode_chunk(&json!({ "error": { "message": "quota exceeded" } }));
        assert!(events[0].as_ref().is_err_and(|e| e.to_string().contains("quota")));
    }

    #[test]
    fn line_split_across_chunks() {
        let mut pending = b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"te".to_vec();
        assert!(drain_sse_lines(&mut pending).is_empty());

        pending.extend_from_slice(b"xt\":\"hi\"}]}}]}\n\n");
        let events: Vec<_> = drain_sse_lines(&mut pending).into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events, vec![ResponseEvent::TextDelta("hi".into())]);
        assert!(pending.is_empty());
    }

    async fn decode_body(chunks: &[&str]) -> Vec<ResponseEvent> {
        let body = stream::iter(
            chunks.iter().map(|c| Ok::<_, std::io::Error>(c.as_bytes().to_vec())).collect::<Vec<_>>(),
        );
        decode_sse(body).map(|e| e.unwrap()).collect().await
    }

    #[tokio::test]
    async fn final_line_without_newline_is_decoded() {
        let events = decode_body(&[
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Month \"}]}}]}\n\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"two\"}]},\"finishReason\":\"STOP\"}]}",
        ])
        .await;
        assert_eq!(events, vec![
            ResponseEvent::TextDelta("Month ".into()),
            ResponseEvent::TextDelta("two".into()),
            ResponseEvent::Done,
        ]);
    }

    #[tokio::test]
    async fn body_ending_on_newline_adds_nothing() {
        let events = decode_body(&["data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"hi\"}]}}]}\n"]).await;
        assert_eq!(events, vec![ResponseEvent::TextDelta("hi".into())]);
    }

    #[tokio::test]
    async fn transport_error_surfaces_as_error_item() {
        let body = stream::iter(vec![
            Ok(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"par".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let items: Vec<_> = decode_sse(body).collect().await;
        assert!(matches!(items.as_slice(), [Err(_), Err(_)]));
    }

    #[test]
    fn comments_and_event_names_skipped() {
        let mut pending = b": keep-alive\nevent: message\n".to_vec();
        assert!(drain_sse_lines(&mut pending).is_empty());
    }

    #[test]
    fn undecodable_payload_is_an_error_item() {
        let mut pending = b"data: {not json}\n".to_vec();
        let events = drain_sse_lines(&mut pending);
        assert!(matches!(events.as_slice(), [Err(_)]));
    }
}
