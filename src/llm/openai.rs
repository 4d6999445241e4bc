//! OpenAI-compatible streaming chat client.
//!
//! Speaks `/chat/completions` with `stream: true`, which covers both OpenAI
//! and OpenRouter. The provider's SSE framing is decoded by
//! [`ChunkDecoder`], a pure byte-in / event-out parser kept separate from
//! the HTTP plumbing for testability.

use std::fmt::Display;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::config::{LlmConfig, SiteAttribution};
use super::types::{DeltaStream, LlmError, Message, Role};

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    temperature: f32,
    site: SiteAttribution,
}

impl OpenAiClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .read_timeout(Duration::from_secs(config.timeouts.read_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            temperature: config.temperature,
            site: config.site.clone(),
        })
    }

    pub async fn chat_stream(
        &self,
        model: &str,
        max_tokens: u32,
        system: &str,
        messages: &[Message],
    ) -> Result<DeltaStream, LlmError> {
        let msgs = build_messages(system, messages);
        let body = CcRequest { model, max_tokens, temperature: self.temperature, stream: true, messages: &msgs };

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body);
        if let Some(url) = &self.site.url {
            request = request.header("HTTP-Referer", url);
        }
        if let Some(name) = &self.site.name {
            request = request.header("X-Title", name);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiResponse { status: status.as_u16(), body });
        }

        Ok(delta_stream(response.bytes_stream()))
    }
}

// =============================================================================
// REQUEST WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct CcRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    messages: &'a [CcMessage<'a>],
}

#[derive(Debug, Serialize, PartialEq)]
struct CcMessage<'a> {
    role: Role,
    content: &'a str,
}

fn build_messages<'a>(system: &'a str, messages: &'a [Message]) -> Vec<CcMessage<'a>> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if !system.trim().is_empty() {
        out.push(CcMessage { role: Role::System, content: system });
    }
    out.extend(messages.iter().map(|m| CcMessage { role: m.role, content: &m.content }));
    out
}

// =============================================================================
// STREAM DECODING
// =============================================================================

/// One meaningful item decoded from the provider's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChunkEvent {
    Delta(String),
    Done,
    Failed(String),
}

/// Line-oriented decoder for the provider's SSE body.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across network chunks decode intact.
#[derive(Debug, Default)]
pub(crate) struct ChunkDecoder {
    buffer: Vec<u8>,
}

impl ChunkDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<ChunkEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line that was not newline-terminated.
    pub(crate) fn finish(&mut self) -> Option<ChunkEvent> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }
}

fn parse_line(raw: &[u8]) -> Option<ChunkEvent> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\n', '\r']);
    // Comment lines (": OPENROUTER PROCESSING") and non-data fields are keep-alives.
    let data = line.strip_prefix("data:")?.trim_start();
    parse_data(data)
}

pub(crate) fn parse_data(data: &str) -> Option<ChunkEvent> {
    if data == "[DONE]" {
        return Some(ChunkEvent::Done);
    }
    let root: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "skipping unparsable stream chunk");
            return None;
        }
    };
    if let Some(err) = root.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| err.to_string(), str::to_owned);
        return Some(ChunkEvent::Failed(message));
    }
    let content = root
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)?;
    if content.is_empty() { None } else { Some(ChunkEvent::Delta(content.to_string())) }
}

/// Adapt a raw provider body into a stream of content fragments.
pub(crate) fn delta_stream<S, E>(bytes: S) -> DeltaStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = ChunkDecoder::default();
        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(LlmError::StreamInterrupted(e.to_string()));
                    return;
                }
            };
            for event in decoder.push(&chunk) {
                match event {
                    ChunkEvent::Delta(text) => yield Ok(text),
                    ChunkEvent::Done => return,
                    ChunkEvent::Failed(message) => {
                        yield Err(LlmError::StreamInterrupted(message));
                        return;
                    }
                }
            }
        }
        match decoder.finish() {
            Some(ChunkEvent::Delta(text)) => yield Ok(text),
            Some(ChunkEvent::Failed(message)) => yield Err(LlmError::StreamInterrupted(message)),
            Some(ChunkEvent::Done) | None => {}
        }
    })
}

#[cfg(test)]
#[path = "openai_test.rs"]
mod tests;
