//! Relay wire format: SSE-shaped records over one response body.
//!
//! ARCHITECTURE
//! ============
//! ```text
//! event: sources
//! data: {"sources":[...]}
//!
//! data: <fragment>
//!
//! event: done
//! data: {}
//!
//! ```
//! Records are separated by a blank line. The sources record is always
//! first and appears once. Content records carry raw text with no escaping;
//! a fragment containing `\n` becomes several `data: ` lines in one record
//! and is re-joined with `\n` on decode, so the separator never occurs
//! inside a record. The stream ends with `event: done`, or `event: error`
//! when the provider broke off. Consumers must not require either marker.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::sources::Source;

pub const CONTENT_TYPE: &str = "text/event-stream";
pub const SOURCES_EVENT: &str = "sources";
pub const DONE_EVENT: &str = "done";
pub const ERROR_EVENT: &str = "error";

const RECORD_SEPARATOR: &[u8] = b"\n\n";

// =============================================================================
// EVENTS
// =============================================================================

/// One record of the relay stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Grounding sources; always the first record.
    Sources(Vec<Source>),
    /// One fragment of the model's answer.
    Delta(String),
    /// The provider finished normally.
    Done,
    /// The provider failed after streaming began.
    Error(String),
}

#[derive(Serialize, Deserialize)]
struct SourcesPayload {
    sources: Vec<Source>,
}

#[derive(Serialize, Deserialize)]
struct ErrorPayload {
    error: String,
}

impl StreamEvent {
    /// Encode as one wire record, separator included.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let record = match self {
            Self::Sources(sources) => {
                let payload = serde_json::json!({ "sources": sources });
                format!("event: {SOURCES_EVENT}\ndata: {payload}\n\n")
            }
            Self::Delta(text) => {
                let mut out = String::with_capacity(text.len() + 8);
                for line in text.split('\n') {
                    out.push_str("data: ");
                    out.push_str(line);
                    out.push('\n');
                }
                out.push('\n');
                out
            }
            Self::Done => format!("event: {DONE_EVENT}\ndata: {{}}\n\n"),
            Self::Error(message) => {
                let payload = serde_json::json!({ "error": message });
                format!("event: {ERROR_EVENT}\ndata: {payload}\n\n")
            }
        };
        Bytes::from(record)
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// A record that could not be turned into a [`StreamEvent`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed sources payload: {0}")]
    MalformedSources(String),

    #[error("unknown event type: {0}")]
    UnknownEvent(String),
}

/// Incremental record decoder.
///
/// Bytes are buffered until a full record is available; records are only
/// decoded as UTF-8 once complete, so characters split across reads are
/// never mangled.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    buffer: Vec<u8>,
}

impl RecordDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes; returns every record completed by them, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, DecodeError>> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = find_separator(&self.buffer) {
            let record: Vec<u8> = self.buffer.drain(..pos + RECORD_SEPARATOR.len()).collect();
            if let Some(decoded) = parse_record(&String::from_utf8_lossy(&record[..pos])) {
                out.push(decoded);
            }
        }
        out
    }

    /// Decode whatever remains once the body has ended.
    pub fn finish(&mut self) -> Option<Result<StreamEvent, DecodeError>> {
        let rest = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&rest);
        parse_record(text.trim_end_matches('\n'))
    }
}

fn find_separator(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(RECORD_SEPARATOR.len())
        .position(|w| w == RECORD_SEPARATOR)
}

/// Classify one record (without its trailing separator).
///
/// Returns `None` for records carrying neither an event name nor data.
#[must_use]
pub fn parse_record(record: &str) -> Option<Result<StreamEvent, DecodeError>> {
    let mut event: Option<&str> = None;
    let mut data: Vec<&str> = Vec::new();
    for line in record.split('\n') {
        if let Some(value) = field(line, "event") {
            event = Some(value);
        } else if let Some(value) = field(line, "data") {
            data.push(value);
        }
    }
    if event.is_none() && data.is_empty() {
        return None;
    }
    let data = data.join("\n");

    let decoded = match event {
        None => Ok(StreamEvent::Delta(data)),
        Some(SOURCES_EVENT) => serde_json::from_str::<SourcesPayload>(&data)
            .map(|p| StreamEvent::Sources(p.sources))
            .map_err(|e| DecodeError::MalformedSources(e.to_string())),
        Some(DONE_EVENT) => Ok(StreamEvent::Done),
        Some(ERROR_EVENT) => Ok(StreamEvent::Error(
            serde_json::from_str::<ErrorPayload>(&data).map_or(data, |p| p.error),
        )),
        Some(other) => Err(DecodeError::UnknownEvent(other.to_string())),
    };
    Some(decoded)
}

/// `name: value` or `name:value`; one leading space is part of the syntax.
fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let value = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

#[cfg(test)]
#[path = "wire_test.rs"]
mod tests;
