//! Incremental SSE delta decoding.
//!
//! [`SseDecoder`] turns an arbitrarily-chunked byte stream into an ordered
//! sequence of [`StreamUpdate`]s. It is transport-agnostic: callers push raw
//! bytes (or already-decoded text) in whatever chunk sizes arrive and the
//! decoder reassembles UTF-8 sequences and complete lines itself, so chunk
//! boundaries never change the result.
//!
//! Lifecycle is Idle -> Streaming -> terminal. `[DONE]` ends the stream
//! explicitly; [`SseDecoder::finish`] covers transports that close without a
//! sentinel (implicit success, same accumulated text). There is no way back
//! from the terminal state; a new request gets a new decoder.

use serde::Deserialize;
use serde_json::Value;

use crate::config::RequestShape;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// One decoder output.
///
/// Both variants carry the full accumulated text so far, not the raw
/// fragment; consumers re-render the whole visible message on each update.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    /// A delta arrived and the accumulated text grew.
    Delta(String),
    /// Terminal: the stream ended, explicitly or implicitly.
    Completed(String),
}

/// Per-request SSE decoding state.
#[derive(Debug)]
pub struct SseDecoder {
    shape: RequestShape,
    pending: Vec<u8>,
    buffer: String,
    accumulated: String,
    done: bool,
}

impl SseDecoder {
    pub fn new(shape: RequestShape) -> Self {
        Self {
            shape,
            pending: Vec::new(),
            buffer: String::new(),
            accumulated: String::new(),
            done: false,
        }
    }

    /// Feed one chunk of raw bytes.
    ///
    /// A multi-byte UTF-8 sequence split across chunks is held back until its
    /// remaining bytes arrive, so network chunk boundaries can fall anywhere.
    /// Byte sequences that are invalid outright decode lossily rather than
    /// stalling the stream.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<StreamUpdate> {
        self.pending.extend_from_slice(bytes);
        let valid_len = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let text = String::from_utf8_lossy(&self.pending[..valid_len]).into_owned();
        self.pending.drain(..valid_len);
        self.push(&text)
    }

    /// Feed one chunk of decoded text, returning the updates it produced.
    ///
    /// The trailing element after the last newline stays buffered until the
    /// next chunk completes it. Input after the terminal update is ignored.
    pub fn push(&mut self, chunk: &str) -> Vec<StreamUpdate> {
        if self.done {
            return Vec::new();
        }

        self.buffer.push_str(chunk);

        let mut updates = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            if let Some(update) = self.process_line(line.trim_end_matches(['\n', '\r'])) {
                updates.push(update);
                if self.done {
                    break;
                }
            }
        }
        updates
    }

    /// End-of-transport without a `[DONE]` sentinel: implicit success.
    ///
    /// Also covers a cancelled/dropped reader. Returns the terminal update,
    /// or `None` if the stream already completed.
    pub fn finish(&mut self) -> Option<StreamUpdate> {
        if self.done {
            return None;
        }
        self.done = true;
        Some(StreamUpdate::Completed(self.accumulated.clone()))
    }

    /// Text accumulated so far; survives a mid-stream transport failure.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn process_line(&mut self, line: &str) -> Option<StreamUpdate> {
        if line.trim().is_empty() {
            return None;
        }
        let data = line.strip_prefix(DATA_PREFIX)?;

        if data == DONE_SENTINEL {
            self.done = true;
            return Some(StreamUpdate::Completed(self.accumulated.clone()));
        }

        let value: Value = match serde_json::from_str(data) {
            Ok(value) => value,
            Err(err) => {
                // Best effort: malformed payload lines never abort the stream.
                tracing::warn!(error = %err, "Skipping malformed stream line");
                return None;
            }
        };

        let delta = delta_text(self.shape, &value);
        if delta.is_empty() {
            return None;
        }

        self.accumulated.push_str(&delta);
        Some(StreamUpdate::Delta(self.accumulated.clone()))
    }
}

// Streaming payload shapes. Every field defaults so that unexpected frames
// (pings, role-only deltas, usage reports) decode to an empty delta instead
// of an error.

#[derive(Deserialize, Default)]
struct OpenAiChunk {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize, Default)]
struct OpenAiChoice {
    #[serde(default)]
    delta: OpenAiDelta,
}

#[derive(Deserialize, Default)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct AnthropicChunk {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize, Default)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct DashScopeChunk {
    #[serde(default)]
    output: DashScopeOutput,
}

#[derive(Deserialize, Default)]
struct DashScopeOutput {
    #[serde(default)]
    text: Option<String>,
}

/// Extract the per-shape incremental text from one parsed payload.
/// Missing fields yield an empty delta, never an error.
fn delta_text(shape: RequestShape, value: &Value) -> String {
    match shape {
        RequestShape::OpenAi => OpenAiChunk::deserialize(value)
            .ok()
            .and_then(|chunk| chunk.choices.into_iter().next())
            .and_then(|choice| choice.delta.content),
        RequestShape::Anthropic => AnthropicChunk::deserialize(value)
            .ok()
            .and_then(|chunk| chunk.content.into_iter().next())
            .and_then(|block| block.text),
        RequestShape::DashScope => DashScopeChunk::deserialize(value)
            .ok()
            .and_then(|chunk| chunk.output.text),
        // Generic providers never stream; nothing to extract.
        RequestShape::Generic => None,
    }
    .unwrap_or_default()
}

/// Whole-body text extraction for non-streaming responses.
///
/// Recognized sources, in order: DashScope `output.text`, OpenAI-compatible
/// `choices[0].message.content`, Anthropic `content[0].text`, and the
/// `result` field of ERNIE-style responses.
pub(crate) fn extract_full_text(value: &Value) -> Option<String> {
    if let Some(text) = value
        .get("output")
        .and_then(|output| output.get("text"))
        .and_then(Value::as_str)
    {
        return Some(text.to_string());
    }
    if let Some(text) = value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
    {
        return Some(text.to_string());
    }
    if let Some(text) = value
        .get("content")
        .and_then(|content| content.get(0))
        .and_then(|block| block.get("text"))
        .and_then(Value::as_str)
    {
        return Some(text.to_string());
    }
    if let Some(text) = value.get("result").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    None
}
