//! Response-to-event adaptation.
//!
//! Bridges a `reqwest` response to a lazy sequence of [`ChatEvent`]s via
//! [`SseDecoder`], so the decoding algorithm stays independent of any UI.

use std::pin::Pin;

use futures::{Stream, StreamExt};

use crate::config::RequestShape;
use crate::error::{ChatError, Result};
use crate::llm::decode::{SseDecoder, StreamUpdate, extract_full_text};

/// One chat progress event.
///
/// `Delta` and `Final` carry the full accumulated text, not the raw
/// fragment. `Error` is produced at the session boundary for emitters;
/// event streams report failures through `Err` items instead.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Delta { text: String },
    Final { text: String },
    Error { message: String },
}

pub type ChatEventStream = Pin<Box<dyn Stream<Item = Result<ChatEvent>> + Send>>;

/// Turn a successful HTTP response into an ordered event stream.
///
/// Streaming shapes are decoded incrementally. For the non-streaming
/// `Generic` shape the whole body is parsed at once and a single `Final`
/// event carries the extracted text.
///
/// A transport failure mid-stream first yields a best-effort `Final` with
/// whatever text accumulated, then the error itself; callers can render the
/// partial content before reporting the failure. End-of-body without a
/// `[DONE]` sentinel is implicit success, which also makes cancellation (the
/// response being dropped early) behave like a normal close.
pub fn events(response: reqwest::Response, shape: RequestShape) -> ChatEventStream {
    Box::pin(async_stream::stream! {
        if !shape.supports_streaming() {
            match response.json::<serde_json::Value>().await {
                Ok(body) => match extract_full_text(&body) {
                    Some(text) => yield Ok(ChatEvent::Final { text }),
                    None => yield Err(ChatError::InvalidResponse(
                        "no recognizable text field in response body".to_string(),
                    )),
                },
                Err(err) => yield Err(ChatError::Http(err)),
            }
            return;
        }

        let mut byte_stream = response.bytes_stream();
        let mut decoder = SseDecoder::new(shape);

        while let Some(chunk) = byte_stream.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(err) => {
                    // Surface what already arrived before re-raising.
                    yield Ok(ChatEvent::Final {
                        text: decoder.accumulated().to_string(),
                    });
                    yield Err(ChatError::Http(err));
                    return;
                }
            };

            for update in decoder.push_bytes(&bytes) {
                match update {
                    StreamUpdate::Delta(text) => yield Ok(ChatEvent::Delta { text }),
                    StreamUpdate::Completed(text) => {
                        yield Ok(ChatEvent::Final { text });
                        return;
                    }
                }
            }
        }

        if let Some(StreamUpdate::Completed(text)) = decoder.finish() {
            yield Ok(ChatEvent::Final { text });
        }
    })
}
