//! Consumer boundary for chat progress events.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::llm::stream::ChatEvent;

/// Receives session progress. Implemented by renderers and test harnesses.
/// Deltas arrive in order, followed by one final notification; on failure an
/// error notice closes the turn instead (preceded by a best-effort final
/// when partial content had already streamed).
#[async_trait]
pub trait ChatEmitter: Send {
    /// Incremental update; `text` is the full visible message so far.
    async fn emit_delta(&mut self, text: &str);
    /// The turn finished with `text` as the complete assistant message.
    async fn emit_final(&mut self, text: &str);
    /// The turn failed; `message` is the human-readable notice.
    async fn emit_error(&mut self, message: &str);
}

pub struct NullEmitter;

#[async_trait]
impl ChatEmitter for NullEmitter {
    async fn emit_delta(&mut self, _text: &str) {}
    async fn emit_final(&mut self, _text: &str) {}
    async fn emit_error(&mut self, _message: &str) {}
}

/// Forwards events over an mpsc channel.
pub struct ChannelEmitter {
    tx: mpsc::Sender<ChatEvent>,
}

impl ChannelEmitter {
    pub fn new(tx: mpsc::Sender<ChatEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ChatEmitter for ChannelEmitter {
    async fn emit_delta(&mut self, text: &str) {
        let _ = self
            .tx
            .send(ChatEvent::Delta {
                text: text.to_string(),
            })
            .await;
    }

    async fn emit_final(&mut self, text: &str) {
        let _ = self
            .tx
            .send(ChatEvent::Final {
                text: text.to_string(),
            })
            .await;
    }

    async fn emit_error(&mut self, message: &str) {
        let _ = self
            .tx
            .send(ChatEvent::Error {
                message: message.to_string(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_emitter_accepts_everything() {
        let mut emitter = NullEmitter;
        emitter.emit_delta("a").await;
        emitter.emit_final("ab").await;
        emitter.emit_error("boom").await;
    }

    #[tokio::test]
    async fn channel_emitter_forwards_events_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut emitter = ChannelEmitter::new(tx);

        emitter.emit_delta("He").await;
        emitter.emit_delta("Hello").await;
        emitter.emit_final("Hello").await;

        assert_eq!(
            rx.recv().await,
            Some(ChatEvent::Delta {
                text: "He".to_string()
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(ChatEvent::Delta {
                text: "Hello".to_string()
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(ChatEvent::Final {
                text: "Hello".to_string()
            })
        );
    }
}
