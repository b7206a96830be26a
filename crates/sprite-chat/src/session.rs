//! Chat session management.
//!
//! [`ChatSession`] owns one conversation: the visible message history and at
//! most one in-flight request. Sequencing per send: append the user turn
//! optimistically, build the provider request, stream the response while
//! forwarding events to the emitter, then append exactly one assistant
//! message - the final text on success, a human-readable failure notice
//! otherwise.

use futures::StreamExt;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{ChatError, Result};
use crate::http_client::build_http_client;
use crate::llm::{ChatEmitter, ChatEvent, Message, build_request, events};

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a friendly assistant. Answer concisely and helpfully.";

/// One logical conversation against a single provider.
pub struct ChatSession {
    config: ProviderConfig,
    system_prompt: String,
    messages: Vec<Message>,
    busy: bool,
    client: reqwest::Client,
}

impl ChatSession {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            messages: Vec::new(),
            busy: false,
            client: build_http_client(),
        }
    }

    /// Replace the synthetic system prompt injected at request time.
    /// The prompt is never stored in the visible history.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Seed the history with an assistant greeting.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.messages.push(Message::assistant(greeting));
        self
    }

    /// The visible conversation so far.
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// Whether a request is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.config
    }

    /// Swap the provider for subsequent turns. History carries over.
    pub fn set_provider(&mut self, config: ProviderConfig) {
        self.config = config;
    }

    /// Send one user message and stream the assistant's reply.
    ///
    /// Progress is forwarded to `emitter`; the return value is the complete
    /// assistant text. Rejected with [`ChatError::Busy`] while a previous
    /// stream is unresolved. On failure the history gains an assistant-role
    /// failure notice instead of the reply, and the causal error is
    /// returned; the user's turn is kept either way. Dropping the returned
    /// future aborts the request and leaves the session usable.
    pub async fn send(&mut self, text: &str, emitter: &mut dyn ChatEmitter) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyInput);
        }
        if self.busy {
            return Err(ChatError::Busy);
        }

        self.busy = true;
        let outcome = {
            // Clears the flag even if this future is dropped mid-stream; a
            // cancelled send must not wedge the session.
            let mut guard = BusyGuard(&mut *self);
            guard.0.exchange(text, emitter).await
        };

        match outcome {
            Ok(reply) => {
                self.messages.push(Message::assistant(reply.clone()));
                Ok(reply)
            }
            Err(err) => {
                warn!(provider = %self.config.name, error = %err, "Chat request failed");
                let notice = failure_notice(&err);
                emitter.emit_error(&notice).await;
                self.messages.push(Message::error_notice(notice));
                Err(err)
            }
        }
    }

    async fn exchange(&mut self, text: &str, emitter: &mut dyn ChatEmitter) -> Result<String> {
        self.messages.push(Message::user(text));
        let prior = &self.messages[..self.messages.len() - 1];
        let request = build_request(&self.config, &self.system_prompt, prior, text);

        debug!(
            provider = %self.config.name,
            url = %request.url,
            shape = self.config.shape.as_str(),
            "Dispatching chat request"
        );

        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder.json(&request.body).send().await?;

        if !response.status().is_success() {
            return Err(ChatError::from_response(response, &self.config.name).await);
        }

        let mut stream = events(response, self.config.shape);
        let mut reply = String::new();
        while let Some(event) = stream.next().await {
            match event {
                Ok(ChatEvent::Delta { text }) => {
                    emitter.emit_delta(&text).await;
                    reply = text;
                }
                Ok(ChatEvent::Final { text }) => {
                    emitter.emit_final(&text).await;
                    reply = text;
                }
                // Event streams report failures as Err items; nothing
                // constructs this variant here.
                Ok(ChatEvent::Error { message }) => {
                    emitter.emit_error(&message).await;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(reply)
    }
}

struct BusyGuard<'a>(&'a mut ChatSession);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.busy = false;
    }
}

/// Human-readable failure notice appended to the history in place of the
/// assistant's reply. Never a raw stack trace.
fn failure_notice(err: &ChatError) -> String {
    match err {
        ChatError::Api { provider, status, .. } => format!(
            "Sorry, {provider} rejected the request (status {status}). \
             Please check your API key and model configuration, then try again."
        ),
        ChatError::Http(_) => "Sorry, something went wrong talking to the provider. \
             Please check your network connection and try again."
            .to_string(),
        other => format!("Sorry, the request could not be completed: {other}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderConfig, RequestShape};
    use crate::llm::NullEmitter;

    fn unreachable_config() -> ProviderConfig {
        // Port 9 (discard) refuses connections on loopback.
        ProviderConfig::new(
            "test",
            RequestShape::OpenAi,
            "http://127.0.0.1:9/v1/chat/completions",
            "test-model",
        )
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_history_changes() {
        let mut session = ChatSession::new(unreachable_config());
        let err = session.send("   ", &mut NullEmitter).await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyInput));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn failed_send_keeps_user_turn_and_appends_notice() {
        let mut session = ChatSession::new(unreachable_config());
        let err = session.send("hello", &mut NullEmitter).await.unwrap_err();
        assert!(matches!(err, ChatError::Http(_)));

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, crate::llm::Role::User);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].role, crate::llm::Role::Assistant);
        assert!(history[1].error);
        assert!(history[1].content.starts_with("Sorry"));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn greeting_seeds_history() {
        let session = ChatSession::new(unreachable_config()).with_greeting("Hi! Ask me anything.");
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].role, crate::llm::Role::Assistant);
    }

    #[test]
    fn failure_notices_are_human_readable() {
        let notice = failure_notice(&ChatError::Api {
            provider: "qwen".to_string(),
            status: 401,
            message: "{\"error\":\"bad key\"}".to_string(),
        });
        assert!(notice.contains("qwen"));
        assert!(notice.contains("401"));
        assert!(!notice.contains("bad key"));
    }
}
