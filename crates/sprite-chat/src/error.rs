//! Error types for the chat core

use thiserror::Error;

/// Chat core error types
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Invalid chat configuration: {0}")]
    Build(String),

    #[error("Empty user message")]
    EmptyInput,

    #[error("A request is already in flight for this session")]
    Busy,

    #[error("{provider} API error (status {status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Convert a non-success HTTP response into an [`ChatError::Api`] value.
    pub(crate) async fn from_response(response: reqwest::Response, provider: &str) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        // Truncate error body to prevent leaking large or sensitive responses.
        const MAX_ERROR_BODY: usize = 512;
        let message = if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}... [truncated]", &body[..cut])
        } else {
            body
        };

        ChatError::Api {
            provider: provider.to_string(),
            status,
            message,
        }
    }
}

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;
