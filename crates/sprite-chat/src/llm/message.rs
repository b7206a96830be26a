//! Chat message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Synthetic failure notice. Shown to the user but excluded from the
    /// text sent to the provider on later turns.
    #[serde(default, skip_serializing_if = "is_false")]
    pub error: bool,
}

fn is_false(value: &bool) -> bool {
    !value
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            error: false,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an assistant-role failure notice
    pub fn error_notice(content: impl Into<String>) -> Self {
        Self {
            error: true,
            ..Self::new(Role::Assistant, content)
        }
    }
}
