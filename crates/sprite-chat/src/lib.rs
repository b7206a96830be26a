//! Sprite Chat - streaming multi-provider chat session core
//!
//! This crate provides:
//! - Incremental SSE delta decoding with chunk-boundary independence
//! - Per-provider request assembly (OpenAI-compatible, Anthropic,
//!   DashScope, generic whole-body endpoints)
//! - Conversation sessions with optimistic history and failure notices
//! - A pluggable settings store for provider selection and API keys

pub mod config;
pub mod error;
mod http_client;
pub mod llm;
pub mod session;

// Re-export commonly used types
pub use config::{
    ConfigStore, JsonFileStore, MemoryStore, ProviderCatalog, ProviderConfig, RequestShape,
    Settings,
};
pub use error::{ChatError, Result};
pub use llm::{
    ChannelEmitter, ChatEmitter, ChatEvent, ChatEventStream, Message, NullEmitter,
    RequestDescriptor, Role, SseDecoder, StreamUpdate, build_request, events,
};
pub use session::ChatSession;
