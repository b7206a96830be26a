//! LLM plumbing - request assembly, SSE decoding, event emission

mod decode;
mod emitter;
mod message;
mod request;
mod stream;

pub use decode::{SseDecoder, StreamUpdate};
pub use emitter::{ChannelEmitter, ChatEmitter, NullEmitter};
pub use message::{Message, Role};
pub use request::{RequestDescriptor, build_request};
pub use stream::{ChatEvent, ChatEventStream, events};
