//! Hosted language model client.
//!
//! The gateway forwards questions to an OpenAI-compatible chat completion
//! API and relays either the whole answer or a stream of text deltas.

mod client;
mod types;

pub use client::{LlmClient, TextStream};
pub use types::{
    ChatRequest, ChatResponse, Choice, Delta, Message, MessageRole, StreamChoice, StreamChunk,
    Usage,
};
