//! LLM API client and message types

pub mod client;
pub mod types;

pub use client::LlmClient;
pub use types::{ChatMessage, MessagesRequest, MessagesResponse, Usage};
