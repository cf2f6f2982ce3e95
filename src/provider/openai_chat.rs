//! OpenAI Chat Completions backend.

mod error;
mod provider;
mod stream;
mod types;

pub use provider::OpenAiChatProvider;
