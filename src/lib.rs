//! Command-line LLM client library: one [`Provider`] contract over OpenAI, Anthropic and
//! Google, a name-keyed [`Registry`], and streaming with conversation history.

pub mod config;
pub mod conversation;
pub mod error;
pub mod http;
pub mod provider;
pub mod registry;
pub mod sink;
pub mod stream;
pub mod types;

use std::sync::Arc;

pub use error::LLMError;
pub use provider::{DynProvider, Provider};
pub use registry::Registry;
pub use types::{Message, Role};

use config::DynCredentialStore;
use http::DynHttpTransport;
use provider::anthropic_messages::AnthropicMessagesProvider;
use provider::google_gemini::GoogleGeminiProvider;
use provider::openai_chat::OpenAiChatProvider;

/// Registry holding the three built-in backends, all sharing one transport and key store.
pub fn default_registry(transport: DynHttpTransport, credentials: DynCredentialStore) -> Registry {
    let registry = Registry::new();
    registry.register([
        Arc::new(AnthropicMessagesProvider::new(
            transport.clone(),
            credentials.clone(),
        )) as DynProvider,
        Arc::new(GoogleGeminiProvider::new(transport.clone(), credentials.clone())),
        Arc::new(OpenAiChatProvider::new(transport, credentials)),
    ]);
    registry
}
