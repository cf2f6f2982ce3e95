use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::DynCredentialStore;
use crate::error::LLMError;
use crate::types::Message;

pub mod anthropic_messages;
pub mod google_gemini;
pub mod openai_chat;

/// Uniform contract implemented by every vendor backend.
///
/// Each method that talks to the network takes the caller's [`CancellationToken`]; the
/// in-flight request is dropped as soon as it fires and the call returns
/// [`LLMError::Cancelled`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// Vendor identifier used as the registry key, e.g. `openai`.
    fn name(&self) -> &'static str;

    /// Model identifiers this backend accepts, in display order.
    fn supported_models(&self) -> &'static [&'static str];

    /// Sends a one-shot prompt and returns the full reply. Does not touch the history.
    async fn prompt(
        &self,
        cancel: &CancellationToken,
        model: &str,
        prompt: &str,
    ) -> Result<String, LLMError>;

    /// Sends a one-shot prompt, writing each delta to the output sink as it arrives.
    /// Returns the reassembled reply.
    async fn stream(
        &self,
        cancel: &CancellationToken,
        model: &str,
        prompt: &str,
    ) -> Result<String, LLMError>;

    /// Appends `message` to the history and sends the whole conversation.
    async fn chat_prompt(
        &self,
        cancel: &CancellationToken,
        model: &str,
        message: &str,
    ) -> Result<String, LLMError>;

    /// Streaming variant of [`Provider::chat_prompt`].
    async fn chat_stream(
        &self,
        cancel: &CancellationToken,
        model: &str,
        message: &str,
    ) -> Result<String, LLMError>;

    /// Clears the conversation history.
    fn reset_chat(&self);

    /// Copy of the conversation history, oldest first.
    fn history(&self) -> Vec<Message>;

    /// Returns `true` when `model` is listed in [`Provider::supported_models`].
    fn supports_model(&self, model: &str) -> bool {
        self.supported_models().contains(&model)
    }
}

/// Thread-safe provider handle.
pub type DynProvider = Arc<dyn Provider>;

/// Looks the provider's key up, failing before any network traffic when none is set.
pub(crate) fn require_api_key(
    credentials: &DynCredentialStore,
    provider: &'static str,
) -> Result<String, LLMError> {
    match credentials.api_key(provider)? {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(LLMError::MissingCredential { provider }),
    }
}

/// Races `future` against the cancellation token.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, future: F) -> Result<T, LLMError>
where
    F: std::future::Future<Output = Result<T, LLMError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(LLMError::Cancelled { partial: String::new() }),
        result = future => result,
    }
}
