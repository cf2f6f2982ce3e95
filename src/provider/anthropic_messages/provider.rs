use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::DynCredentialStore;
use crate::conversation::Conversation;
use crate::error::LLMError;
use crate::http::{DynHttpTransport, HttpResponse, post_json_with_headers};
use crate::provider::{Provider, cancellable, require_api_key};
use crate::sink::{DynOutputSink, StdoutSink};
use crate::stream::accumulate;
use crate::types::Message;

use super::error::parse_anthropic_error;
use super::stream::parse_stream_frame;
use super::types::{AnthropicMessageRequest, AnthropicMessageResponse, DEFAULT_MAX_TOKENS};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_VERSION: &str = "2023-06-01";
const PROVIDER_NAME: &str = "anthropic";
const SUPPORTED_MODELS: &[&str] = &[
    "claude-opus-4-20250514",
    "claude-sonnet-4-20250514",
    "claude-3-7-sonnet-20250219",
    "claude-3-5-haiku-20241022",
];

/// Anthropic Messages provider for Claude models.
pub struct AnthropicMessagesProvider {
    transport: DynHttpTransport,
    credentials: DynCredentialStore,
    sink: DynOutputSink,
    base_url: String,
    version: String,
    conversation: Conversation,
}

impl AnthropicMessagesProvider {
    /// Uses the public endpoint and `anthropic-version: 2023-06-01`.
    pub fn new(transport: DynHttpTransport, credentials: DynCredentialStore) -> Self {
        Self {
            transport,
            credentials,
            sink: Arc::new(StdoutSink),
            base_url: DEFAULT_BASE_URL.to_string(),
            version: DEFAULT_VERSION.to_string(),
            conversation: Conversation::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the `anthropic-version` header.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_sink(mut self, sink: DynOutputSink) -> Self {
        self.sink = sink;
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/messages")
        } else {
            format!("{base}/v1/messages")
        }
    }

    fn build_headers(&self, api_key: &str) -> HashMap<String, String> {
        HashMap::from([
            ("x-api-key".to_string(), api_key.to_string()),
            ("anthropic-version".to_string(), self.version.clone()),
            ("Accept".to_string(), "application/json".to_string()),
        ])
    }

    async fn send(
        &self,
        cancel: &CancellationToken,
        model: &str,
        messages: &[Message],
        stream: bool,
    ) -> Result<HttpResponse, LLMError> {
        let api_key = require_api_key(&self.credentials, PROVIDER_NAME)?;
        let body = AnthropicMessageRequest {
            model,
            max_tokens: DEFAULT_MAX_TOKENS,
            messages,
            stream,
        };
        tracing::debug!(
            provider = PROVIDER_NAME,
            model,
            messages = messages.len(),
            stream,
            "sending messages request"
        );
        let response = cancellable(
            cancel,
            post_json_with_headers(
                self.transport.as_ref(),
                self.endpoint(),
                self.build_headers(&api_key),
                &body,
            ),
        )
        .await?;

        if !response.is_success() {
            let status = response.status;
            let text = cancellable(cancel, response.text()).await?;
            return Err(parse_anthropic_error(status, &text));
        }
        Ok(response)
    }

    async fn complete(
        &self,
        cancel: &CancellationToken,
        model: &str,
        messages: &[Message],
    ) -> Result<String, LLMError> {
        let response = self.send(cancel, model, messages, false).await?;
        let bytes = cancellable(cancel, response.bytes()).await?;
        let parsed: AnthropicMessageResponse = serde_json::from_slice(&bytes).map_err(|err| {
            LLMError::malformed(
                PROVIDER_NAME,
                format!("failed to parse Anthropic response: {err}"),
            )
        })?;
        parsed.into_text().ok_or(LLMError::EmptyResponse {
            provider: PROVIDER_NAME,
        })
    }

    async fn complete_stream(
        &self,
        cancel: &CancellationToken,
        model: &str,
        messages: &[Message],
    ) -> Result<String, LLMError> {
        let response = self.send(cancel, model, messages, true).await?;
        accumulate(
            response.body,
            PROVIDER_NAME,
            cancel,
            self.sink.as_ref(),
            parse_stream_frame,
        )
        .await
    }
}

#[async_trait]
impl Provider for AnthropicMessagesProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn supported_models(&self) -> &'static [&'static str] {
        SUPPORTED_MODELS
    }

    async fn prompt(
        &self,
        cancel: &CancellationToken,
        model: &str,
        prompt: &str,
    ) -> Result<String, LLMError> {
        self.complete(cancel, model, &[Message::user(prompt)]).await
    }

    async fn stream(
        &self,
        cancel: &CancellationToken,
        model: &str,
        prompt: &str,
    ) -> Result<String, LLMError> {
        self.complete_stream(cancel, model, &[Message::user(prompt)])
            .await
    }

    async fn chat_prompt(
        &self,
        cancel: &CancellationToken,
        model: &str,
        message: &str,
    ) -> Result<String, LLMError> {
        self.conversation
            .exchange(message, |history| async move {
                self.complete(cancel, model, &history).await
            })
            .await
    }

    async fn chat_stream(
        &self,
        cancel: &CancellationToken,
        model: &str,
        message: &str,
    ) -> Result<String, LLMError> {
        self.conversation
            .exchange_stream(message, |history| async move {
                self.complete_stream(cancel, model, &history).await
            })
            .await
    }

    fn reset_chat(&self) {
        self.conversation.clear();
    }

    fn history(&self) -> Vec<Message> {
        self.conversation.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticCredentials;
    use crate::http::reqwest::default_dyn_transport;

    #[test]
    fn headers_carry_key_and_version() {
        let provider = AnthropicMessagesProvider::new(
            default_dyn_transport().expect("transport"),
            Arc::new(StaticCredentials::default()),
        )
        .with_version("2024-01-01");
        let headers = provider.build_headers("sk-ant");

        assert_eq!(headers["x-api-key"], "sk-ant");
        assert_eq!(headers["anthropic-version"], "2024-01-01");
        assert!(!headers.contains_key("Authorization"));
        assert_eq!(provider.endpoint(), "https://api.anthropic.com/v1/messages");
    }
}
