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

use super::error::parse_openai_error;
use super::stream::parse_stream_frame;
use super::types::{OpenAiChatRequest, OpenAiChatResponse};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const PROVIDER_NAME: &str = "openai";
const SUPPORTED_MODELS: &[&str] = &[
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-0613",
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4.1",
    "gpt-4.1-mini",
    "gpt-4.1-nano",
    "o3-mini",
    "o3",
    "o3-pro",
    "o4-mini",
];

/// OpenAI Chat Completions provider.
pub struct OpenAiChatProvider {
    transport: DynHttpTransport,
    credentials: DynCredentialStore,
    sink: DynOutputSink,
    base_url: String,
    conversation: Conversation,
}

impl OpenAiChatProvider {
    /// Creates a provider that targets `api.openai.com` and streams to stdout.
    pub fn new(transport: DynHttpTransport, credentials: DynCredentialStore) -> Self {
        Self {
            transport,
            credentials,
            sink: Arc::new(StdoutSink),
            base_url: DEFAULT_BASE_URL.to_string(),
            conversation: Conversation::new(),
        }
    }

    /// Overrides the base URL, e.g. for a proxy or an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replaces the sink that receives streamed deltas.
    pub fn with_sink(mut self, sink: DynOutputSink) -> Self {
        self.sink = sink;
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    fn build_headers(&self, api_key: &str) -> HashMap<String, String> {
        HashMap::from([
            ("Authorization".to_string(), format!("Bearer {api_key}")),
            ("Accept".to_string(), "application/json".to_string()),
        ])
    }

    /// Issues the request and checks the status; the body is left unread.
    async fn send(
        &self,
        cancel: &CancellationToken,
        model: &str,
        messages: &[Message],
        stream: bool,
    ) -> Result<HttpResponse, LLMError> {
        let api_key = require_api_key(&self.credentials, PROVIDER_NAME)?;
        let body = OpenAiChatRequest {
            model,
            messages,
            stream,
        };
        tracing::debug!(
            provider = PROVIDER_NAME,
            model,
            messages = messages.len(),
            stream,
            "sending chat completion request"
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
            return Err(parse_openai_error(status, &text));
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
        let parsed: OpenAiChatResponse = serde_json::from_slice(&bytes).map_err(|err| {
            LLMError::malformed(PROVIDER_NAME, format!("failed to parse OpenAI response: {err}"))
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
impl Provider for OpenAiChatProvider {
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

    fn provider(base_url: &str) -> OpenAiChatProvider {
        OpenAiChatProvider::new(
            default_dyn_transport().expect("transport"),
            Arc::new(StaticCredentials::default()),
        )
        .with_base_url(base_url)
    }

    #[test]
    fn endpoint_appends_version_only_when_missing() {
        assert_eq!(
            provider("https://api.openai.com").endpoint(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            provider("http://localhost:8080/v1/").endpoint(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn bearer_header_carries_the_key() {
        let headers = provider(DEFAULT_BASE_URL).build_headers("sk-test");
        assert_eq!(headers["Authorization"], "Bearer sk-test");
    }
}
