use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::config::DynCredentialStore;
use crate::conversation::Conversation;
use crate::error::LLMError;
use crate::http::{DynHttpTransport, HttpResponse, post_json_with_headers};
use crate::provider::{Provider, cancellable, require_api_key};
use crate::sink::{DynOutputSink, StdoutSink};
use crate::stream::accumulate;
use crate::types::Message;

use super::error::parse_gemini_error;
use super::stream::parse_stream_frame;
use super::types::{GeminiGenerateContentRequest, GeminiGenerateContentResponse};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const PROVIDER_NAME: &str = "google";
const SUPPORTED_MODELS: &[&str] = &[
    "gemini-1.0-pro",
    "gemini-1.0-pro-vision",
    "gemini-1.5-pro",
    "gemini-1.5-flash",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-2.5-pro",
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
];

/// Google Gemini GenerateContent provider.
///
/// The API key travels as the `key` query parameter, so request URLs are never logged.
pub struct GoogleGeminiProvider {
    transport: DynHttpTransport,
    credentials: DynCredentialStore,
    sink: DynOutputSink,
    base_url: String,
    conversation: Conversation,
}

impl GoogleGeminiProvider {
    pub fn new(transport: DynHttpTransport, credentials: DynCredentialStore) -> Self {
        Self {
            transport,
            credentials,
            sink: Arc::new(StdoutSink),
            base_url: DEFAULT_BASE_URL.to_string(),
            conversation: Conversation::new(),
        }
    }

    /// Overrides the base URL, e.g. to point at a proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_sink(mut self, sink: DynOutputSink) -> Self {
        self.sink = sink;
        self
    }

    /// `generateContent` or `streamGenerateContent?alt=sse` for `model`, without the key.
    pub(crate) fn endpoint(&self, model: &str, stream: bool) -> String {
        let base = self.base_url.trim_end_matches('/');
        let model_path = normalize_model(model);
        let method = if stream {
            "streamGenerateContent?alt=sse"
        } else {
            "generateContent"
        };
        if base.ends_with("/v1beta") {
            format!("{base}/{model_path}:{method}")
        } else {
            format!("{base}/v1beta/{model_path}:{method}")
        }
    }

    fn keyed_endpoint(&self, model: &str, stream: bool, api_key: &str) -> Result<String, LLMError> {
        Url::parse_with_params(&self.endpoint(model, stream), [("key", api_key)])
            .map(String::from)
            .map_err(|err| LLMError::Config {
                message: format!("invalid Google endpoint: {err}"),
            })
    }

    fn build_headers(&self) -> HashMap<String, String> {
        HashMap::from([("Accept".to_string(), "application/json".to_string())])
    }

    async fn send(
        &self,
        cancel: &CancellationToken,
        model: &str,
        messages: &[Message],
        stream: bool,
    ) -> Result<HttpResponse, LLMError> {
        let api_key = require_api_key(&self.credentials, PROVIDER_NAME)?;
        let url = self.keyed_endpoint(model, stream, &api_key)?;
        let body = GeminiGenerateContentRequest::from_messages(messages);
        tracing::debug!(
            provider = PROVIDER_NAME,
            model,
            messages = messages.len(),
            stream,
            "sending generateContent request"
        );
        let response = cancellable(
            cancel,
            post_json_with_headers(self.transport.as_ref(), url, self.build_headers(), &body),
        )
        .await?;

        if !response.is_success() {
            let status = response.status;
            let text = cancellable(cancel, response.text()).await?;
            return Err(parse_gemini_error(status, &text));
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
        let parsed: GeminiGenerateContentResponse = serde_json::from_slice(&bytes).map_err(|err| {
            LLMError::malformed(
                PROVIDER_NAME,
                format!("failed to parse Gemini response: {err}"),
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

fn normalize_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

#[async_trait]
impl Provider for GoogleGeminiProvider {
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

    fn provider() -> GoogleGeminiProvider {
        GoogleGeminiProvider::new(
            default_dyn_transport().expect("transport"),
            Arc::new(StaticCredentials::default()),
        )
    }

    #[test]
    fn endpoints_follow_model_and_mode() {
        let provider = provider();
        assert_eq!(
            provider.endpoint("gemini-2.0-flash", false),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(
            provider.endpoint("models/gemini-2.5-pro", true),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-pro:streamGenerateContent?alt=sse"
        );

        let proxied = provider.with_base_url("http://localhost:8080/v1beta/");
        assert_eq!(
            proxied.endpoint("gemini-2.0-flash", false),
            "http://localhost:8080/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn key_is_appended_as_query_parameter() {
        let provider = provider();
        let url = provider
            .keyed_endpoint("gemini-2.0-flash", true, "AIza key")
            .expect("url");
        assert!(url.ends_with(":streamGenerateContent?alt=sse&key=AIza+key"), "{url}");
        assert!(!provider.build_headers().contains_key("x-goog-api-key"));
    }
}
