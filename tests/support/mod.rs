//! In-memory transport and sinks shared by the provider integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use q::LLMError;
use q::config::StaticCredentials;
use q::http::{HttpBodyStream, HttpRequest, HttpResponse, HttpTransport};
use q::sink::{MemorySink, OutputSink};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Canned reply served by [`FakeTransport`].
pub struct FakeResponse {
    status: u16,
    chunks: Vec<Vec<u8>>,
    hang: bool,
}

impl FakeResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            chunks: vec![body.as_bytes().to_vec()],
            hang: false,
        }
    }

    pub fn raw(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            chunks: vec![body],
            hang: false,
        }
    }

    /// One chunk per `data:` line.
    pub fn sse(lines: &[&str]) -> Self {
        Self {
            status: 200,
            chunks: lines
                .iter()
                .map(|line| format!("data: {line}\n\n").into_bytes())
                .collect(),
            hang: false,
        }
    }

    /// Keeps the body open after the last chunk instead of closing it.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }
}

/// Serves queued responses in order and records every request.
#[derive(Default)]
pub struct FakeTransport {
    responses: Mutex<VecDeque<FakeResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn with_responses(responses: impl IntoIterator<Item = FakeResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Transport with nothing queued; any call fails.
    pub fn idle() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Body of the `index`-th request as JSON.
    pub fn request_json(&self, index: usize) -> Value {
        let requests = self.requests();
        serde_json::from_slice(&requests[index].body).expect("request body is JSON")
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
        self.requests.lock().expect("requests lock").push(request);
        let Some(response) = self.responses.lock().expect("responses lock").pop_front() else {
            return Err(LLMError::transport("no response queued"));
        };

        let chunks = stream::iter(response.chunks.into_iter().map(Ok));
        let body: HttpBodyStream = if response.hang {
            Box::pin(chunks.chain(stream::pending()))
        } else {
            Box::pin(chunks)
        };
        Ok(HttpResponse {
            status: response.status,
            headers: Default::default(),
            body,
        })
    }
}

/// Records deltas and cancels `token` after the first one.
pub struct CancelAfterFirstDelta {
    pub inner: MemorySink,
    pub token: CancellationToken,
}

impl OutputSink for CancelAfterFirstDelta {
    fn emit(&self, delta: &str) -> Result<(), LLMError> {
        self.inner.emit(delta)?;
        self.token.cancel();
        Ok(())
    }
}

pub fn credentials(provider: &str) -> Arc<StaticCredentials> {
    Arc::new(StaticCredentials::default().with_key(provider, "test-key"))
}

pub fn no_credentials() -> Arc<StaticCredentials> {
    Arc::new(StaticCredentials::default())
}

/// `content` of every message in a request body, for OpenAI/Anthropic shaped payloads.
pub fn message_contents(body: &Value) -> Vec<(String, String)> {
    body["messages"]
        .as_array()
        .expect("messages array")
        .iter()
        .map(|message| {
            (
                message["role"].as_str().expect("role").to_string(),
                message["content"].as_str().expect("content").to_string(),
            )
        })
        .collect()
}
