use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::LLMError;
use crate::http::HttpBodyStream;
use crate::sink::OutputSink;

const DATA_PREFIX: &[u8] = b"data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Event yielded by [`LineDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Payload of one `data:` line.
    Data(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Splits an SSE body into `data:` lines.
///
/// Lines without the `data:` prefix (`event:` names, comments, keep-alives, blank
/// separators) are dropped. Nothing is yielded after the sentinel.
pub struct LineDecoder {
    body: HttpBodyStream,
    buffer: Vec<u8>,
    pending: VecDeque<StreamEvent>,
    provider: &'static str,
    stream_closed: bool,
    done_received: bool,
}

impl LineDecoder {
    pub fn new(body: HttpBodyStream, provider: &'static str) -> Self {
        Self {
            body,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            provider,
            stream_closed: false,
            done_received: false,
        }
    }

    fn handle_line(&mut self, line: &[u8]) {
        if self.done_received || !line.starts_with(DATA_PREFIX) {
            return;
        }
        let mut data = &line[DATA_PREFIX.len()..];
        if data.first() == Some(&b' ') {
            data = &data[1..];
        }
        let Ok(data) = std::str::from_utf8(data) else {
            tracing::debug!(provider = self.provider, "skipping non UTF-8 stream line");
            return;
        };
        if data.trim() == DONE_SENTINEL {
            self.done_received = true;
            self.pending.push_back(StreamEvent::Done);
        } else {
            self.pending.push_back(StreamEvent::Data(data.to_string()));
        }
    }

    fn drain_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
        buffer.iter().position(|b| *b == b'\n').map(|pos| {
            let mut line: Vec<u8> = buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            line
        })
    }
}

impl Stream for LineDecoder {
    type Item = Result<StreamEvent, LLMError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.done_received || this.stream_closed {
                return Poll::Ready(None);
            }

            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.extend_from_slice(&bytes);
                    while let Some(line) = Self::drain_line(&mut this.buffer) {
                        this.handle_line(&line);
                    }
                }
                Poll::Ready(Some(Err(err))) => return Poll::Ready(Some(Err(err))),
                Poll::Ready(None) => {
                    this.stream_closed = true;
                    if !this.buffer.is_empty() {
                        let line = std::mem::take(&mut this.buffer);
                        this.handle_line(&line);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// What a vendor parser extracted from one data line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Frame {
    /// A text increment.
    Delta(String),
    /// Nothing usable in this frame.
    Skip,
    /// Vendor-specific end-of-stream marker.
    Stop,
}

/// Deserializes one frame, logging and discarding it when it does not parse.
pub(crate) fn decode_frame<T: DeserializeOwned>(provider: &'static str, data: &str) -> Option<T> {
    match serde_json::from_str(data) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!(provider, error = %err, "skipping malformed stream frame");
            None
        }
    }
}

/// Consumes a streamed body, emitting each delta to `sink` and returning the concatenation.
///
/// Cancellation is checked before every read. When it fires the accumulated text is
/// returned inside [`LLMError::Cancelled`]; anything already emitted stays emitted.
pub(crate) async fn accumulate<F>(
    body: HttpBodyStream,
    provider: &'static str,
    cancel: &CancellationToken,
    sink: &dyn OutputSink,
    mut parse: F,
) -> Result<String, LLMError>
where
    F: FnMut(&str) -> Result<Frame, LLMError>,
{
    let mut decoder = LineDecoder::new(body, provider);
    let mut full = String::new();

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(LLMError::Cancelled { partial: full }),
            event = decoder.next() => event,
        };
        let Some(event) = event else {
            break;
        };
        let data = match event? {
            StreamEvent::Data(data) => data,
            StreamEvent::Done => break,
        };
        match parse(&data)? {
            Frame::Delta(text) if !text.is_empty() => {
                sink.emit(&text)?;
                full.push_str(&text);
            }
            Frame::Delta(_) | Frame::Skip => {}
            Frame::Stop => break,
        }
    }

    tracing::debug!(provider, chars = full.len(), "stream finished");
    Ok(full)
}
