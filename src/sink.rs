//! Destinations for streamed deltas.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::LLMError;

/// Receives each streamed delta as soon as it is decoded, in arrival order.
pub trait OutputSink: Send + Sync {
    /// Writes one delta. Called synchronously from the streaming loop.
    fn emit(&self, delta: &str) -> Result<(), LLMError>;
}

/// Thread-safe handle to a sink implementation.
pub type DynOutputSink = Arc<dyn OutputSink>;

/// Writes deltas to standard output and flushes after each one.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&self, delta: &str) -> Result<(), LLMError> {
        let mut out = std::io::stdout().lock();
        out.write_all(delta.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|err| LLMError::Output {
                message: err.to_string(),
            })
    }
}

/// Collects deltas in memory.
///
/// # Examples
///
/// ```
/// use q::sink::{MemorySink, OutputSink};
///
/// let sink = MemorySink::default();
/// sink.emit("h").unwrap();
/// sink.emit("i").unwrap();
/// assert_eq!(sink.contents(), "hi");
/// assert_eq!(sink.deltas(), vec!["h".to_string(), "i".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    deltas: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Concatenation of everything emitted so far.
    pub fn contents(&self) -> String {
        self.deltas().concat()
    }

    /// Every emitted delta, oldest first.
    pub fn deltas(&self) -> Vec<String> {
        self.deltas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl OutputSink for MemorySink {
    fn emit(&self, delta: &str) -> Result<(), LLMError> {
        self.deltas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(delta.to_string());
        Ok(())
    }
}
