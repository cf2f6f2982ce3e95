use crate::error::LLMError;
use crate::stream::{Frame, decode_frame};

use super::error::classify;
use super::types::AnthropicStreamEvent;

/// Maps one Messages API event to a text delta.
///
/// `message_stop` ends the stream and an `error` event aborts it; pings, block
/// boundaries and non-text deltas are skipped.
pub(crate) fn parse_stream_frame(data: &str) -> Result<Frame, LLMError> {
    let Some(event) = decode_frame::<AnthropicStreamEvent>("anthropic", data) else {
        return Ok(Frame::Skip);
    };
    match event {
        AnthropicStreamEvent::ContentBlockDelta { delta } => {
            Ok(delta.text.map_or(Frame::Skip, Frame::Delta))
        }
        AnthropicStreamEvent::MessageStop => Ok(Frame::Stop),
        AnthropicStreamEvent::Error { error } => Err(classify(None, error)),
        AnthropicStreamEvent::Other => Ok(Frame::Skip),
    }
}
