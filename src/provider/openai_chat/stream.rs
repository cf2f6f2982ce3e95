use crate::error::LLMError;
use crate::stream::{Frame, decode_frame};

use super::types::OpenAiStreamChunk;

/// Extracts the text delta of one `chat.completion.chunk`.
pub(crate) fn parse_stream_frame(data: &str) -> Result<Frame, LLMError> {
    let Some(chunk) = decode_frame::<OpenAiStreamChunk>("openai", data) else {
        return Ok(Frame::Skip);
    };
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .map_or(Frame::Skip, Frame::Delta))
}
