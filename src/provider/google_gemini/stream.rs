use crate::error::LLMError;
use crate::stream::{Frame, decode_frame};

use super::types::GeminiGenerateContentResponse;

/// Each `alt=sse` event is a complete `GenerateContentResponse` fragment. Gemini sends
/// no sentinel; the stream ends when the connection closes.
pub(crate) fn parse_stream_frame(data: &str) -> Result<Frame, LLMError> {
    Ok(decode_frame::<GeminiGenerateContentResponse>("google", data)
        .and_then(GeminiGenerateContentResponse::into_text)
        .map_or(Frame::Skip, Frame::Delta))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_text_becomes_delta() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"h"}],"role":"model"},"index":0}]}"#;
        assert_eq!(
            parse_stream_frame(data).expect("frame"),
            Frame::Delta("h".to_string())
        );
    }

    #[test]
    fn usage_only_frame_is_skipped() {
        let data = r#"{"usageMetadata":{"promptTokenCount":3,"totalTokenCount":5}}"#;
        assert_eq!(parse_stream_frame(data).expect("frame"), Frame::Skip);
    }
}
