use serde::{Deserialize, Serialize};

use crate::types::Message;

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiChatRequest<'a> {
    pub(crate) model: &'a str,
    pub(crate) messages: &'a [Message],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub(crate) stream: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiChatResponse {
    #[serde(default)]
    pub(crate) choices: Option<Vec<OpenAiResponseChoice>>,
}

impl OpenAiChatResponse {
    /// Content of the first choice, if it carries any text.
    pub(crate) fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .flatten()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiResponseChoice {
    #[serde(default)]
    pub(crate) message: Option<OpenAiResponseMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiResponseMessage {
    #[serde(default)]
    pub(crate) content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiStreamChunk {
    #[serde(default)]
    pub(crate) choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiStreamChoice {
    #[serde(default)]
    pub(crate) delta: Option<OpenAiStreamDelta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiStreamDelta {
    #[serde(default)]
    pub(crate) content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_omits_stream_flag_when_false() {
        let messages = [Message::user("hi")];
        let body = OpenAiChatRequest {
            model: "gpt-4o",
            messages: &messages,
            stream: false,
        };
        assert_eq!(
            serde_json::to_value(&body).expect("json"),
            json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}]})
        );
    }

    #[test]
    fn missing_or_null_choices_have_no_text() {
        for body in [r#"{}"#, r#"{"choices":null}"#, r#"{"choices":[]}"#] {
            let parsed: OpenAiChatResponse = serde_json::from_str(body).expect("json");
            assert_eq!(parsed.into_text(), None, "{body}");
        }
    }

    #[test]
    fn null_content_counts_as_empty() {
        let parsed: OpenAiChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).expect("json");
        assert_eq!(parsed.into_text(), None);
    }
}
