use serde::{Deserialize, Serialize};

use crate::types::{Message, Role};

#[derive(Debug, Serialize)]
pub(crate) struct GeminiGenerateContentRequest<'a> {
    pub(crate) contents: Vec<GeminiRequestContent<'a>>,
}

impl<'a> GeminiGenerateContentRequest<'a> {
    /// Gemini names the assistant role `model`.
    pub(crate) fn from_messages(messages: &'a [Message]) -> Self {
        let contents = messages
            .iter()
            .map(|message| GeminiRequestContent {
                role: match message.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                },
                parts: vec![GeminiRequestPart {
                    text: &message.content,
                }],
            })
            .collect();
        Self { contents }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GeminiRequestContent<'a> {
    pub(crate) role: &'static str,
    pub(crate) parts: Vec<GeminiRequestPart<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GeminiRequestPart<'a> {
    pub(crate) text: &'a str,
}

/// Shape shared by `generateContent` replies and each `streamGenerateContent` event.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiGenerateContentResponse {
    #[serde(default)]
    pub(crate) candidates: Option<Vec<GeminiCandidate>>,
}

impl GeminiGenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    pub(crate) fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().flatten().next()?.content?;
        let text: String = content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        Some(text).filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiCandidate {
    #[serde(default)]
    pub(crate) content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiResponseContent {
    #[serde(default)]
    pub(crate) parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiResponsePart {
    #[serde(default)]
    pub(crate) text: Option<String>,
}
