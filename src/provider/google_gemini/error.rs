use serde::Deserialize;

use crate::error::LLMError;

const PROVIDER: &str = "google";

/// Parses error responses returned by Google Gemini.
///
/// An invalid key comes back as `400 INVALID_ARGUMENT`, so the message is inspected as
/// well as the status.
pub(crate) fn parse_gemini_error(status: u16, body: &str) -> LLMError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
    }

    #[derive(Deserialize)]
    struct InnerError {
        message: Option<String>,
        status: Option<String>,
    }

    if let Ok(ErrorBody { error: Some(error) }) = serde_json::from_str::<ErrorBody>(body) {
        let mut message = error.message.unwrap_or_else(|| "unknown error".to_string());
        if matches!(status, 401 | 403)
            || error.status.as_deref() == Some("UNAUTHENTICATED")
            || message.contains("API key not valid")
        {
            return LLMError::Auth { provider: PROVIDER };
        }
        if let Some(status_text) = error.status.filter(|text| !text.is_empty()) {
            message = format!("{message} ({status_text})");
        }
        return LLMError::Api {
            provider: PROVIDER,
            status: Some(status),
            message,
        };
    }

    if matches!(status, 401 | 403) {
        return LLMError::Auth { provider: PROVIDER };
    }
    LLMError::Api {
        provider: PROVIDER,
        status: Some(status),
        message: format!("API request failed with status {status}: {body}"),
    }
}
