use serde::Deserialize;
use serde_json::Value;

use crate::error::LLMError;

const PROVIDER: &str = "openai";

/// Maps a non-2xx OpenAI response to an [`LLMError`].
pub(crate) fn parse_openai_error(status: u16, body: &str) -> LLMError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
    }
    #[derive(Deserialize)]
    struct InnerError {
        message: Option<String>,
        code: Option<Value>,
    }

    if let Ok(ErrorBody { error: Some(error) }) = serde_json::from_str::<ErrorBody>(body) {
        let message = error.message.unwrap_or_else(|| "unknown error".to_string());
        let code = error.code.as_ref().and_then(Value::as_str).unwrap_or_default();
        if status == 401
            || code.contains("invalid_api_key")
            || message.contains("Incorrect API key")
        {
            return LLMError::Auth { provider: PROVIDER };
        }
        return LLMError::Api {
            provider: PROVIDER,
            status: Some(status),
            message,
        };
    }

    if status == 401 {
        return LLMError::Auth { provider: PROVIDER };
    }
    LLMError::Api {
        provider: PROVIDER,
        status: Some(status),
        message: format!("API request failed with status {status}: {body}"),
    }
}
