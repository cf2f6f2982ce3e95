use serde::Deserialize;

use crate::error::LLMError;

use super::types::AnthropicErrorDetail;

const PROVIDER: &str = "anthropic";

/// Parses error responses returned by the Anthropic Messages API.
pub(crate) fn parse_anthropic_error(status: u16, body: &str) -> LLMError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<AnthropicErrorDetail>,
    }

    if let Ok(ErrorBody { error: Some(error) }) = serde_json::from_str::<ErrorBody>(body) {
        return classify(Some(status), error);
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

/// Maps an error object, from a response body or an `error` stream event.
pub(crate) fn classify(status: Option<u16>, error: AnthropicErrorDetail) -> LLMError {
    if status == Some(401) || error.kind.as_deref() == Some("authentication_error") {
        return LLMError::Auth { provider: PROVIDER };
    }
    let message = match (error.kind, error.message) {
        (Some(kind), Some(message)) => format!("{message} ({kind})"),
        (None, Some(message)) => message,
        (Some(kind), None) => kind,
        (None, None) => "unknown error".to_string(),
    };
    LLMError::Api {
        provider: PROVIDER,
        status,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_error_maps_to_auth() {
        let body = r#"{
  "type": "error",
  "error": {
    "type": "authentication_error",
    "message": "invalid x-api-key"
  }
}"#;
        assert!(matches!(
            parse_anthropic_error(401, body),
            LLMError::Auth {
                provider: "anthropic"
            }
        ));
    }

    #[test]
    fn overloaded_error_keeps_vendor_message() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        match parse_anthropic_error(529, body) {
            LLMError::Api {
                status, message, ..
            } => {
                assert_eq!(status, Some(529));
                assert_eq!(message, "Overloaded (overloaded_error)");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn non_json_payload_surfaces_raw_body() {
        match parse_anthropic_error(500, "not a json") {
            LLMError::Api { message, .. } => {
                assert!(message.contains("status 500: not a json"), "{message}")
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert!(matches!(
            parse_anthropic_error(401, "nope"),
            LLMError::Auth { .. }
        ));
    }
}
