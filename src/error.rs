use thiserror::Error;

/// Aggregates every failure mode exposed by the providers and the registry.
///
/// Callers match on the variant to decide how to render the failure: a missing key and a
/// rejected key both point the user at `q keys set`, a cancellation is silent, and the
/// remaining variants are shown verbatim.
#[derive(Debug, Error)]
pub enum LLMError {
    /// No API key is configured for the provider. Raised before any network call.
    #[error("no API key set for {provider}; use 'q keys set --provider {provider} --key KEY'")]
    MissingCredential { provider: &'static str },
    /// The configuration file could not be read, parsed or written.
    #[error("config error: {message}")]
    Config { message: String },
    /// Represents transport-layer or networking failures.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The vendor rejected the configured credential.
    #[error(
        "invalid API key for {provider}. Set your key with:\n  q keys set --provider {provider} --key YOUR_API_KEY"
    )]
    Auth { provider: &'static str },
    /// Well-formed vendor error payload for any other cause (rate limit, bad model, policy).
    #[error("{provider} API error: {message}")]
    Api {
        /// Name of the provider, such as `openai`.
        provider: &'static str,
        /// HTTP status of the failed call, absent for errors reported mid-stream.
        status: Option<u16>,
        /// Message passed through from the vendor.
        message: String,
    },
    /// The response body could not be decoded into the expected shape.
    #[error("{provider}: malformed response: {message}")]
    MalformedResponse {
        provider: &'static str,
        message: String,
    },
    /// The vendor answered with a well-formed payload that carries no text.
    #[error("{provider}: empty response")]
    EmptyResponse { provider: &'static str },
    /// The caller cancelled the request. `partial` holds the text streamed so far.
    #[error("request cancelled")]
    Cancelled { partial: String },
    /// Signals invalid input such as a malformed `provider/model` identifier.
    #[error("{message}")]
    Validation { message: String },
    /// Writing a streamed delta to the output sink failed.
    #[error("output error: {message}")]
    Output { message: String },
}

impl LLMError {
    /// Creates an [`LLMError::Transport`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use q::error::LLMError;
    ///
    /// let err = LLMError::transport("dns lookup failed");
    /// assert!(matches!(err, LLMError::Transport { .. }));
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an [`LLMError::MalformedResponse`] for the given provider.
    pub fn malformed<T: Into<String>>(provider: &'static str, message: T) -> Self {
        Self::MalformedResponse {
            provider,
            message: message.into(),
        }
    }

    /// Creates an [`LLMError::Validation`] from a textual description.
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns `true` for the two credential problems: missing key or rejected key.
    ///
    /// # Examples
    ///
    /// ```
    /// use q::error::LLMError;
    ///
    /// assert!(LLMError::MissingCredential { provider: "openai" }.is_credential_error());
    /// assert!(LLMError::Auth { provider: "openai" }.is_credential_error());
    /// assert!(!LLMError::transport("reset").is_credential_error());
    /// ```
    pub fn is_credential_error(&self) -> bool {
        matches!(self, Self::MissingCredential { .. } | Self::Auth { .. })
    }

    /// Returns `true` when the caller aborted the request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_message_names_the_fix() {
        let err = LLMError::MissingCredential { provider: "openai" };
        assert_eq!(
            err.to_string(),
            "no API key set for openai; use 'q keys set --provider openai --key KEY'"
        );
    }

    #[test]
    fn auth_message_is_actionable() {
        let message = LLMError::Auth {
            provider: "anthropic",
        }
        .to_string();
        assert!(message.starts_with("invalid API key for anthropic"));
        assert!(message.contains("q keys set --provider anthropic"));
    }

    #[test]
    fn cancellation_is_its_own_kind() {
        let err = LLMError::Cancelled {
            partial: "hel".to_string(),
        };
        assert!(err.is_cancelled());
        assert!(!LLMError::transport("operation timed out").is_cancelled());
    }
}
