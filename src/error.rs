//! Error types for semantic-router-llm

use thiserror::Error;

/// Result type alias using [`LlmError`]
pub type Result<T> = std::result::Result<T, LlmError>;

/// Main error type for the LLM adapter
#[derive(Debug, Error)]
pub enum LlmError {
    /// Missing API key, failed client construction, or uninitialized client
    #[error("{0}")]
    Configuration(String),

    /// The model answered, but not in the shape that was asked for
    #[error("{0}")]
    Output(String),

    /// Schema extraction was given something that is not a function
    #[error("{0}")]
    NotCallable(String),

    /// Non-success HTTP status from the completion endpoint
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API key that cannot be sent as a header
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl LlmError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn output(message: impl Into<String>) -> Self {
        Self::Output(message.into())
    }

    /// Whether this is a configuration error
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Whether this is an output error
    #[must_use]
    pub const fn is_output(&self) -> bool {
        matches!(self, Self::Output(_))
    }
}
