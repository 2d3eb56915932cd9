//! Error types for Mail Assist.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The provider cannot be constructed — missing credential or config.
    /// Raised at construction time, never deferred to the call.
    #[error("Provider {provider} is unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    /// The upstream call itself failed.
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Errors surfaced at the HTTP boundary.
///
/// `Validation` is rejected before any backend is selected. Provider errors
/// pass through from the one-shot path; the streaming path absorbs
/// `RequestFailed` internally (degraded token fallback) so only
/// `Unavailable` ever reaches the client there.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request body: {0}")]
    Validation(String),

    #[error(transparent)]
    Llm(#[from] LlmError),
}
