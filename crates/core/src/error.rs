//! Error types for the Callscope domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Callscope operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Upstream API errors ---
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from the wrapped upstream API.
///
/// This is the only error class a caller of the instrumented client ever
/// observes — the telemetry path absorbs its own failures.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ApiError {
    /// Stable snake_case tag identifying the error variant.
    ///
    /// Recorded as the `error_kind` field of telemetry events, so the tags
    /// are part of the collector wire format and must not change casually.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Api { .. } => "api_error",
            Self::RateLimited { .. } => "rate_limited",
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::Timeout(_) => "timeout",
            Self::Network(_) => "network",
        }
    }
}
