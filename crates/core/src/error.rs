//! Error types for the MedIntake domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all MedIntake operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Turn history errors ---
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    // --- Preprocessing errors ---
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    // --- Report rendering errors ---
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

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

// --- Bounded context errors ---

/// Transport-level failures talking to a model endpoint.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool not available in this mode: {0}")]
    NotPermitted(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool call rejected by validation: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted history for session {session_id}: {reason}")]
    Corrupted { session_id: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum MediaError {
    #[error("Unsupported media type: {0}")]
    Unsupported(String),

    #[error("Media engine unavailable: {0}")]
    Unavailable(String),

    #[error("Media processing failed: {0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(String),
}

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Failed to write report artifact: {0}")]
    Io(String),

    #[error("Failed to encode report: {0}")]
    Encoding(String),
}

impl From<ProviderError> for MediaError {
    fn from(err: ProviderError) -> Self {
        MediaError::Failed(err.to_string())
    }
}
