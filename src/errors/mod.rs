//! Error handling module for the revision client core.
//!
//! `BackendError` describes what went wrong on the wire; `ClientError` is what the view layer
//! sees, classified by the stage that failed.

use reqwest::StatusCode;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const FETCH_FAILED: &str = "FETCH_FAILED";
    pub const MUTATION_FAILED: &str = "MUTATION_FAILED";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
}

/// Failure reported by a backend collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Missing or expired access token
    Unauthorized(String),
    /// Resource not found
    NotFound(String),
    /// Any other non-success response
    Status { status: u16, message: String },
    /// Connection, timeout or protocol failure before a response arrived
    Transport(String),
    /// Response body did not match the expected shape
    Decode(String),
}

impl BackendError {
    /// Map a non-success HTTP status and its body to an error.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        } else {
            body.trim().to_string()
        };

        match status {
            StatusCode::UNAUTHORIZED => BackendError::Unauthorized(message),
            StatusCode::NOT_FOUND => BackendError::NotFound(message),
            _ => BackendError::Status {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            BackendError::Unauthorized(msg) => msg.clone(),
            BackendError::NotFound(msg) => msg.clone(),
            BackendError::Status { status, message } => format!("HTTP {}: {}", status, message),
            BackendError::Transport(msg) => msg.clone(),
            BackendError::Decode(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Unauthorized(msg) => write!(f, "unauthorized: {}", msg),
            BackendError::NotFound(msg) => write!(f, "not found: {}", msg),
            BackendError::Status { status, message } => write!(f, "HTTP {}: {}", status, message),
            BackendError::Transport(msg) => write!(f, "transport error: {}", msg),
            BackendError::Decode(msg) => write!(f, "decode error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        tracing::debug!("HTTP client error: {:?}", err);
        if err.is_decode() {
            return BackendError::Decode(format!("Response decode error: {}", err));
        }
        match err.status() {
            Some(status) => BackendError::from_status(status, &err.to_string()),
            None => BackendError::Transport(format!("Request failed: {}", err)),
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        tracing::debug!("JSON error: {:?}", err);
        BackendError::Decode(format!("JSON error: {}", err))
    }
}

/// Client error surfaced to the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// A list or statistics load failed; stale data is kept
    FetchFailed(String),
    /// Complete/postpone/create/delete was rejected or never reached the backend
    MutationFailed(String),
    /// A precondition failed before any backend call was attempted
    ValidationFailed(String),
}

impl ClientError {
    pub fn fetch(err: &BackendError) -> Self {
        ClientError::FetchFailed(err.message())
    }

    pub fn mutation(err: &BackendError) -> Self {
        ClientError::MutationFailed(err.message())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ClientError::ValidationFailed(msg.into())
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::FetchFailed(_) => codes::FETCH_FAILED,
            ClientError::MutationFailed(_) => codes::MUTATION_FAILED,
            ClientError::ValidationFailed(_) => codes::VALIDATION_FAILED,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            ClientError::FetchFailed(msg) => msg.clone(),
            ClientError::MutationFailed(msg) => msg.clone(),
            ClientError::ValidationFailed(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for ClientError {}
