use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use relay_core::Turn;

/// A failed call, reduced to what callers need: a status-like code and a
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub code: u16,
    pub message: String,
}

impl Failure {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::new(408, "Request timed out")
    }

    /// The single line shown to the user when their message could not be answered.
    pub fn user_message(&self) -> String {
        format!("Error: {}", self.message)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Outcome of a completion call. Failures are values, never panics or errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionResult {
    Success { reply: String },
    Failure(Failure),
}

/// Outcome of a model listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelListResult {
    Success { models: Vec<ModelInfo> },
    Failure(Failure),
}

/// One entry of the remote model catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A remote completion service.
///
/// Implementations absorb every failure class into the returned value; the
/// pipeline only ever branches on `Success` / `Failure`.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Ask `model` to continue `history` with the pending user message.
    ///
    /// `pending` is not part of `history`; it is appended to the request only.
    async fn complete(&self, history: &[Turn], pending: &str, model: &str) -> CompletionResult;

    /// Fetch the catalogue of models the service offers.
    async fn list_models(&self) -> ModelListResult;
}

/// Everything that can go wrong talking to the completion service.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// The call exceeded its time budget.
    #[error("Request timed out")]
    Timeout,

    /// Connection, DNS, TLS or body-read failure.
    #[error("Request failed: {0}")]
    Transport(reqwest::Error),

    /// The service answered with an error status or error envelope.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The transport succeeded but the body was not the expected shape.
    #[error("Unexpected response: {0}")]
    Protocol(String),
}

impl CompletionError {
    pub fn code(&self) -> u16 {
        match self {
            CompletionError::Timeout => 408,
            CompletionError::Transport(_) => 500,
            CompletionError::Api { status, .. } => *status,
            CompletionError::Protocol(_) => 500,
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CompletionError::Timeout
        } else {
            CompletionError::Transport(e)
        }
    }
}

impl From<CompletionError> for Failure {
    fn from(e: CompletionError) -> Self {
        match e {
            CompletionError::Timeout => Failure::timeout(),
            CompletionError::Api { status, message } => Failure::new(status, message),
            other => Failure::new(other.code(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_folds_to_408() {
        let failure = Failure::from(CompletionError::Timeout);
        assert_eq!(failure, Failure::new(408, "Request timed out"));
        assert_eq!(failure.user_message(), "Error: Request timed out");
    }

    #[test]
    fn api_error_keeps_status_and_message() {
        let failure = Failure::from(CompletionError::Api {
            status: 429,
            message: "Rate limit exceeded".to_string(),
        });
        assert_eq!(failure.code, 429);
        assert_eq!(failure.message, "Rate limit exceeded");
    }

    #[test]
    fn protocol_error_is_500_with_diagnostic() {
        let failure = Failure::from(CompletionError::Protocol("missing choices".to_string()));
        assert_eq!(failure.code, 500);
        assert!(failure.message.contains("missing choices"));
    }
}
