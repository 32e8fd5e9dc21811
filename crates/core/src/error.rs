use std::fmt;

use thiserror::Error;

/// Closed set of failure categories an Ollama call can end in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConnectionFailed,
    Timeout,
    ModelNotFound,
    InvalidRequest,
    ServerError,
    ParseError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ConnectionFailed => "connection failed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ModelNotFound => "model not found",
            ErrorKind::InvalidRequest => "invalid request",
            ErrorKind::ServerError => "server error",
            ErrorKind::ParseError => "parse error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure.
///
/// `detail` is meant for people and is what `Display` prints. `cause` keeps
/// the underlying transport or decode message for logs.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{detail}")]
pub struct OllamaError {
    pub kind: ErrorKind,
    pub detail: String,
    pub cause: Option<String>,
}

impl OllamaError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn connection_failed() -> Self {
        Self::new(
            ErrorKind::ConnectionFailed,
            "Cannot connect to Ollama. Please ensure Ollama is running.",
        )
    }

    /// The server went away after the response had started.
    pub fn connection_lost() -> Self {
        Self::new(
            ErrorKind::ConnectionFailed,
            "Connection to Ollama was lost while receiving the response.",
        )
    }

    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, "Request timed out. Ollama may be busy.")
    }

    pub fn model_not_found(model: &str) -> Self {
        Self::new(
            ErrorKind::ModelNotFound,
            format!("Model '{model}' not found. Please select a different model."),
        )
    }

    pub fn invalid_request() -> Self {
        Self::new(ErrorKind::InvalidRequest, "Invalid request format.")
    }

    pub fn server_error() -> Self {
        Self::new(ErrorKind::ServerError, "Ollama server error. Please try again.")
    }

    /// Fallback for anything the classifier has no better bucket for.
    pub fn unexpected(message: impl fmt::Display) -> Self {
        let message = message.to_string();
        Self::new(
            ErrorKind::ServerError,
            format!("Unexpected error occurred: {message}"),
        )
        .with_cause(message)
    }

    pub fn parse(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, detail)
    }
}
