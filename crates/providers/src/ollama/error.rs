//! Maps transport failures and early HTTP statuses onto [`ErrorKind`]s.
//!
//! [`ErrorKind`]: olama_core::ErrorKind

use olama_core::OllamaError;
use reqwest::StatusCode;

pub fn map_reqwest_err(e: reqwest::Error) -> OllamaError {
    if e.is_timeout() {
        OllamaError::timeout().with_cause(e)
    } else if e.is_connect() {
        OllamaError::connection_failed().with_cause(e)
    } else {
        OllamaError::unexpected(e)
    }
}

/// Failures while reading a body that already started arriving. reqwest
/// reports these as decode errors even though nothing was parsed yet.
pub fn map_body_err(e: reqwest::Error) -> OllamaError {
    if e.is_timeout() {
        OllamaError::timeout().with_cause(e)
    } else {
        OllamaError::connection_lost().with_cause(e)
    }
}

/// Classifies a non-success status on `/api/chat` before any streaming.
pub fn map_status_err(status: StatusCode, model: &str, body: Option<String>) -> OllamaError {
    let err = match status {
        StatusCode::NOT_FOUND => OllamaError::model_not_found(model),
        StatusCode::BAD_REQUEST => OllamaError::invalid_request(),
        s if s.is_server_error() => OllamaError::server_error(),
        s => OllamaError::unexpected(format!("HTTP {}", s.as_u16())),
    };
    match body.filter(|b| !b.trim().is_empty()) {
        Some(b) => err.with_cause(format!("{} {}", status.as_u16(), b.trim())),
        None => err,
    }
}
