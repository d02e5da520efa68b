use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateApiError {
    #[error("invalid host URL: {0}")]
    InvalidHost(String),
    #[error("invalid request payload: {0}")]
    InvalidRequestPayload(String),
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {} {}", .0.as_u16(), .1)]
    Status(StatusCode, String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("retry exhausted after max attempts (status: {}, last_error: {last_error:?})", display_status(.status))]
    RetryExhausted {
        status: Option<StatusCode>,
        last_error: Option<String>,
    },
    #[error("stream failed: {message}")]
    StreamFailed { message: String },
    #[error("request was cancelled")]
    Cancelled,
    #[error("runtime failure: {0}")]
    Runtime(String),
}

impl GenerateApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status attached to the failure, when one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(status, _) => Some(*status),
            Self::RetryExhausted { status, .. } => *status,
            Self::Request(error) => error.status(),
            _ => None,
        }
    }
}

fn display_status(status: &Option<StatusCode>) -> String {
    status
        .map(|status| status.as_u16().to_string())
        .unwrap_or_else(|| "n/a".to_owned())
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<String>,
}

/// Extract a readable message from a non-success response body.
///
/// The generation service reports failures as `{"error": "..."}`; any other
/// body is returned verbatim, and an empty body falls back to the status
/// reason phrase.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(ErrorPayload { error: Some(message) }) = serde_json::from_str::<ErrorPayload>(body) {
        let message = message.trim();
        if !message.is_empty() {
            return message.to_owned();
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
