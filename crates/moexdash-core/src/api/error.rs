use serde_json::Value;
use thiserror::Error;

/// Uniform error value for every call that goes through the dispatcher.
///
/// Clone is required because a refresh outcome is shared between every
/// caller waiting on the same refresh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Server not responding, try later")]
    Unreachable,

    #[error("Error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Session expired - please log in again")]
    AuthExpired,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl RequestError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Build a `Server` error from an error status and its raw body.
    ///
    /// The message prefers a `message` field, then FastAPI's `detail`
    /// field, and falls back to a generic text.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|json| Self::server_message(&json))
            .unwrap_or_else(|| Self::generic_message(status, body));
        RequestError::Server { status, message }
    }

    fn server_message(json: &Value) -> Option<String> {
        ["message", "detail"].iter().find_map(|field| {
            json.get(field)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        })
    }

    fn generic_message(status: u16, body: &str) -> String {
        match status {
            500..=599 => "Internal server error".to_string(),
            _ if body.trim().is_empty() => format!("Request failed with status {}", status),
            _ => format!("Request failed with status {}: {}", status, Self::truncate_body(body)),
        }
    }

    /// HTTP status for server errors
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message suitable for showing next to a form or panel.
    pub fn user_message(&self) -> String {
        match self {
            RequestError::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
