//! OAuth2 error types.

use crate::types::ErrorBody;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type OAuth2Result<T> = Result<T, OAuth2Error>;

/// Failures of the low-level OAuth2 client.
#[derive(Debug, Error)]
pub enum OAuth2Error {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Random source failure: {0}")]
    RandomError(#[from] rand::Error),
}

/// Which side of the flow an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, malformed or mismatched handshake or request data.
    Validation,
    /// The provider could not be reached or returned unusable data.
    Upstream,
    /// Random generation, signing or context failures on our side.
    Internal,
    /// Raised by a caller-supplied post-processing hook.
    Hook,
}

pub type FlowResult<T> = Result<T, FlowError>;

/// Terminal error of a login, callback or logout request.
///
/// `status` and `message` are sent to the client, `source` is only logged.
#[derive(Debug, Error)]
#[error("[{status}] {message}")]
pub struct FlowError {
    pub status: u16,
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: Option<BoxError>,
}

impl FlowError {
    pub fn new(status: u16, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, ErrorKind::Validation, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, ErrorKind::Validation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, ErrorKind::Internal, message)
    }

    /// Provider resource unreachable.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(503, ErrorKind::Upstream, message)
    }

    /// Provider resource reachable but its payload is unusable.
    pub fn bad_payload(message: impl Into<String>) -> Self {
        Self::new(500, ErrorKind::Upstream, message)
    }

    pub fn hook(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, ErrorKind::Hook, message)
    }

    /// Converts an error raised by a hook, keeping the status of a `FlowError`.
    pub fn from_hook(err: BoxError) -> Self {
        match err.downcast::<FlowError>() {
            Ok(flow) => *flow,
            Err(other) => Self::hook(500, other.to_string()).with_source(other),
        }
    }
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        match &self.source {
            Some(source) => error!(status = self.status, "{}: {}", self.message, source),
            None => error!(status = self.status, "{}", self.message),
        }

        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            code: status.as_u16(),
            message: self.message,
        };
        (status, Json(body)).into_response()
    }
}
