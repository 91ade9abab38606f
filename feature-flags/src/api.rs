use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tag carried by every error body rendered from [`FlipError`].
pub const ERROR_SOURCE: &str = "fflip";

/// Acknowledgement returned by the manual override route.
#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ManualActionResult {
    pub feature: String,
    pub action: String,
    pub status: u16,
    pub message: String,
}

/// Body rendered for a [`FlipError`], so host error handlers can recognise our failures.
#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FlipErrorResponse {
    pub source: String,
    pub code: String,
    pub status: u16,
    pub message: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FlipError {
    #[error("FFlip: Feature {0} not found")]
    FeatureNotFound(String),
    #[error("FFlip: Cookies are not enabled.")]
    CookiesUnavailable,
    #[error("FFlip: Bad Input. Action ({0}) must be 1 (enable), 0 (disable), or -1 (remove)")]
    BadInput(String),
    #[error("FFlip: Features were queried before a user was set for this request")]
    UserNotSet,
    #[error("FFlip: Feature context missing, is the middleware installed?")]
    ContextMissing,
    #[error("FFlip: Failed to render view: {0}")]
    Render(String),
}

impl FlipError {
    fn error_metadata(&self) -> (&'static str, StatusCode) {
        match self {
            FlipError::FeatureNotFound(_) => ("not_found", StatusCode::NOT_FOUND),
            FlipError::CookiesUnavailable => {
                ("cookies_unavailable", StatusCode::INTERNAL_SERVER_ERROR)
            }
            FlipError::BadInput(_) => ("bad_input", StatusCode::BAD_REQUEST),
            FlipError::UserNotSet => ("user_not_set", StatusCode::INTERNAL_SERVER_ERROR),
            FlipError::ContextMissing => ("context_missing", StatusCode::INTERNAL_SERVER_ERROR),
            FlipError::Render(_) => ("render_error", StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Returns a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        self.error_metadata().0
    }

    pub fn status_code(&self) -> u16 {
        self.error_metadata().1.as_u16()
    }
}

impl IntoResponse for FlipError {
    fn into_response(self) -> Response {
        let (code, status) = self.error_metadata();
        if status.is_server_error() {
            tracing::error!(code, "{}", self);
        } else {
            tracing::warn!(code, "{}", self);
        }

        let body = FlipErrorResponse {
            source: ERROR_SOURCE.to_string(),
            code: code.to_string(),
            status: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
