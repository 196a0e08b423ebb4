use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// API-surface errors; each variant maps to one HTTP status.
///
/// `BadRequest` renders its message verbatim because clients match on the
/// exact body text.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("External dependency error: {0}")]
    External(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::External(message.into())
    }
}

impl From<notebook_core::Error> for AppError {
    fn from(error: notebook_core::Error) -> Self {
        use notebook_core::Error;
        match error {
            Error::InvalidInput(message) => Self::BadRequest(message),
            Error::NotFound(what) => Self::NotFound(what),
            Error::Http(error) => Self::External(error.to_string()),
            Error::Api(message) | Error::Storage(message) => Self::External(message),
            Error::InvalidConfiguration(message) => Self::Config(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::External(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_message_is_verbatim() {
        let error = AppError::bad_request("Title and content are required.");
        assert_eq!(error.to_string(), "Title and content are required.");
    }

    #[test]
    fn core_invalid_input_maps_to_bad_request() {
        let core = notebook_core::Error::InvalidInput("Title and content are required.".to_string());
        let app: AppError = core.into();
        assert!(matches!(app, AppError::BadRequest(_)));
        assert_eq!(app.to_string(), "Title and content are required.");
    }
}
