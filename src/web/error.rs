//! Web Error Types
//!
//! Error types for the HTTP layer and their conversion to HTML error
//! pages with appropriate status codes.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use super::views::error_page;

/// HTTP layer errors
#[derive(Error, Debug)]
pub enum WebError {
    /// Malformed request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Route exists but is not available
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            WebError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            WebError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            WebError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            WebError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        let request_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            request_id = %request_id,
            error_code = %code,
            error_message = %self,
            "Request failed"
        );

        // Internal details stay in the log
        let message = match &self {
            WebError::BadRequest(_) | WebError::NotFound(_) => self.to_string(),
            WebError::Internal(_) | WebError::Io(_) => "Something went wrong.".to_string(),
        };

        let page = error_page(&status.to_string(), message, request_id);
        (status, Html(page)).into_response()
    }
}

/// Result type for handlers
pub type WebResult<T> = Result<T, WebError>;
