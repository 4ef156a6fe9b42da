//! Error types for the chat gateway

use std::io;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::TokenError;
use crate::completion::CompletionError;

/// Result type alias for the chat gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Chat gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bearer token missing or rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] TokenError),

    /// Request body is empty or malformed
    #[error("Bad input: {0}")]
    BadInput(String),

    /// Completion API failure
    #[error("Upstream error: {0}")]
    Upstream(#[from] CompletionError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status this error surfaces as at the endpoint boundary
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadInput(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(CompletionError::RateLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to a client.
    ///
    /// Never includes upstream bodies, secrets or internal error text.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthorized(e) => e.public_message().to_string(),
            Self::BadInput(msg) => msg.clone(),
            Self::Upstream(CompletionError::RateLimited { .. }) => {
                "Completion API rate limit exceeded. Please try again later.".to_string()
            }
            Self::Upstream(CompletionError::Authentication) => {
                "Completion API authentication failed. Check the API key.".to_string()
            }
            Self::Upstream(_) => "Error communicating with the completion service".to_string(),
            Self::Config(_) | Self::Io(_) | Self::Http(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let mut response = (status, Json(json!({ "detail": self.public_message() }))).into_response();

        match &self {
            Self::Unauthorized(_) => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            Self::Upstream(CompletionError::RateLimited {
                retry_after: Some(secs),
            }) => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*secs));
            }
            _ => {}
        }

        response
    }
}
