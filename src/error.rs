//! Error handling for the ANPR simulator
//!
//! Transport-level failures only. Business-rule violations (plate not
//! found, configuration forbidden, no current recognition) are not
//! errors here: they travel back as `{"answer":{"@status":"failed"}}`
//! protocol answers with HTTP 200.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown or malformed message shape
    #[error("Validation error: {0}")]
    Validation(String),

    /// Message only valid on the streaming transport
    #[error("Operation not allowed over HTTP: {0}")]
    ForbiddenTransport(String),

    /// Lock required but not held, or bad lock password
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Config persistence error
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            Error::ForbiddenTransport(msg) => (
                StatusCode::BAD_REQUEST,
                "FORBIDDEN_TRANSPORT",
                msg.clone(),
            ),
            Error::Authorization(msg) => (StatusCode::FORBIDDEN, "AUTHORIZATION_ERROR", msg.clone()),
            Error::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                msg.clone(),
            ),
            Error::Serialization(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERIALIZATION_ERROR",
                e.to_string(),
            ),
            Error::Io(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                e.to_string(),
            ),
            Error::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        // Keep the single-key answer shape even for transport errors so
        // existing clients can always parse the body.
        let body = Json(json!({
            "answer": {
                "@status": "failed",
                "@errorText": message
            }
        }));

        (status, body).into_response()
    }
}
