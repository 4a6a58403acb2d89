//! Request-path error type.
//!
//! Anything that escapes the adapter before response headers are written
//! ends up here and is rendered as `500 {"message": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Errors raised while turning an HTTP request into a GraphQL execution.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The request body could not be read.
    #[error("Failed to read request body: {0}")]
    Body(String),

    /// The query string could not be decoded.
    #[error("Invalid query string: {0}")]
    InvalidQueryString(String),

    /// The request body was not valid JSON.
    #[error("POST body sent invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The `variables` parameter was present but not a JSON object.
    #[error("Variables are invalid JSON.")]
    InvalidVariables,

    /// The user supplied context builder failed.
    #[error("Context building failed: {0}")]
    Context(String),

    /// A result could not be serialized to JSON.
    #[error("Failed to serialize response: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The execution pipeline failed outside of GraphQL error reporting.
    #[error("{0}")]
    Execution(String),
}

impl AdapterError {
    /// Shorthand for context builder failures.
    pub fn context(message: impl Into<String>) -> Self {
        Self::Context(message.into())
    }
}

impl IntoResponse for AdapterError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Request failed before response was sent");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "message": self.to_string() })),
        )
            .into_response()
    }
}
