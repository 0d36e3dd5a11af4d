//! Webhook-layer error taxonomy (spec §7) and its HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors the Trigger Registry & Webhook Router can produce.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No registered webhook trigger matched the request path.
    #[error("no webhook registered for this path")]
    NotFound,

    /// A trigger matched the path but not the HTTP method.
    #[error("method not allowed, expected {expected}")]
    MethodNotAllowed {
        /// The method the matched trigger actually accepts.
        expected: String,
    },

    /// Authentication failed (basic/header/query/credential mismatch).
    #[error("authentication failed")]
    Unauthorized,

    /// CORS origin, IP allowlist, or bot filter rejected the request.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The workflow owning the matched trigger is not active.
    #[error("workflow is not active")]
    NotActive,

    /// `last-node` response mode waited past its deadline for a result.
    #[error("timed out waiting for a response")]
    GatewayTimeout,

    /// The trigger manager rejected the request outright (admission control).
    #[error("trigger rejected: {0}")]
    Rejected(String),

    /// A collaborator (dispatcher, credential resolver) failed unexpectedly.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            Self::MethodNotAllowed { .. } => (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed"),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Self::NotActive => (StatusCode::NOT_FOUND, "not_active"),
            Self::GatewayTimeout => (StatusCode::GATEWAY_TIMEOUT, "gateway_timeout"),
            Self::Rejected(_) => (StatusCode::TOO_MANY_REQUESTS, "rejected"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let mut body = serde_json::json!({
            "error": { "code": code, "message": self.to_string() }
        });
        if let Self::MethodNotAllowed { expected } = &self {
            body["error"]["allowed"] = serde_json::json!(expected);
        }

        (status, Json(body)).into_response()
    }
}
