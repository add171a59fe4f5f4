//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Fatal
//! variants abort startup; transport variants reject a request before any
//! context is built; per-operation variants surface to a single caller.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All transport-level rejections follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4031,
///     "message": "origin not allowed: https://evil.example"
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category                 | HTTP Status        |
/// |-----------|--------------------------|--------------------|
/// | 1000–1999 | Fatal startup            | 500                |
/// | 2000–2999 | Per-operation            | 401 / 404 / 500    |
/// | 3000–3999 | Upstream / internal      | 500 / 502          |
/// | 4000–4999 | Transport rejection      | 400 / 403 / 413 / 503 |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The executable schema failed to compile.
    #[error("schema compilation failed: {0}")]
    SchemaCompilation(String),

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the gateway tried to bind.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Request body was not a valid GraphQL request.
    #[error("invalid GraphQL request: {0}")]
    InvalidRequest(String),

    /// Request body exceeded the configured size limit.
    #[error("request body too large")]
    PayloadTooLarge,

    /// Request came from an origin outside the allow-list.
    #[error("origin not allowed: {0}")]
    OriginRejected(String),

    /// Request could have been sent cross-site without a CORS preflight.
    #[error(
        "this operation has been blocked as a potential cross-site request forgery; \
         send a non-simple Content-Type or an `apollo-require-preflight` header"
    )]
    CsrfRejected,

    /// The gateway is draining and accepts no new connections.
    #[error("server is shutting down")]
    ShuttingDown,

    /// Operation requires an authenticated session.
    #[error("Not authorized")]
    Unauthorized,

    /// User record does not exist.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Authentication provider failure.
    #[error("auth provider error: {0}")]
    AuthProvider(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidConfig(_) => 1001,
            Self::SchemaCompilation(_) => 1002,
            Self::Bind { .. } => 1003,
            Self::Unauthorized => 2001,
            Self::UserNotFound(_) => 2002,
            Self::Persistence(_) => 2003,
            Self::Internal(_) => 3000,
            Self::AuthProvider(_) => 3001,
            Self::CsrfRejected => 4001,
            Self::InvalidRequest(_) => 4002,
            Self::PayloadTooLarge => 4131,
            Self::OriginRejected(_) => 4031,
            Self::ShuttingDown => 4503,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::CsrfRejected | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::OriginRejected(_) => StatusCode::FORBIDDEN,
            Self::UserNotFound(_) => StatusCode::NOT_FOUND,
            Self::AuthProvider(_) => StatusCode::BAD_GATEWAY,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidConfig(_)
            | Self::SchemaCompilation(_)
            | Self::Bind { .. }
            | Self::Persistence(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` for errors that must abort startup.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_) | Self::SchemaCompilation(_) | Self::Bind { .. }
        )
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
