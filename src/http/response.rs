//! Response handling and transformation.
//!
//! # Responsibilities
//! - Render forwarder results for the client
//! - Keep upstream payloads and statuses intact on passthrough
//! - Map logical error codes to HTTP status codes for gateway-built errors
//!
//! # Design Decisions
//! - Every failure the client sees is a JSON envelope with a stable `code`
//! - Connection-level errors are never exposed directly

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::status::StatusMapper;
use crate::resilience::executor::UpstreamResponse;
use crate::resilience::forwarder::Forwarded;

/// `{ "success": false, "error": { "code": ..., "message": ... } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    /// Fallback payload substituted for an unavailable upstream.
    pub fn service_unavailable(upstream: &str) -> Self {
        Self::new(
            "SERVICE_UNAVAILABLE",
            format!("{} service is temporarily unavailable", upstream),
        )
    }

    /// Response for an upstream whose payload the gateway will not relay.
    pub fn response_too_large(upstream: &str, limit: usize) -> Self {
        Self::new(
            "UPSTREAM_RESPONSE_TOO_LARGE",
            format!("{} response exceeds the {} byte limit", upstream, limit),
        )
    }

    pub fn code(&self) -> &str {
        &self.error.code
    }

    /// Render with the status the mapper assigns to this envelope's code.
    pub fn into_response_with(self, mapper: &StatusMapper) -> Response {
        let status = mapper.status_for(&self.error.code);
        (status, Json(self)).into_response()
    }
}

/// Errors produced by the gateway itself, before or instead of forwarding.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("Route {method} {path} not found")]
    RouteNotFound { method: Method, path: String },

    #[error("Authentication token required")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Too many requests from this IP, please try again later")]
    RateLimited,

    #[error("Request body must be valid JSON")]
    InvalidBody,

    #[error("Upstream `{0}` is not configured")]
    UnknownUpstream(String),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::RouteNotFound { .. } => "NOT_FOUND",
            GatewayError::MissingToken => "UNAUTHORIZED",
            GatewayError::InvalidToken => "INVALID_TOKEN",
            GatewayError::RateLimited => "RATE_LIMIT_EXCEEDED",
            GatewayError::InvalidBody => "VALIDATION_ERROR",
            GatewayError::UnknownUpstream(_) => "INTERNAL_ERROR",
        }
    }

    pub fn into_response_with(self, mapper: &StatusMapper) -> Response {
        ErrorEnvelope::from(self).into_response_with(mapper)
    }
}

/// Renders with the built-in status table; handlers holding configured
/// overrides use [`GatewayError::into_response_with`].
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.into_response_with(&StatusMapper::default())
    }
}

impl From<GatewayError> for ErrorEnvelope {
    fn from(err: GatewayError) -> Self {
        ErrorEnvelope::new(err.code(), err.to_string())
    }
}

/// Turn a forwarder result into the client response.
///
/// Upstream payloads keep their status and bytes, except that a 2xx body
/// which is itself a failure envelope gets the status mapped from its code.
pub fn render(forwarded: Forwarded, mapper: &StatusMapper) -> Response {
    match forwarded {
        Forwarded::Upstream(upstream) => passthrough(upstream, mapper),
        Forwarded::Fallback(envelope) => envelope.into_response_with(mapper),
    }
}

fn passthrough(upstream: UpstreamResponse, mapper: &StatusMapper) -> Response {
    let status = if upstream.status.is_success() {
        embedded_error_status(&upstream.body, mapper).unwrap_or(upstream.status)
    } else {
        upstream.status
    };

    let content_type = upstream
        .content_type
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));

    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type);
    response
}

fn embedded_error_status(body: &[u8], mapper: &StatusMapper) -> Option<StatusCode> {
    serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .filter(|envelope| !envelope.success)
        .map(|envelope| mapper.status_for(envelope.code()))
}
