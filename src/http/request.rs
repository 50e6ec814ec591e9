//! Request handling and transformation.
//!
//! # Responsibilities
//! - Read the correlation id set by the request-id layer
//! - Enforce the body size limit while buffering
//! - Parse query and JSON body into an [`InboundRequest`]
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - An empty body is "no body", not an error
//! - Malformed JSON is rejected before any upstream is contacted

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, Request},
};
use url::Url;

use crate::http::response::GatewayError;
use crate::resilience::forwarder::InboundRequest;
use crate::security::auth::AuthContext;

/// Correlation header shared by the gateway and every upstream.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id of a request, or `"unknown"` when the header is absent.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Buffer and decode an inbound request for forwarding to `target_url`.
///
/// `auth` is `Some` only when the matched route required authentication
/// and the token verified.
pub async fn extract(
    request: Request<Body>,
    target_url: Url,
    auth: Option<AuthContext>,
    max_body_bytes: usize,
) -> Result<InboundRequest, GatewayError> {
    let (parts, body) = request.into_parts();

    let query = parts
        .uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let bytes = axum::body::to_bytes(body, max_body_bytes)
        .await
        .map_err(|_| GatewayError::InvalidBody)?;
    let body = if bytes.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(serde_json::from_slice(&bytes).map_err(|_| GatewayError::InvalidBody)?)
    };

    let correlation_id = request_id(&parts.headers);
    let (authenticated, bearer_token) = match auth {
        Some(ctx) => (true, Some(ctx.bearer_token)),
        None => (false, None),
    };

    Ok(InboundRequest {
        method: parts.method,
        target_url,
        headers: parts.headers,
        query,
        body,
        correlation_id,
        authenticated,
        bearer_token,
    })
}
