//! Bounded-time upstream invocation.
//!
//! # Responsibilities
//! - Issue one HTTP call per [`ForwardRequest`]
//! - Enforce the per-call deadline (head and body read together)
//! - Classify the result into exactly one [`ForwardOutcome`]

use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::resilience::timeouts::with_deadline;
use crate::resilience::window::CallVerdict;

/// Fully composed outbound request.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    /// Target URL, query string included.
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

/// What the upstream answered.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// Result of a single upstream call.
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardOutcome {
    /// 2xx response.
    Success(UpstreamResponse),
    /// Any non-2xx response.
    UpstreamError(UpstreamResponse),
    /// Unreachable upstream: DNS, refused connection, reset mid-body.
    ConnectionFailure { reason: String },
    /// The deadline passed before a full response arrived.
    Timeout,
    /// The upstream answered, but its body is over the relay limit.
    ResponseTooLarge { status: StatusCode, limit: usize },
}

impl ForwardOutcome {
    /// Sort a received response by its status.
    pub fn from_response(response: UpstreamResponse) -> Self {
        if response.status.is_success() {
            ForwardOutcome::Success(response)
        } else {
            ForwardOutcome::UpstreamError(response)
        }
    }

    /// Breaker classification: only unavailability counts as failure.
    ///
    /// Every status below 500 is a success here, including 4xx; those are
    /// client-input errors, not signs of a sick upstream.
    pub fn verdict(&self) -> CallVerdict {
        match self {
            ForwardOutcome::Success(_) => CallVerdict::Success,
            ForwardOutcome::UpstreamError(r) if r.status.as_u16() < 500 => CallVerdict::Success,
            ForwardOutcome::ResponseTooLarge { status, .. } if status.as_u16() < 500 => {
                CallVerdict::Success
            }
            ForwardOutcome::UpstreamError(_)
            | ForwardOutcome::ResponseTooLarge { .. }
            | ForwardOutcome::ConnectionFailure { .. }
            | ForwardOutcome::Timeout => CallVerdict::Failure,
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardOutcome::Success(_) => "success",
            ForwardOutcome::UpstreamError(_) => "upstream_error",
            ForwardOutcome::ConnectionFailure { .. } => "connection_failure",
            ForwardOutcome::Timeout => "timeout",
            ForwardOutcome::ResponseTooLarge { .. } => "response_too_large",
        }
    }
}

/// Performs upstream calls. Substitutable for tests.
#[async_trait]
pub trait CallExecutor: Send + Sync {
    async fn execute(&self, request: ForwardRequest, timeout: Duration) -> ForwardOutcome;
}

#[derive(Debug, thiserror::Error)]
enum ExecutorError {
    #[error("failed to encode body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to build request: {0}")]
    Build(#[from] axum::http::Error),

    #[error("request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("{status} response body exceeds {limit} bytes")]
    TooLarge { status: StatusCode, limit: usize },
}

/// [`CallExecutor`] over one shared, pooled hyper client.
#[derive(Clone)]
pub struct HttpExecutor {
    client: Client<HttpConnector, Body>,
    max_response_bytes: usize,
}

impl HttpExecutor {
    /// Plain-HTTP client; bodies above `max_response_bytes` are not relayed.
    pub fn new(max_response_bytes: usize) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self::with_client(client, max_response_bytes)
    }

    pub fn with_client(client: Client<HttpConnector, Body>, max_response_bytes: usize) -> Self {
        Self {
            client,
            max_response_bytes,
        }
    }

    async fn call(&self, request: ForwardRequest) -> Result<UpstreamResponse, ExecutorError> {
        let body = match &request.body {
            Some(value) => Body::from(serde_json::to_vec(value)?),
            None => Body::empty(),
        };

        let mut builder = Request::builder()
            .method(request.method)
            .uri(request.url.as_str());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(request.headers);
        }
        let outbound = builder.body(body)?;

        let response: hyper::Response<hyper::body::Incoming> = self.client.request(outbound).await?;
        let (parts, body) = response.into_parts();
        let body = match Limited::new(body, self.max_response_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                return Err(ExecutorError::TooLarge {
                    status: parts.status,
                    limit: self.max_response_bytes,
                })
            }
            Err(e) => return Err(ExecutorError::Body(e)),
        };

        Ok(UpstreamResponse {
            status: parts.status,
            content_type: parts.headers.get(header::CONTENT_TYPE).cloned(),
            body,
        })
    }
}

#[async_trait]
impl CallExecutor for HttpExecutor {
    async fn execute(&self, request: ForwardRequest, timeout: Duration) -> ForwardOutcome {
        match with_deadline(timeout, self.call(request)).await {
            Ok(Ok(response)) => ForwardOutcome::from_response(response),
            Ok(Err(ExecutorError::TooLarge { status, limit })) => {
                ForwardOutcome::ResponseTooLarge { status, limit }
            }
            Ok(Err(e)) => ForwardOutcome::ConnectionFailure {
                reason: e.to_string(),
            },
            Err(_) => ForwardOutcome::Timeout,
        }
    }
}
