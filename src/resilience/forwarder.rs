//! Request forwarding through a circuit breaker.
//!
//! # Responsibilities
//! - Gate every call on the upstream's breaker
//! - Compose the outbound request from the inbound one
//! - Report each call's outcome to the breaker exactly once
//! - Substitute the fallback envelope for unavailable upstreams

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

use crate::http::request::X_REQUEST_ID;
use crate::http::response::ErrorEnvelope;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::executor::{CallExecutor, ForwardOutcome, ForwardRequest, UpstreamResponse};

/// Inbound request as seen by the resilience layer.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub target_url: Url,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub correlation_id: String,
    pub authenticated: bool,
    pub bearer_token: Option<String>,
}

/// What the forwarder hands back to the HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Forwarded {
    /// Upstream answered; status and body are passed through.
    Upstream(UpstreamResponse),
    /// Gateway-built envelope in place of an upstream payload.
    Fallback(ErrorEnvelope),
}

impl Forwarded {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Forwarded::Fallback(_))
    }
}

/// Headers the gateway sets itself or that must not cross a hop.
fn is_managed(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "host"
            | "content-length"
            | "content-type"
            | "authorization"
            | "x-request-id"
            | "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Build the outbound request.
///
/// Read-only methods carry the query string and no body; mutating methods
/// carry the JSON body. The bearer token only travels when the inbound
/// request was authenticated.
pub fn compose(request: InboundRequest) -> ForwardRequest {
    let InboundRequest {
        method,
        target_url,
        headers: inbound_headers,
        query,
        body,
        correlation_id,
        authenticated,
        bearer_token,
    } = request;

    let mut headers = HeaderMap::new();
    for (name, value) in inbound_headers.iter() {
        if !is_managed(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

    match HeaderValue::from_str(&correlation_id) {
        Ok(value) => {
            headers.insert(X_REQUEST_ID, value);
        }
        Err(_) => tracing::warn!(request_id = %correlation_id, "Correlation id is not a valid header value"),
    }

    if authenticated {
        if let Some(token) = bearer_token {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!(request_id = %correlation_id, "Bearer token is not a valid header value"),
            }
        }
    }

    let read_only = method == Method::GET || method == Method::HEAD;
    let mut url = target_url;
    if read_only && !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }

    ForwardRequest {
        method,
        url,
        headers,
        body: if read_only { None } else { body },
    }
}

/// Drives calls to upstreams through their breakers.
#[derive(Clone)]
pub struct RequestForwarder {
    executor: Arc<dyn CallExecutor>,
}

impl RequestForwarder {
    pub fn new(executor: Arc<dyn CallExecutor>) -> Self {
        Self { executor }
    }

    pub async fn forward(&self, breaker: &CircuitBreaker, request: InboundRequest) -> Forwarded {
        let upstream = breaker.name();
        let request_id = request.correlation_id.clone();

        let permit = match breaker.attempt() {
            Ok(permit) => permit,
            Err(rejected) => {
                tracing::warn!(
                    upstream = %upstream,
                    request_id = %request_id,
                    state = %rejected.state,
                    reason = "breaker_open",
                    "Request rejected without calling upstream"
                );
                metrics::record_breaker_rejection(upstream);
                return Forwarded::Fallback(ErrorEnvelope::service_unavailable(upstream));
            }
        };

        let user = if request.authenticated { "authenticated" } else { "anonymous" };
        let outbound = compose(request);
        let method = outbound.method.clone();
        let url = outbound.url.clone();

        tracing::debug!(
            upstream = %upstream,
            request_id = %request_id,
            method = %method,
            url = %url,
            user,
            probe = permit.is_probe(),
            "Forwarding request to service"
        );

        let outcome = self
            .executor
            .execute(outbound, breaker.config().call_timeout())
            .await;
        permit.record(outcome.verdict());

        match outcome {
            ForwardOutcome::Success(response) => {
                tracing::info!(
                    upstream = %upstream,
                    request_id = %request_id,
                    method = %method,
                    url = %url,
                    status = response.status.as_u16(),
                    "Request completed successfully"
                );
                Forwarded::Upstream(response)
            }
            ForwardOutcome::UpstreamError(response) => {
                if response.status.is_server_error() {
                    tracing::error!(
                        upstream = %upstream,
                        request_id = %request_id,
                        method = %method,
                        url = %url,
                        status = response.status.as_u16(),
                        "Upstream server error"
                    );
                    metrics::record_upstream_failure(upstream, "server_error");
                } else {
                    tracing::info!(
                        upstream = %upstream,
                        request_id = %request_id,
                        status = response.status.as_u16(),
                        "Upstream rejected request"
                    );
                }
                Forwarded::Upstream(response)
            }
            ForwardOutcome::ConnectionFailure { reason } => {
                tracing::error!(
                    upstream = %upstream,
                    request_id = %request_id,
                    method = %method,
                    url = %url,
                    error = %reason,
                    "Upstream unreachable"
                );
                metrics::record_upstream_failure(upstream, "connection_failure");
                Forwarded::Fallback(ErrorEnvelope::service_unavailable(upstream))
            }
            ForwardOutcome::Timeout => {
                tracing::error!(
                    upstream = %upstream,
                    request_id = %request_id,
                    method = %method,
                    url = %url,
                    timeout_ms = breaker.config().call_timeout_ms,
                    "Upstream call timed out"
                );
                metrics::record_upstream_failure(upstream, "timeout");
                Forwarded::Fallback(ErrorEnvelope::service_unavailable(upstream))
            }
            ForwardOutcome::ResponseTooLarge { status, limit } => {
                tracing::warn!(
                    upstream = %upstream,
                    request_id = %request_id,
                    method = %method,
                    url = %url,
                    status = status.as_u16(),
                    limit_bytes = limit,
                    "Upstream response exceeds size limit"
                );
                metrics::record_upstream_failure(upstream, "response_too_large");
                Forwarded::Fallback(ErrorEnvelope::response_too_large(upstream, limit))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BreakerConfig;
    use crate::resilience::circuit_breaker::CircuitState;
    use async_trait::async_trait;
    use axum::body::Bytes;
    use axum::http::StatusCode;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Replays queued outcomes and remembers what it was asked to send.
    #[derive(Default)]
    struct ScriptedExecutor {
        script: Mutex<VecDeque<ForwardOutcome>>,
        seen: Mutex<Vec<ForwardRequest>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedExecutor {
        fn with(outcomes: impl IntoIterator<Item = ForwardOutcome>) -> Self {
            Self {
                script: Mutex::new(outcomes.into_iter().collect()),
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().len()
        }
    }

    #[async_trait]
    impl CallExecutor for ScriptedExecutor {
        async fn execute(&self, request: ForwardRequest, _timeout: Duration) -> ForwardOutcome {
            self.seen.lock().push(request);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| ForwardOutcome::Success(reply(200)))
        }
    }

    fn reply(status: u16) -> UpstreamResponse {
        UpstreamResponse {
            status: StatusCode::from_u16(status).unwrap(),
            content_type: None,
            body: Bytes::from(format!(r#"{{"status":{}}}"#, status)),
        }
    }

    fn inbound(method: Method) -> InboundRequest {
        InboundRequest {
            method,
            target_url: Url::parse("http://service_orders:8002/v1/orders").unwrap(),
            headers: HeaderMap::new(),
            query: vec![("status".into(), "pending".into()), ("page".into(), "2".into())],
            body: Some(serde_json::json!({ "items": [1, 2] })),
            correlation_id: "req-42".into(),
            authenticated: false,
            bearer_token: Some("tok".into()),
        }
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("orders", BreakerConfig::default())
    }

    fn setup(executor: ScriptedExecutor) -> (Arc<ScriptedExecutor>, RequestForwarder) {
        let executor = Arc::new(executor);
        let forwarder = RequestForwarder::new(executor.clone());
        (executor, forwarder)
    }

    #[test]
    fn get_serializes_query_and_drops_body() {
        let out = compose(inbound(Method::GET));
        assert_eq!(out.url.as_str(), "http://service_orders:8002/v1/orders?status=pending&page=2");
        assert!(out.body.is_none());
        assert_eq!(out.headers[X_REQUEST_ID], "req-42");
        assert_eq!(out.headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn post_attaches_body_without_query() {
        let out = compose(inbound(Method::POST));
        assert_eq!(out.url.query(), None);
        assert_eq!(out.body, Some(serde_json::json!({ "items": [1, 2] })));
    }

    #[test]
    fn bearer_only_propagates_when_authenticated() {
        let anonymous = compose(inbound(Method::GET));
        assert!(anonymous.headers.get(header::AUTHORIZATION).is_none());

        let mut request = inbound(Method::GET);
        request.authenticated = true;
        let authed = compose(request);
        assert_eq!(authed.headers[header::AUTHORIZATION], "Bearer tok");
    }

    #[test]
    fn managed_headers_are_not_copied() {
        let mut request = inbound(Method::GET);
        request.headers.insert(header::HOST, HeaderValue::from_static("gateway:8000"));
        request.headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer spoofed"));
        request.headers.insert(X_REQUEST_ID, HeaderValue::from_static("other"));
        request.headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("ru"));

        let out = compose(request);
        assert!(out.headers.get(header::HOST).is_none());
        assert!(out.headers.get(header::AUTHORIZATION).is_none());
        assert_eq!(out.headers[X_REQUEST_ID], "req-42");
        assert_eq!(out.headers[header::ACCEPT_LANGUAGE], "ru");
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_failure_rate_and_stops_calling() {
        let outcomes = (0..10).map(|i| {
            if i < 6 {
                ForwardOutcome::ConnectionFailure { reason: "refused".into() }
            } else {
                ForwardOutcome::Success(reply(200))
            }
        });
        let (executor, forwarder) = setup(ScriptedExecutor::with(outcomes));
        let cb = breaker();

        for _ in 0..10 {
            forwarder.forward(&cb, inbound(Method::GET)).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let eleventh = forwarder.forward(&cb, inbound(Method::GET)).await;
        assert_eq!(
            eleventh,
            Forwarded::Fallback(ErrorEnvelope::service_unavailable("orders"))
        );
        assert_eq!(executor.calls(), 10, "no network call while open");
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_pass_through_and_count_as_success() {
        let (executor, forwarder) =
            setup(ScriptedExecutor::with((0..12).map(|_| ForwardOutcome::UpstreamError(reply(404)))));
        let cb = breaker();

        for _ in 0..12 {
            let result = forwarder.forward(&cb, inbound(Method::GET)).await;
            assert_eq!(result, Forwarded::Upstream(reply(404)));
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failures, 0);
        assert_eq!(executor.calls(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_pass_through_and_count_as_failure() {
        let (_, forwarder) =
            setup(ScriptedExecutor::with((0..10).map(|_| ForwardOutcome::UpstreamError(reply(503)))));
        let cb = breaker();

        let first = forwarder.forward(&cb, inbound(Method::GET)).await;
        assert_eq!(first, Forwarded::Upstream(reply(503)));
        assert!(!first.is_fallback());
        assert_eq!(cb.snapshot().failures, 1);

        for _ in 1..10 {
            forwarder.forward(&cb, inbound(Method::GET)).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_yields_fallback() {
        let (_, forwarder) = setup(ScriptedExecutor::with([ForwardOutcome::Timeout]));
        let cb = breaker();

        let result = forwarder.forward(&cb, inbound(Method::POST)).await;
        assert!(result.is_fallback());
        assert_eq!(cb.snapshot().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_success_does_not_count_against_upstream() {
        let too_large = || ForwardOutcome::ResponseTooLarge {
            status: StatusCode::OK,
            limit: 1024,
        };
        let (executor, forwarder) = setup(ScriptedExecutor::with((0..12).map(|_| too_large())));
        let cb = breaker();

        for _ in 0..12 {
            let result = forwarder.forward(&cb, inbound(Method::GET)).await;
            assert_eq!(
                result,
                Forwarded::Fallback(ErrorEnvelope::response_too_large("orders", 1024))
            );
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failures, 0);
        assert_eq!(cb.snapshot().successes, 12);
        assert_eq!(executor.calls(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_call_rejected_while_probe_in_flight() {
        let gate = Arc::new(Notify::new());
        let failures = (0..10).map(|_| ForwardOutcome::Timeout);
        let executor = Arc::new(ScriptedExecutor {
            script: Mutex::new(failures.collect()),
            seen: Mutex::new(Vec::new()),
            gate: None,
        });
        let forwarder = RequestForwarder::new(executor.clone());
        let cb = Arc::new(breaker());
        for _ in 0..10 {
            forwarder.forward(&cb, inbound(Method::GET)).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);
        tokio::time::advance(Duration::from_secs(30)).await;

        let gated = Arc::new(ScriptedExecutor {
            gate: Some(gate.clone()),
            ..ScriptedExecutor::default()
        });
        let gated_forwarder = RequestForwarder::new(gated.clone());
        let probe = {
            let cb = cb.clone();
            let forwarder = gated_forwarder.clone();
            tokio::spawn(async move { forwarder.forward(&cb, inbound(Method::GET)).await })
        };
        while gated.calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let second = gated_forwarder.forward(&cb, inbound(Method::GET)).await;
        assert!(second.is_fallback());
        assert_eq!(gated.calls(), 1);

        gate.notify_one();
        let probe_result = probe.await.unwrap();
        assert_eq!(probe_result, Forwarded::Upstream(reply(200)));
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_rate, 0.0);
    }
}
