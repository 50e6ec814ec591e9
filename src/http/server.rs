//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, CORS, rate limit)
//! - Bind server to listener with graceful shutdown
//! - Dispatch requests to the routing table
//! - Forward requests to upstreams through their circuit breakers
//! - Observability (metrics, correlation IDs)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request},
    middleware,
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::{CorsConfig, GatewayConfig};
use crate::http::request::{self, request_id, X_REQUEST_ID};
use crate::http::response::{self, GatewayError};
use crate::http::status::StatusMapper;
use crate::observability::metrics;
use crate::resilience::executor::{CallExecutor, HttpExecutor};
use crate::resilience::forwarder::RequestForwarder;
use crate::resilience::registry::BreakerRegistry;
use crate::routing::{RouteMatch, RouteTable};
use crate::security::auth::Authenticator;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub routes: Arc<RouteTable>,
    pub breakers: Arc<BreakerRegistry>,
    pub forwarder: RequestForwarder,
    pub status_map: Arc<StatusMapper>,
    pub auth: Arc<Authenticator>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server that calls upstreams over HTTP.
    pub fn new(config: GatewayConfig) -> Self {
        let executor = Arc::new(HttpExecutor::new(config.listener.max_response_bytes));
        Self::with_executor(config, executor)
    }

    /// Create a server with a custom upstream executor.
    pub fn with_executor(config: GatewayConfig, executor: Arc<dyn CallExecutor>) -> Self {
        let routes = Arc::new(RouteTable::compile(&config.routes, &config.upstreams));
        let breakers = Arc::new(BreakerRegistry::from_config(&config.upstreams));
        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(&config.rate_limit)));

        let state = AppState {
            routes,
            breakers,
            forwarder: RequestForwarder::new(executor),
            status_map: Arc::new(StatusMapper::with_overrides(&config.status_map)),
            auth: Arc::new(Authenticator::new(&config.auth.jwt_secret)),
            rate_limiter,
            config: Arc::new(config),
        };

        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = state.config.clone();

        let mut router = Router::new().route("/health", get(health_handler));
        if config.admin.enabled {
            router = router.merge(setup_admin_router(state.clone()));
        }

        router
            .fallback(proxy_handler)
            .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(config.listener.request_timeout_secs)))
            .layer(cors_layer(&config.cors))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
            .with_state(state)
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.state.routes.len(),
            upstreams = self.state.breakers.len(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.state.config
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::PATCH])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, X_REQUEST_ID]);

    let any = config.allowed_origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*");
    if any {
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

async fn health_handler(headers: HeaderMap) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "status": "OK",
            "service": "API Gateway",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "requestId": request_id(&headers),
        }
    }))
}

/// Main proxy handler.
/// Looks up route, authenticates if required, and forwards through the breaker.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request_id(request.headers());

    let Some(route) = state.routes.match_path(&path) else {
        tracing::warn!(request_id = %request_id, method = %method, path = %path, "No route matched");
        metrics::record_request(method.as_str(), 404, "none", start);
        return GatewayError::RouteNotFound { method, path }.into_response_with(&state.status_map);
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        route = %route.route,
        upstream = %route.upstream,
        "Proxying request"
    );

    let response = match dispatch(&state, &route, request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(
                request_id = %request_id,
                path = %path,
                upstream = %route.upstream,
                code = err.code(),
                error = %err,
                "Request rejected by gateway"
            );
            err.into_response_with(&state.status_map)
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), &route.upstream, start);
    response
}

async fn dispatch(
    state: &AppState,
    route: &RouteMatch,
    request: Request<Body>,
) -> Result<Response, GatewayError> {
    let auth = if route.require_auth {
        let ctx = state.auth.authenticate(request.headers())?;
        tracing::debug!(user_id = %ctx.user_id, role = ?ctx.role, "Request authenticated");
        Some(ctx)
    } else {
        None
    };

    let breaker = state
        .breakers
        .get(&route.upstream)
        .ok_or_else(|| GatewayError::UnknownUpstream(route.upstream.clone()))?;

    let inbound = request::extract(
        request,
        route.target_url.clone(),
        auth,
        state.config.listener.max_body_bytes,
    )
    .await?;

    let forwarded = state.forwarder.forward(&breaker, inbound).await;
    Ok(response::render(forwarded, &state.status_map))
}
