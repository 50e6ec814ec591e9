//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, request limits).
    pub listener: ListenerConfig,

    /// Backend services the gateway forwards to.
    pub upstreams: Vec<UpstreamConfig>,

    /// Route definitions mapping path prefixes to upstreams.
    pub routes: Vec<RouteConfig>,

    /// Bearer token verification.
    pub auth: AuthConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Global per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Extra or overriding `error code -> HTTP status` entries.
    pub status_map: HashMap<String, u16>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            upstreams: vec![
                UpstreamConfig::new("users", "http://service_users:8001"),
                UpstreamConfig::new("orders", "http://service_orders:8002"),
            ],
            routes: vec![
                RouteConfig::public("users-register", "/v1/users/register", "users"),
                RouteConfig::public("users-login", "/v1/users/login", "users"),
                RouteConfig::protected("users", "/v1/users", "users"),
                RouteConfig::protected("orders", "/v1/orders", "orders"),
            ],
            auth: AuthConfig::default(),
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
            status_map: HashMap::new(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Total time allowed for handling one inbound request, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,

    /// Largest upstream response body relayed to the client, in bytes.
    pub max_response_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 1024 * 1024,
            max_response_bytes: 10 * 1024 * 1024,
        }
    }
}

/// A backend service reachable through the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Unique upstream identifier, also used in fallback messages.
    pub name: String,

    /// Base URL (e.g., "http://service_users:8001").
    pub base_url: String,

    /// Circuit breaker settings for this upstream.
    #[serde(default)]
    pub breaker: BreakerConfig,
}

impl UpstreamConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            breaker: BreakerConfig::default(),
        }
    }
}

/// Per-upstream circuit breaker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Hard deadline for a single upstream call.
    pub call_timeout_ms: u64,

    /// Failure percentage over the rolling window that opens the circuit.
    pub error_threshold_percent: f64,

    /// Cool-down spent in Open before a probe is admitted.
    pub reset_timeout_ms: u64,

    /// Length of the rolling statistics window.
    pub rolling_window_ms: u64,

    /// Number of buckets the rolling window is split into.
    pub bucket_count: usize,

    /// Calls required in the window before the threshold is evaluated.
    pub minimum_volume: u64,
}

impl BreakerConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn rolling_window(&self) -> Duration {
        Duration::from_millis(self.rolling_window_ms)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 5_000,
            error_threshold_percent: 50.0,
            reset_timeout_ms: 30_000,
            rolling_window_ms: 60_000,
            bucket_count: 10,
            minimum_volume: 10,
        }
    }
}

/// Route configuration mapping a path prefix to an upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path prefix to match, on segment boundaries.
    pub path_prefix: String,

    /// Upstream name to forward to.
    pub upstream: String,

    /// Whether a valid bearer token is required.
    #[serde(default = "default_require_auth")]
    pub require_auth: bool,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,
}

impl RouteConfig {
    pub fn public(name: &str, path_prefix: &str, upstream: &str) -> Self {
        Self {
            name: name.to_string(),
            path_prefix: path_prefix.to_string(),
            upstream: upstream.to_string(),
            require_auth: false,
            priority: 10,
        }
    }

    pub fn protected(name: &str, path_prefix: &str, upstream: &str) -> Self {
        Self {
            require_auth: true,
            priority: 0,
            ..Self::public(name, path_prefix, upstream)
        }
    }
}

fn default_require_auth() -> bool {
    true
}

/// Bearer token verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret used to verify HS256 tokens.
    pub jwt_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Override with JWT_SECRET in production.
            jwt_secret: "your-secret-key".to_string(),
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; empty means any origin.
    pub allowed_origins: Vec<String>,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed per client within one window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_secs: 15 * 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Expose the admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_fills_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [[upstreams]]
            name = "users"
            base_url = "http://127.0.0.1:9001"

            [upstreams.breaker]
            minimum_volume = 4

            [[routes]]
            name = "users"
            path_prefix = "/v1/users"
            upstream = "users"
            "#,
        )
        .unwrap();

        assert_eq!(config.upstreams.len(), 1);
        let breaker = &config.upstreams[0].breaker;
        assert_eq!(breaker.minimum_volume, 4);
        assert_eq!(breaker.call_timeout(), Duration::from_secs(5));
        assert_eq!(breaker.bucket_count, 10);
        assert!(config.routes[0].require_auth);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
        assert_eq!(config.listener.max_response_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn default_routes_cover_both_services() {
        let config = GatewayConfig::default();
        let public: Vec<_> = config
            .routes
            .iter()
            .filter(|r| !r.require_auth)
            .map(|r| r.path_prefix.as_str())
            .collect();
        assert_eq!(public, ["/v1/users/register", "/v1/users/login"]);
        assert!(config.routes.iter().any(|r| r.upstream == "orders"));
    }
}
