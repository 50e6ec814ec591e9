//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing upstreams)
//! - Validate value ranges (timeouts > 0, thresholds in range)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::StatusCode;
use url::Url;

use crate::config::schema::{BreakerConfig, GatewayConfig};
use crate::http::status::fixed_status;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid listener address `{0}`")]
    ListenerAddress(String),

    #[error("duplicate upstream `{0}`")]
    DuplicateUpstream(String),

    #[error("upstream `{name}` has invalid base_url `{url}` (expected http://host[:port])")]
    UpstreamUrl { name: String, url: String },

    #[error("upstream `{name}`: {reason}")]
    Breaker { name: String, reason: &'static str },

    #[error("route `{route}` references unknown upstream `{upstream}`")]
    UnknownUpstream { route: String, upstream: String },

    #[error("route `{0}` path_prefix must start with '/'")]
    RoutePrefix(String),

    #[error("status_map entry `{code}` has invalid status {status}")]
    StatusCode { code: String, status: u16 },

    #[error("status_map entry `{code}` is fixed at {fixed} and cannot be remapped to {status}")]
    FixedStatusCode { code: String, status: u16, fixed: u16 },

    #[error("rate_limit requires max_requests > 0 and window_secs > 0")]
    RateLimit,

    #[error("listener {0} must be > 0")]
    ListenerLimit(&'static str),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::ListenerAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::ListenerLimit("max_body_bytes"));
    }
    if config.listener.max_response_bytes == 0 {
        errors.push(ValidationError::ListenerLimit("max_response_bytes"));
    }

    let mut names = HashSet::new();
    for upstream in &config.upstreams {
        if !names.insert(upstream.name.as_str()) {
            errors.push(ValidationError::DuplicateUpstream(upstream.name.clone()));
        }

        let url_ok = Url::parse(&upstream.base_url)
            .map(|u| u.scheme() == "http" && u.has_host())
            .unwrap_or(false);
        if !url_ok {
            errors.push(ValidationError::UpstreamUrl {
                name: upstream.name.clone(),
                url: upstream.base_url.clone(),
            });
        }

        for reason in breaker_problems(&upstream.breaker) {
            errors.push(ValidationError::Breaker {
                name: upstream.name.clone(),
                reason,
            });
        }
    }

    for route in &config.routes {
        if !names.contains(route.upstream.as_str()) {
            errors.push(ValidationError::UnknownUpstream {
                route: route.name.clone(),
                upstream: route.upstream.clone(),
            });
        }
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::RoutePrefix(route.name.clone()));
        }
    }

    for (code, status) in &config.status_map {
        if StatusCode::from_u16(*status).is_err() {
            errors.push(ValidationError::StatusCode {
                code: code.clone(),
                status: *status,
            });
        } else if let Some(fixed) = fixed_status(code).filter(|f| f.as_u16() != *status) {
            errors.push(ValidationError::FixedStatusCode {
                code: code.clone(),
                status: *status,
                fixed: fixed.as_u16(),
            });
        }
    }

    let rl = &config.rate_limit;
    if rl.enabled && (rl.max_requests == 0 || rl.window_secs == 0) {
        errors.push(ValidationError::RateLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn breaker_problems(breaker: &BreakerConfig) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if breaker.call_timeout_ms == 0 {
        problems.push("call_timeout_ms must be > 0");
    }
    if breaker.reset_timeout_ms == 0 {
        problems.push("reset_timeout_ms must be > 0");
    }
    if !(breaker.error_threshold_percent > 0.0 && breaker.error_threshold_percent <= 100.0) {
        problems.push("error_threshold_percent must be in (0, 100]");
    }
    if breaker.bucket_count == 0 {
        problems.push("bucket_count must be >= 1");
    } else if breaker.rolling_window_ms < breaker.bucket_count as u64 {
        problems.push("rolling_window_ms must be >= bucket_count");
    }
    problems
}
