//! Breaker registry.
//!
//! One breaker per configured upstream, built once at startup and handed to
//! request handlers through the application state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::UpstreamConfig;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};

#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: HashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn from_config(upstreams: &[UpstreamConfig]) -> Self {
        let mut registry = Self::default();
        for upstream in upstreams {
            registry.insert(CircuitBreaker::new(&upstream.name, upstream.breaker.clone()));
        }
        registry
    }

    pub fn insert(&mut self, breaker: CircuitBreaker) {
        tracing::debug!(
            upstream = %breaker.name(),
            threshold_percent = breaker.config().error_threshold_percent,
            reset_timeout_ms = breaker.config().reset_timeout_ms,
            "Circuit breaker registered"
        );
        metrics::record_breaker_state(breaker.name(), CircuitState::Closed);
        self.breakers
            .insert(breaker.name().to_string(), Arc::new(breaker));
    }

    pub fn get(&self, upstream: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(upstream).cloned()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Snapshots of every breaker, ordered by upstream name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}
