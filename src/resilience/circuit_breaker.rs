//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast with a fallback
//! - Half-Open: testing if upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: volume >= minimum_volume and failure rate >= threshold
//! Open → Half-Open: first call after reset_timeout has elapsed
//! Half-Open → Closed: probe request succeeds (window reset)
//! Half-Open → Open: probe request fails (cool-down restarts)
//! ```
//!
//! # Design Decisions
//! - Per-upstream circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering recovering upstream)
//! - The lock only guards bookkeeping; it is never held across the call

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::observability::metrics;
use crate::resilience::window::{CallVerdict, RollingWindow};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by [`CircuitBreaker::attempt`] when a call is not admitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circuit breaker for {upstream} is {state}")]
pub struct Rejected {
    pub upstream: String,
    pub state: CircuitState,
}

struct BreakerState {
    state: CircuitState,
    window: RollingWindow,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Circuit breaker for a single upstream.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerState>,
    rejections: AtomicU64,
}

impl CircuitBreaker {
    /// Create a closed breaker with an empty window.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let window = RollingWindow::new(config.rolling_window(), config.bucket_count);
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                window,
                opened_at: None,
                probe_in_flight: false,
            }),
            rejections: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state, without applying the Open → Half-Open timer.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Ask whether a call may go to the upstream right now.
    ///
    /// The returned permit must be completed with [`CallPermit::record`] once
    /// the call finishes.
    pub fn attempt(&self) -> Result<CallPermit<'_>, Rejected> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let cooled_down = inner
                .opened_at
                .map_or(true, |at| now.saturating_duration_since(at) >= self.config.reset_timeout());
            if cooled_down {
                self.transition(&mut inner, CircuitState::HalfOpen);
            }
        }

        let state = inner.state;
        match state {
            CircuitState::Closed => Ok(CallPermit::new(self, false)),
            CircuitState::HalfOpen if !inner.probe_in_flight => {
                inner.probe_in_flight = true;
                tracing::debug!(upstream = %self.name, "Admitting half-open probe");
                Ok(CallPermit::new(self, true))
            }
            _ => {
                drop(inner);
                self.rejections.fetch_add(1, Ordering::Relaxed);
                Err(Rejected {
                    upstream: self.name.clone(),
                    state,
                })
            }
        }
    }

    /// Point-in-time view for the admin API.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        let totals = inner.window.totals(Instant::now());
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            successes: totals.successes,
            failures: totals.failures,
            failure_rate: totals.failure_rate(),
            probe_in_flight: inner.probe_in_flight,
            rejections: self.rejections.load(Ordering::Relaxed),
        }
    }

    /// Number of calls refused without contacting the upstream.
    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }

    fn complete(&self, probe: bool, verdict: CallVerdict) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.window.record(verdict, now);

        if probe {
            inner.probe_in_flight = false;
            if inner.state == CircuitState::HalfOpen {
                match verdict {
                    CallVerdict::Success => {
                        inner.window.reset();
                        inner.opened_at = None;
                        self.transition(&mut inner, CircuitState::Closed);
                    }
                    CallVerdict::Failure => self.trip(&mut inner, now),
                }
            }
            return;
        }

        // Outcomes of calls admitted before the circuit left Closed are
        // tallied but never drive a transition.
        if inner.state != CircuitState::Closed {
            return;
        }

        let totals = inner.window.totals(now);
        if totals.volume() >= self.config.minimum_volume
            && totals.failure_rate() * 100.0 >= self.config.error_threshold_percent
        {
            tracing::warn!(
                upstream = %self.name,
                failures = totals.failures,
                volume = totals.volume(),
                threshold_percent = self.config.error_threshold_percent,
                "Failure rate over threshold"
            );
            self.trip(&mut inner, now);
        }
    }

    fn abandon(&self) {
        let mut inner = self.inner.lock();
        if inner.probe_in_flight {
            inner.probe_in_flight = false;
            tracing::debug!(upstream = %self.name, "Half-open probe abandoned before completion");
        }
    }

    fn trip(&self, inner: &mut BreakerState, now: Instant) {
        inner.opened_at = Some(now);
        inner.window.reset();
        self.transition(inner, CircuitState::Open);
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        match to {
            CircuitState::Open => {
                tracing::warn!(upstream = %self.name, %from, "Circuit breaker opened")
            }
            CircuitState::HalfOpen => {
                tracing::info!(upstream = %self.name, %from, "Circuit breaker half-open")
            }
            CircuitState::Closed => {
                tracing::info!(upstream = %self.name, %from, "Circuit breaker closed")
            }
        }
        metrics::record_breaker_state(&self.name, to);
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Admission ticket for one call.
///
/// Consumed by [`CallPermit::record`], so an outcome can be reported at most
/// once. Dropping it unrecorded frees the probe slot without touching the
/// window.
#[derive(Debug)]
#[must_use = "a permit must be completed with `record`"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    recorded: bool,
}

impl<'a> CallPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            recorded: false,
        }
    }

    /// Whether this is the single Half-Open trial call.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn record(mut self, verdict: CallVerdict) {
        self.recorded = true;
        self.breaker.complete(self.probe, verdict);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.recorded && self.probe {
            self.breaker.abandon();
        }
    }
}

/// Serializable breaker status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub successes: u64,
    pub failures: u64,
    pub failure_rate: f64,
    pub probe_in_flight: bool,
    pub rejections: u64,
}
