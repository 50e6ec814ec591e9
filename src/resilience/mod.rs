//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → forwarder.rs (compose outbound request)
//!     → circuit_breaker.rs (admit, or reject with fallback)
//!     → executor.rs + timeouts.rs (one call under a hard deadline)
//!     → window.rs (outcome tallied, failure rate re-evaluated)
//!     → forwarder.rs (passthrough payload or fallback)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - No retries at this layer
//! - Circuit breaker prevents cascading failures
//! - Breakers live in a registry built at startup, never in globals

pub mod circuit_breaker;
pub mod executor;
pub mod forwarder;
pub mod registry;
pub mod timeouts;
pub mod window;

pub use circuit_breaker::{BreakerSnapshot, CallPermit, CircuitBreaker, CircuitState, Rejected};
pub use executor::{CallExecutor, ForwardOutcome, ForwardRequest, HttpExecutor, UpstreamResponse};
pub use forwarder::{Forwarded, InboundRequest, RequestForwarder};
pub use registry::BreakerRegistry;
pub use window::{CallVerdict, RollingWindow, WindowTotals};
