//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client token bucket, /health exempt)
//!     → routing
//!     → auth.rs (bearer JWT, only for routes that require it)
//!     → Pass to forwarder
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input
//! - Rejections use the same JSON envelope as every other gateway error

pub mod auth;
pub mod rate_limit;

pub use auth::{AuthContext, Authenticator};
pub use rate_limit::RateLimiter;
