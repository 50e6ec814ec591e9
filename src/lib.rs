//! API gateway with per-upstream circuit breakers.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http::server ──▶ security::rate_limit ──▶ routing ──▶ security::auth
//!                                                                         │
//!                                                                         ▼
//!     Client ◀── http::response ◀── resilience::forwarder ◀── circuit_breaker + executor ◀──▶ Upstream
//! ```
//!
//! Cross-cutting: `config`, `observability`, `lifecycle`, `admin`.

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
