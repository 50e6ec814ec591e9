//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → consumed once at startup to build routes, breakers and middleware
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breakers live for the process lifetime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_default, ConfigError};
pub use schema::{
    AdminConfig, AuthConfig, BreakerConfig, CorsConfig, GatewayConfig, ListenerConfig,
    ObservabilityConfig, RateLimitConfig, RouteConfig, UpstreamConfig,
};
