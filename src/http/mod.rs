//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → [routing table picks upstream]
//!     → request.rs (buffer body, parse query, attach identity)
//!     → [resilience forwarder calls upstream through its breaker]
//!     → response.rs + status.rs (passthrough or mapped error envelope)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod status;

pub use request::X_REQUEST_ID;
pub use response::{ErrorEnvelope, GatewayError};
pub use server::{AppState, HttpServer};
pub use status::StatusMapper;
