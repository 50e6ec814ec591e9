//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream calls with a hard deadline
//! - Cancel operations cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the wrapped future is dropped on expiry,
//!   so a late response can never be observed
//! - The deadline is scoped to one call and shares nothing with breaker timers
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;

pub use tokio::time::error::Elapsed;

/// Run `call`, giving up after `deadline`.
pub async fn with_deadline<F>(deadline: Duration, call: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    tokio::time::timeout(deadline, call).await
}
