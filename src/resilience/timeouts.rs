//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound every connect and statement against a node or the admin store
//! - Report the budget that elapsed so callers can log it
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A timed-out node is classified unhealthy by the caller, never retried

use std::future::Future;
use std::time::Duration;

/// A deadline was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    pub budget: Duration,
}

/// Run `fut` with an upper bound of `budget`.
pub async fn with_deadline<F>(budget: Duration, fut: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    tokio::time::timeout(budget, fut)
        .await
        .map_err(|_| Elapsed { budget })
}
