//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a node or the admin store:
//!     → timeouts.rs (enforce connect/statement deadline)
//!     → On elapse: caller classifies the node (or aborts on the admin store)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries inside a pass; the scheduler retries on its next tick

pub mod timeouts;
