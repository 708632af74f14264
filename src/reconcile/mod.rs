//! Single-writer reconciliation.
//!
//! # Data Flow
//! ```text
//! ReconcileRequest
//!     → engine.rs (discover, probe, load rows)
//!     → health.rs (NodeHealth per member)
//!     → planner.rs (target rows, elected writer; blacklist.rs)
//!     → diff.rs (Mutation list)
//!     → engine.rs (apply, reload) → ReconcileReport
//! ```
//!
//! # Design Decisions
//! - Per-node failures become a health classification, never a pass error
//! - Convergence is computed, then applied as a diff, so repeated passes over
//!   an unchanged cluster write nothing

pub mod blacklist;
pub mod diff;
pub mod engine;
pub mod health;
pub mod planner;

pub use blacklist::WriterBlacklist;
pub use diff::Mutation;
pub use engine::{ReconcileReport, ReconcileRequest, Reconciler};
pub use health::{HealthMap, NodeHealth};
