//! Router backend registry subsystem.
//!
//! # Data Flow
//! ```text
//! mysql_servers rows
//!     → proxysql.rs (admin interface over sqlx; memory.rs for tests)
//!     → annotation.rs (comment column ↔ role + operator override)
//!     → backend.rs (RouterBackend)
//!     → backend_set.rs (BackendSet, what the planner edits)
//!
//! mysql_users rows
//!     → user.rs (RouterUser, account commands)
//! ```
//!
//! # Design Decisions
//! - Deregistration is a status change to OFFLINE_HARD, never a delete
//! - Registration is an upsert; a reload is issued once per pass by the caller

pub mod admin;
pub mod annotation;
pub mod backend;
pub mod backend_set;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod proxysql;
pub mod user;

pub use admin::RouterAdmin;
pub use backend::{Annotation, BackendKey, BackendRole, BackendStatus, RouterBackend};
pub use backend_set::BackendSet;
#[cfg(any(test, feature = "test-util"))]
pub use memory::InMemoryRouterAdmin;
pub use proxysql::ProxySqlAdmin;
pub use user::{RouterUser, UserChanges};
