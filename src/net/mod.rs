//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Operation against a node or the admin store
//!     → endpoint.rs (address, credentials)
//!     → connection.rs (bounded connect, text-protocol statements)
//!     → rows handed back as text maps
//!     → session closed before the operation returns
//! ```
//!
//! # Design Decisions
//! - One session per operation, never shared across passes
//! - Every connect and statement carries a deadline

pub mod connection;
pub mod endpoint;

pub use connection::{Session, SessionError, TextRow};
pub use endpoint::{Credentials, Endpoint, NodeAddr};
