//! Galera cluster membership subsystem.
//!
//! # Data Flow
//! ```text
//! Seed list (host:port, ...)
//!     → discovery.rs (seed must be PRIMARY, enumerate incoming addresses)
//!     → accessor.rs (status read per node; mysql.rs live, memory.rs scripted)
//!     → node.rs (parse wsrep status into ClusterNode)
//!     → node_set.rs (ClusterNodeSet, candidate tier)
//! ```
//!
//! # Design Decisions
//! - Membership is rebuilt on every pass and discarded afterwards
//! - The seed's state UUID defines the cluster; foreign peers are dropped
//! - Nodes are read sequentially, each with a bounded connect timeout

pub mod accessor;
pub mod discovery;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod mysql;
pub mod node;
pub mod node_set;

pub use accessor::NodeHealthAccessor;
#[cfg(any(test, feature = "test-util"))]
pub use memory::InMemoryCluster;
pub use mysql::MySqlNodeAccessor;
pub use node::{ClusterNode, ClusterStatus, LocalState};
pub use node_set::ClusterNodeSet;
