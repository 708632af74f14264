//! Galera cluster to ProxySQL single-writer synchronisation.

pub mod cluster;
pub mod config;
pub mod error;
pub mod net;
pub mod observability;
pub mod reconcile;
pub mod registry;
pub mod resilience;

pub use config::RouterConfig;
pub use error::{SyncError, SyncResult};
pub use reconcile::{ReconcileReport, ReconcileRequest, Reconciler};
