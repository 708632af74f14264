//! Router admin store port.

use async_trait::async_trait;

use crate::error::{SyncError, SyncResult};
use crate::registry::backend::{BackendStatus, RouterBackend};
use crate::registry::user::RouterUser;

/// Operations the engine needs from the router's configuration store.
///
/// Every method opens its own session; nothing is cached between calls.
#[async_trait]
pub trait RouterAdmin: Send + Sync {
    /// Check the admin interface answers.
    async fn ping(&self) -> SyncResult<()>;

    /// Rows filtered by hostgroup and status.
    ///
    /// Fails with [`SyncError::BackendNotFound`] when nothing matches.
    async fn find_backends(
        &self,
        hostgroup: Option<u32>,
        status: Option<BackendStatus>,
    ) -> SyncResult<Vec<RouterBackend>>;

    /// Upsert keyed by (hostgroup, host, port).
    async fn register_backend(&self, backend: &RouterBackend) -> SyncResult<()>;

    /// Move the row to OFFLINE_HARD. The row itself is kept.
    async fn deregister_backend(&self, backend: &RouterBackend) -> SyncResult<()>;

    /// Change the status of an existing row.
    ///
    /// Fails with [`SyncError::BackendUnregistered`] when the row does not exist.
    async fn set_status(&self, backend: &RouterBackend, status: BackendStatus) -> SyncResult<()>;

    /// Update one of the router's global variables.
    async fn set_variable(&self, name: &str, value: &str) -> SyncResult<()>;

    /// Apply the configuration tables to the running router.
    async fn reload_runtime(&self) -> SyncResult<()>;

    /// `mysql_users` rows, all of them or those of one username. May be empty.
    async fn find_users(&self, username: Option<&str>) -> SyncResult<Vec<RouterUser>>;

    /// Upsert keyed by (username, backend).
    async fn upsert_user(&self, user: &RouterUser) -> SyncResult<()>;

    /// Delete every row of `username`, returning how many were removed.
    async fn delete_user(&self, username: &str) -> SyncResult<u64>;

    /// Apply `mysql_users` to the running router and persist it.
    async fn reload_users(&self) -> SyncResult<()>;
}

/// `find_backends` with an empty result instead of `BackendNotFound`.
pub async fn backends_or_empty<A>(admin: &A, hostgroup: u32) -> SyncResult<Vec<RouterBackend>>
where
    A: RouterAdmin + ?Sized,
{
    match admin.find_backends(Some(hostgroup), None).await {
        Ok(rows) => Ok(rows),
        Err(SyncError::BackendNotFound { .. }) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}
