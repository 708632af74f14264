//! In-memory admin store.
//!
//! Behaves like the `mysql_servers` table for the engine and journals every
//! call, so tests can assert what a pass wrote. Failures can be injected to
//! exercise the error paths. Built for unit tests and, with the `test-util`
//! feature, for integration tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{SyncError, SyncResult};
use crate::registry::admin::RouterAdmin;
use crate::registry::backend::{BackendKey, BackendStatus, RouterBackend};
use crate::registry::user::RouterUser;

/// One journalled admin call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCall {
    Register(BackendKey, BackendStatus),
    Deregister(BackendKey),
    SetStatus(BackendKey, BackendStatus),
    SetVariable(String),
    Reload,
    UpsertUser(String),
    DeleteUser(String),
    ReloadUsers,
}

impl AdminCall {
    /// True for calls that change `mysql_servers`.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            AdminCall::Register(..) | AdminCall::Deregister(_) | AdminCall::SetStatus(..)
        )
    }
}

#[derive(Debug, Default)]
struct State {
    rows: Vec<RouterBackend>,
    variables: HashMap<String, String>,
    users: Vec<RouterUser>,
    journal: Vec<AdminCall>,
    down: bool,
    /// Writes accepted before every further write fails.
    writes_left: Option<usize>,
}

#[derive(Debug, Default)]
pub struct InMemoryRouterAdmin {
    state: Mutex<State>,
}

impl InMemoryRouterAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: impl IntoIterator<Item = RouterBackend>) -> Self {
        let admin = Self::new();
        for row in rows {
            admin.insert(row);
        }
        admin
    }

    /// Put a row directly, bypassing the journal.
    pub fn insert(&self, backend: RouterBackend) {
        let mut state = self.lock();
        let key = backend.key();
        match state.rows.iter_mut().find(|b| b.key() == key) {
            Some(existing) => *existing = backend,
            None => state.rows.push(backend),
        }
    }

    pub fn rows(&self) -> Vec<RouterBackend> {
        self.lock().rows.clone()
    }

    pub fn row(&self, hostgroup: u32, host: &str, port: u16) -> Option<RouterBackend> {
        self.lock()
            .rows
            .iter()
            .find(|b| b.hostgroup_id == hostgroup && b.hostname == host && b.port == port)
            .cloned()
    }

    pub fn variable(&self, name: &str) -> Option<String> {
        self.lock().variables.get(name).cloned()
    }

    pub fn journal(&self) -> Vec<AdminCall> {
        self.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    /// Number of journalled calls that changed `mysql_servers`.
    pub fn writes(&self) -> usize {
        self.lock().journal.iter().filter(|c| c.is_write()).count()
    }

    pub fn reloads(&self) -> usize {
        self.lock()
            .journal
            .iter()
            .filter(|c| **c == AdminCall::Reload)
            .count()
    }

    /// Refuse every call, as if the admin port were closed.
    pub fn set_down(&self, down: bool) {
        self.lock().down = down;
    }

    /// Accept `writes` more table writes, then fail the rest.
    pub fn fail_writes_after(&self, writes: usize) {
        self.lock().writes_left = Some(writes);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reachable(state: &State) -> SyncResult<()> {
        if state.down {
            return Err(SyncError::AdminConnection(
                "connection refused by admin interface".to_string(),
            ));
        }
        Ok(())
    }

    fn accept_write(state: &mut State) -> SyncResult<()> {
        Self::reachable(state)?;
        match state.writes_left {
            Some(0) => Err(SyncError::AdminConnection(
                "lost connection during statement".to_string(),
            )),
            Some(ref mut left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RouterAdmin for InMemoryRouterAdmin {
    async fn ping(&self) -> SyncResult<()> {
        Self::reachable(&self.lock())
    }

    async fn find_backends(
        &self,
        hostgroup: Option<u32>,
        status: Option<BackendStatus>,
    ) -> SyncResult<Vec<RouterBackend>> {
        let state = self.lock();
        Self::reachable(&state)?;

        let mut rows: Vec<RouterBackend> = state
            .rows
            .iter()
            .filter(|b| hostgroup.map_or(true, |hg| b.hostgroup_id == hg))
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        rows.sort_by_key(RouterBackend::key);

        if rows.is_empty() {
            return Err(SyncError::BackendNotFound {
                hostgroup: hostgroup.unwrap_or_default(),
            });
        }
        Ok(rows)
    }

    async fn register_backend(&self, backend: &RouterBackend) -> SyncResult<()> {
        let mut state = self.lock();
        Self::accept_write(&mut state)?;

        let key = backend.key();
        match state.rows.iter_mut().find(|b| b.key() == key) {
            Some(existing) => *existing = backend.clone(),
            None => state.rows.push(backend.clone()),
        }
        state.journal.push(AdminCall::Register(key, backend.status));
        Ok(())
    }

    async fn deregister_backend(&self, backend: &RouterBackend) -> SyncResult<()> {
        let mut state = self.lock();
        Self::accept_write(&mut state)?;

        let key = backend.key();
        if let Some(row) = state.rows.iter_mut().find(|b| b.key() == key) {
            row.status = BackendStatus::OfflineHard;
        }
        state.journal.push(AdminCall::Deregister(key));
        Ok(())
    }

    async fn set_status(&self, backend: &RouterBackend, status: BackendStatus) -> SyncResult<()> {
        let mut state = self.lock();
        Self::accept_write(&mut state)?;

        let key = backend.key();
        let row = state
            .rows
            .iter_mut()
            .find(|b| b.key() == key)
            .ok_or_else(|| SyncError::BackendUnregistered {
                backend: key.to_string(),
            })?;
        row.status = status;
        state.journal.push(AdminCall::SetStatus(key, status));
        Ok(())
    }

    async fn set_variable(&self, name: &str, value: &str) -> SyncResult<()> {
        let mut state = self.lock();
        Self::reachable(&state)?;
        state.variables.insert(name.to_string(), value.to_string());
        state.journal.push(AdminCall::SetVariable(name.to_string()));
        Ok(())
    }

    async fn reload_runtime(&self) -> SyncResult<()> {
        let mut state = self.lock();
        Self::reachable(&state)?;
        state.journal.push(AdminCall::Reload);
        Ok(())
    }

    async fn find_users(&self, username: Option<&str>) -> SyncResult<Vec<RouterUser>> {
        let state = self.lock();
        Self::reachable(&state)?;
        let mut users: Vec<RouterUser> = state
            .users
            .iter()
            .filter(|u| username.map_or(true, |name| u.username == name))
            .cloned()
            .collect();
        users.sort_by(|a, b| (&a.username, a.backend).cmp(&(&b.username, b.backend)));
        Ok(users)
    }

    async fn upsert_user(&self, user: &RouterUser) -> SyncResult<()> {
        let mut state = self.lock();
        Self::reachable(&state)?;
        match state.users.iter_mut().find(|u| u.same_row(user)) {
            Some(existing) => *existing = user.clone(),
            None => state.users.push(user.clone()),
        }
        state.journal.push(AdminCall::UpsertUser(user.username.clone()));
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> SyncResult<u64> {
        let mut state = self.lock();
        Self::reachable(&state)?;
        let before = state.users.len();
        state.users.retain(|u| u.username != username);
        let removed = (before - state.users.len()) as u64;
        state.journal.push(AdminCall::DeleteUser(username.to_string()));
        Ok(removed)
    }

    async fn reload_users(&self) -> SyncResult<()> {
        let mut state = self.lock();
        Self::reachable(&state)?;
        state.journal.push(AdminCall::ReloadUsers);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::NodeAddr;

    fn backend(hostgroup: u32, host: &str) -> RouterBackend {
        RouterBackend::new(hostgroup, &NodeAddr::new(host, 3306))
    }

    #[tokio::test]
    async fn test_find_empty_is_not_found() {
        let admin = InMemoryRouterAdmin::with_rows([backend(10, "db1")]);
        let err = admin.find_backends(Some(11), None).await.unwrap_err();
        assert!(matches!(err, SyncError::BackendNotFound { hostgroup: 11 }));

        let rows = admin
            .find_backends(Some(10), Some(BackendStatus::Online))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_deregister_keeps_row() {
        let admin = InMemoryRouterAdmin::with_rows([backend(10, "db1")]);
        admin.deregister_backend(&backend(10, "db1")).await.unwrap();
        assert_eq!(
            admin.row(10, "db1", 3306).map(|b| b.status),
            Some(BackendStatus::OfflineHard)
        );
        assert_eq!(admin.writes(), 1);
    }

    #[tokio::test]
    async fn test_set_status_on_missing_row() {
        let admin = InMemoryRouterAdmin::new();
        let err = admin
            .set_status(&backend(11, "db1"), BackendStatus::OfflineSoft)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::BackendUnregistered { .. }));
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let admin = InMemoryRouterAdmin::new();
        admin.fail_writes_after(1);
        admin.register_backend(&backend(10, "db1")).await.unwrap();
        assert!(admin.register_backend(&backend(11, "db1")).await.is_err());
        // Reload is not a table write and still goes through.
        admin.reload_runtime().await.unwrap();
        assert_eq!(admin.reloads(), 1);
    }
}
