//! Accounts in the router's `mysql_users` table.
//!
//! # Responsibilities
//! - Model one `mysql_users` row, keyed by (username, backend)
//! - List, create, modify, re-password and delete accounts through any
//!   [`RouterAdmin`], reloading `mysql_users` after every change

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::registry::admin::RouterAdmin;

pub const DEFAULT_SCHEMA: &str = "information_schema";

/// One `mysql_users` row.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterUser {
    pub username: String,
    pub password: String,
    pub active: bool,
    pub use_ssl: bool,
    pub default_hostgroup: u32,
    pub default_schema: Option<String>,
    pub schema_locked: bool,
    pub transaction_persistent: bool,
    pub fast_forward: bool,
    pub backend: bool,
    pub frontend: bool,
    pub max_connections: u32,
}

impl RouterUser {
    /// An active account usable both towards clients and towards the nodes.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            active: true,
            use_ssl: false,
            default_hostgroup: 0,
            default_schema: Some(DEFAULT_SCHEMA.to_string()),
            schema_locked: false,
            transaction_persistent: false,
            fast_forward: false,
            backend: true,
            frontend: true,
            max_connections: 10000,
        }
    }

    /// Same row in `mysql_users` (its primary key).
    pub fn same_row(&self, other: &RouterUser) -> bool {
        self.username == other.username && self.backend == other.backend
    }
}

impl fmt::Debug for RouterUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterUser")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("active", &self.active)
            .field("default_hostgroup", &self.default_hostgroup)
            .field("backend", &self.backend)
            .field("frontend", &self.frontend)
            .finish_non_exhaustive()
    }
}

/// Column changes for an existing account. `None` leaves a column alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub active: Option<bool>,
    pub use_ssl: Option<bool>,
    pub default_hostgroup: Option<u32>,
    pub default_schema: Option<String>,
    pub schema_locked: Option<bool>,
    pub transaction_persistent: Option<bool>,
    pub fast_forward: Option<bool>,
    pub backend: Option<bool>,
    pub frontend: Option<bool>,
    pub max_connections: Option<u32>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        *self == UserChanges::default()
    }

    pub fn apply(&self, user: &mut RouterUser) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }
        set(&mut user.active, &self.active);
        set(&mut user.use_ssl, &self.use_ssl);
        set(&mut user.default_hostgroup, &self.default_hostgroup);
        if let Some(schema) = &self.default_schema {
            user.default_schema = Some(schema.clone());
        }
        set(&mut user.schema_locked, &self.schema_locked);
        set(&mut user.transaction_persistent, &self.transaction_persistent);
        set(&mut user.fast_forward, &self.fast_forward);
        set(&mut user.backend, &self.backend);
        set(&mut user.frontend, &self.frontend);
        set(&mut user.max_connections, &self.max_connections);
    }
}

pub async fn list_users<A>(admin: &A) -> SyncResult<Vec<RouterUser>>
where
    A: RouterAdmin + ?Sized,
{
    admin.find_users(None).await
}

/// Upsert `user` and reload.
pub async fn create_user<A>(admin: &A, user: &RouterUser) -> SyncResult<()>
where
    A: RouterAdmin + ?Sized,
{
    admin.upsert_user(user).await?;
    admin.reload_users().await?;
    tracing::info!(user = %user.username, "User created");
    Ok(())
}

async fn existing_rows<A>(admin: &A, username: &str) -> SyncResult<Vec<RouterUser>>
where
    A: RouterAdmin + ?Sized,
{
    let rows = admin.find_users(Some(username)).await?;
    if rows.is_empty() {
        return Err(SyncError::UserNotFound {
            username: username.to_string(),
        });
    }
    Ok(rows)
}

/// Change the password on every row of `username`.
pub async fn set_password<A>(admin: &A, username: &str, password: &str) -> SyncResult<()>
where
    A: RouterAdmin + ?Sized,
{
    for mut row in existing_rows(admin, username).await? {
        row.password = password.to_string();
        admin.upsert_user(&row).await?;
    }
    admin.reload_users().await?;
    tracing::info!(user = %username, "Password changed");
    Ok(())
}

/// Apply `changes` to every row of `username`.
///
/// The old rows are removed first, since `backend` is part of the key.
pub async fn modify_user<A>(admin: &A, username: &str, changes: &UserChanges) -> SyncResult<()>
where
    A: RouterAdmin + ?Sized,
{
    let mut rows = existing_rows(admin, username).await?;
    if changes.is_empty() {
        return Ok(());
    }
    for row in &mut rows {
        changes.apply(row);
    }

    admin.delete_user(username).await?;
    let mut written: Vec<&RouterUser> = Vec::new();
    for row in &rows {
        if written.iter().any(|w| w.same_row(row)) {
            continue;
        }
        admin.upsert_user(row).await?;
        written.push(row);
    }
    admin.reload_users().await?;
    tracing::info!(user = %username, rows = written.len(), "User modified");
    Ok(())
}

/// Remove every row of `username`.
pub async fn delete_user<A>(admin: &A, username: &str) -> SyncResult<()>
where
    A: RouterAdmin + ?Sized,
{
    if admin.delete_user(username).await? == 0 {
        return Err(SyncError::UserNotFound {
            username: username.to_string(),
        });
    }
    admin.reload_users().await?;
    tracing::info!(user = %username, "User deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::memory::{AdminCall, InMemoryRouterAdmin};

    #[test]
    fn test_debug_redacts_password() {
        let user = RouterUser::new("app", "s3cret");
        let debug = format!("{:?}", user);
        assert!(debug.contains("app"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_changes_apply_only_given_columns() {
        let mut user = RouterUser::new("app", "pw");
        let changes = UserChanges {
            active: Some(false),
            default_hostgroup: Some(10),
            default_schema: Some("shop".to_string()),
            ..Default::default()
        };
        changes.apply(&mut user);

        assert!(!user.active);
        assert_eq!(user.default_hostgroup, 10);
        assert_eq!(user.default_schema.as_deref(), Some("shop"));
        assert!(user.frontend);
        assert_eq!(user.max_connections, 10000);
        assert!(UserChanges::default().is_empty());
        assert!(!changes.is_empty());
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let admin = InMemoryRouterAdmin::new();
        create_user(&admin, &RouterUser::new("app", "pw")).await.unwrap();

        let users = list_users(&admin).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "app");
        assert_eq!(admin.journal().last(), Some(&AdminCall::ReloadUsers));
    }

    #[tokio::test]
    async fn test_set_password_on_missing_user() {
        let admin = InMemoryRouterAdmin::new();
        let err = set_password(&admin, "ghost", "pw").await.unwrap_err();
        assert!(matches!(err, SyncError::UserNotFound { .. }));
        assert!(admin.journal().is_empty());
    }

    #[tokio::test]
    async fn test_set_password_updates_every_row() {
        let admin = InMemoryRouterAdmin::new();
        let mut frontend_only = RouterUser::new("app", "old");
        frontend_only.backend = false;
        admin.upsert_user(&frontend_only).await.unwrap();
        admin.upsert_user(&RouterUser::new("app", "old")).await.unwrap();

        set_password(&admin, "app", "it's\\new").await.unwrap();
        let users = admin.find_users(Some("app")).await.unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u| u.password == "it's\\new"));
    }

    #[tokio::test]
    async fn test_modify_rekeys_row() {
        let admin = InMemoryRouterAdmin::new();
        admin.upsert_user(&RouterUser::new("app", "pw")).await.unwrap();

        let changes = UserChanges {
            backend: Some(false),
            max_connections: Some(50),
            ..Default::default()
        };
        modify_user(&admin, "app", &changes).await.unwrap();

        let users = admin.find_users(Some("app")).await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(!users[0].backend);
        assert_eq!(users[0].max_connections, 50);
        assert_eq!(users[0].password, "pw");
    }

    #[tokio::test]
    async fn test_modify_missing_user() {
        let admin = InMemoryRouterAdmin::new();
        let changes = UserChanges {
            active: Some(false),
            ..Default::default()
        };
        let err = modify_user(&admin, "ghost", &changes).await.unwrap_err();
        assert!(matches!(err, SyncError::UserNotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let admin = InMemoryRouterAdmin::new();
        admin.upsert_user(&RouterUser::new("app", "pw")).await.unwrap();

        delete_user(&admin, "app").await.unwrap();
        assert!(list_users(&admin).await.unwrap().is_empty());

        let err = delete_user(&admin, "app").await.unwrap_err();
        assert!(matches!(err, SyncError::UserNotFound { .. }));
    }
}
