//! ProxySQL admin interface client.
//!
//! # Responsibilities
//! - Read and write `mysql_servers` rows over the admin interface
//! - Update `global_variables`
//! - Read and write `mysql_users`
//! - Load the configuration tables to runtime and persist servers to disk
//!
//! # Design Decisions
//! - The admin interface speaks the text protocol only; values are quoted
//!   with [`quote`] and never bound
//! - Any connect or statement failure is `SyncError::AdminConnection`

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{SyncError, SyncResult};
use crate::net::connection::{quote, SessionError};
use crate::net::{Credentials, Endpoint, Session, TextRow};
use crate::registry::admin::RouterAdmin;
use crate::registry::annotation;
use crate::registry::backend::{BackendStatus, RouterBackend};
use crate::registry::user::RouterUser;

const SERVER_COLUMNS: &str = "hostgroup_id, hostname, port, status, weight, compression, \
     max_connections, max_replication_lag, use_ssl, max_latency_ms, comment";

const USER_COLUMNS: &str = "username, password, active, use_ssl, default_hostgroup, \
     default_schema, schema_locked, transaction_persistent, fast_forward, backend, frontend, \
     max_connections";

impl From<SessionError> for SyncError {
    fn from(e: SessionError) -> Self {
        SyncError::AdminConnection(e.to_string())
    }
}

/// Admin client opening one session per operation.
#[derive(Debug, Clone)]
pub struct ProxySqlAdmin {
    endpoint: Endpoint,
    credentials: Credentials,
    connect_timeout: Duration,
}

impl ProxySqlAdmin {
    pub fn new(endpoint: Endpoint, credentials: Credentials, connect_timeout: Duration) -> Self {
        Self {
            endpoint,
            credentials,
            connect_timeout,
        }
    }

    async fn session(&self) -> SyncResult<Session> {
        let session = Session::open(&self.endpoint, &self.credentials, self.connect_timeout).await?;
        Ok(session)
    }

    /// Run `statements` in order on one session, stopping at the first failure.
    async fn execute_all(&self, statements: &[String]) -> SyncResult<u64> {
        let mut session = self.session().await?;
        let mut affected = 0;
        let mut result = Ok(());
        for sql in statements {
            match session.execute(sql).await {
                Ok(n) => affected += n,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        session.close().await;
        result?;
        Ok(affected)
    }
}

fn select_servers(hostgroup: Option<u32>, status: Option<BackendStatus>) -> String {
    let mut filters = Vec::new();
    if let Some(hostgroup) = hostgroup {
        filters.push(format!("hostgroup_id = {}", hostgroup));
    }
    if let Some(status) = status {
        filters.push(format!("status = {}", quote(status.as_str())));
    }
    let mut sql = format!("SELECT {} FROM mysql_servers", SERVER_COLUMNS);
    if !filters.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&filters.join(" AND "));
    }
    sql.push_str(" ORDER BY hostgroup_id, hostname, port");
    sql
}

fn replace_server(backend: &RouterBackend) -> String {
    let comment = annotation::encode(&backend.annotation)
        .map(|c| quote(&c))
        .unwrap_or_else(|| "NULL".to_string());
    format!(
        "REPLACE INTO mysql_servers ({}) VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {})",
        SERVER_COLUMNS,
        backend.hostgroup_id,
        quote(&backend.hostname),
        backend.port,
        quote(backend.status.as_str()),
        backend.weight,
        backend.compression,
        backend.max_connections,
        backend.max_replication_lag,
        u8::from(backend.use_ssl),
        backend.max_latency_ms,
        comment,
    )
}

fn row_filter(backend: &RouterBackend) -> String {
    format!(
        "hostgroup_id = {} AND hostname = {} AND port = {}",
        backend.hostgroup_id,
        quote(&backend.hostname),
        backend.port
    )
}

fn update_status(backend: &RouterBackend, status: BackendStatus) -> String {
    format!(
        "UPDATE mysql_servers SET status = {} WHERE {}",
        quote(status.as_str()),
        row_filter(backend)
    )
}

fn update_variable(name: &str, value: &str) -> String {
    format!(
        "UPDATE global_variables SET variable_value = {} WHERE variable_name = {}",
        quote(value),
        quote(name)
    )
}

fn select_users(username: Option<&str>) -> String {
    let mut sql = format!("SELECT {} FROM mysql_users", USER_COLUMNS);
    if let Some(username) = username {
        sql.push_str(&format!(" WHERE username = {}", quote(username)));
    }
    sql.push_str(" ORDER BY username, backend");
    sql
}

fn replace_user(user: &RouterUser) -> String {
    let bit = |b: bool| u8::from(b);
    let schema = user
        .default_schema
        .as_deref()
        .map(quote)
        .unwrap_or_else(|| "NULL".to_string());
    format!(
        "REPLACE INTO mysql_users ({}) VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {})",
        USER_COLUMNS,
        quote(&user.username),
        quote(&user.password),
        bit(user.active),
        bit(user.use_ssl),
        user.default_hostgroup,
        schema,
        bit(user.schema_locked),
        bit(user.transaction_persistent),
        bit(user.fast_forward),
        bit(user.backend),
        bit(user.frontend),
        user.max_connections,
    )
}

fn column<'a>(row: &'a TextRow, name: &str) -> Option<&'a str> {
    row.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .and_then(|(_, v)| v.as_deref())
}

fn number<T: std::str::FromStr>(row: &TextRow, name: &str) -> Result<T, String> {
    let text = column(row, name).ok_or_else(|| format!("missing column {}", name))?;
    text.trim()
        .parse()
        .map_err(|_| format!("column {} has invalid value '{}'", name, text))
}

/// Parse one `mysql_servers` row.
pub(crate) fn backend_from_row(row: &TextRow) -> Result<RouterBackend, String> {
    let hostname = column(row, "hostname")
        .ok_or("missing column hostname")?
        .to_string();
    let status = column(row, "status")
        .ok_or("missing column status")?
        .parse::<BackendStatus>()?;

    Ok(RouterBackend {
        hostgroup_id: number(row, "hostgroup_id")?,
        hostname,
        port: number(row, "port")?,
        status,
        weight: number(row, "weight")?,
        compression: number(row, "compression")?,
        max_connections: number(row, "max_connections")?,
        max_replication_lag: number(row, "max_replication_lag")?,
        use_ssl: number::<u8>(row, "use_ssl")? != 0,
        max_latency_ms: number(row, "max_latency_ms")?,
        annotation: annotation::decode(column(row, "comment")),
    })
}

fn flag(row: &TextRow, name: &str) -> Result<bool, String> {
    Ok(number::<u8>(row, name)? != 0)
}

/// Parse one `mysql_users` row.
pub(crate) fn user_from_row(row: &TextRow) -> Result<RouterUser, String> {
    Ok(RouterUser {
        username: column(row, "username")
            .ok_or("missing column username")?
            .to_string(),
        password: column(row, "password").unwrap_or_default().to_string(),
        active: flag(row, "active")?,
        use_ssl: flag(row, "use_ssl")?,
        default_hostgroup: number(row, "default_hostgroup")?,
        default_schema: column(row, "default_schema").map(str::to_string),
        schema_locked: flag(row, "schema_locked")?,
        transaction_persistent: flag(row, "transaction_persistent")?,
        fast_forward: flag(row, "fast_forward")?,
        backend: flag(row, "backend")?,
        frontend: flag(row, "frontend")?,
        max_connections: number(row, "max_connections")?,
    })
}

#[async_trait]
impl RouterAdmin for ProxySqlAdmin {
    async fn ping(&self) -> SyncResult<()> {
        let mut session = self.session().await?;
        let result = session.query("SELECT 1").await;
        session.close().await;
        result?;
        Ok(())
    }

    async fn find_backends(
        &self,
        hostgroup: Option<u32>,
        status: Option<BackendStatus>,
    ) -> SyncResult<Vec<RouterBackend>> {
        let mut session = self.session().await?;
        let rows = session.query(&select_servers(hostgroup, status)).await;
        session.close().await;

        let backends = rows?
            .iter()
            .map(backend_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(SyncError::AdminConnection)?;

        if backends.is_empty() {
            return Err(SyncError::BackendNotFound {
                hostgroup: hostgroup.unwrap_or_default(),
            });
        }
        Ok(backends)
    }

    async fn register_backend(&self, backend: &RouterBackend) -> SyncResult<()> {
        self.execute_all(&[replace_server(backend)]).await?;
        tracing::info!(
            backend = %backend,
            status = %backend.status,
            role = ?backend.annotation.role,
            "Backend registered"
        );
        Ok(())
    }

    async fn deregister_backend(&self, backend: &RouterBackend) -> SyncResult<()> {
        self.execute_all(&[update_status(backend, BackendStatus::OfflineHard)])
            .await?;
        tracing::info!(backend = %backend, "Backend deregistered");
        Ok(())
    }

    async fn set_status(&self, backend: &RouterBackend, status: BackendStatus) -> SyncResult<()> {
        let mut session = self.session().await?;
        let result = async {
            let rows = session
                .query(&format!(
                    "SELECT COUNT(*) AS n FROM mysql_servers WHERE {}",
                    row_filter(backend)
                ))
                .await?;
            let registered = rows
                .first()
                .and_then(|row| column(row, "n"))
                .and_then(|n| n.parse::<u64>().ok())
                .unwrap_or(0);
            if registered == 0 {
                return Err(SyncError::BackendUnregistered {
                    backend: backend.to_string(),
                });
            }
            session.execute(&update_status(backend, status)).await?;
            Ok::<(), SyncError>(())
        }
        .await;
        session.close().await;
        result?;

        tracing::info!(backend = %backend, status = %status, "Backend status updated");
        Ok(())
    }

    async fn set_variable(&self, name: &str, value: &str) -> SyncResult<()> {
        self.execute_all(&[update_variable(name, value)]).await?;
        tracing::debug!(variable = %name, "Router variable updated");
        Ok(())
    }

    async fn reload_runtime(&self) -> SyncResult<()> {
        self.execute_all(&[
            "LOAD MYSQL SERVERS TO RUNTIME".to_string(),
            "LOAD MYSQL VARIABLES TO RUNTIME".to_string(),
            "SAVE MYSQL SERVERS TO DISK".to_string(),
            "SAVE MYSQL VARIABLES TO DISK".to_string(),
        ])
        .await?;
        tracing::debug!("Router runtime reloaded");
        Ok(())
    }

    async fn find_users(&self, username: Option<&str>) -> SyncResult<Vec<RouterUser>> {
        let mut session = self.session().await?;
        let rows = session.query(&select_users(username)).await;
        session.close().await;

        rows?
            .iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(SyncError::AdminConnection)
    }

    async fn upsert_user(&self, user: &RouterUser) -> SyncResult<()> {
        self.execute_all(&[replace_user(user)]).await?;
        tracing::debug!(user = %user.username, backend = user.backend, "User row written");
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> SyncResult<u64> {
        self.execute_all(&[format!(
            "DELETE FROM mysql_users WHERE username = {}",
            quote(username)
        )])
        .await
    }

    async fn reload_users(&self) -> SyncResult<()> {
        self.execute_all(&[
            "LOAD MYSQL USERS TO RUNTIME".to_string(),
            "SAVE MYSQL USERS TO DISK".to_string(),
        ])
        .await?;
        tracing::debug!("Router users reloaded");
        Ok(())
    }
}
