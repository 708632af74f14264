//! Scoped MySQL-protocol sessions.
//!
//! # Responsibilities
//! - Open one connection per operation with a bounded connect timeout
//! - Run text-protocol statements (the ProxySQL admin interface has no
//!   prepared statements)
//! - Tag every session with an id for tracing
//!
//! # Design Decisions
//! - No connection is cached; callers open, use, and `close` in one scope
//! - Dropping a `Session` on an error path still releases the socket

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Executor, Row};
use thiserror::Error;

use crate::net::endpoint::{Credentials, Endpoint};
use crate::resilience::timeouts::with_deadline;

/// Global atomic counter for session IDs.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

/// A result row with every column rendered as text.
pub type TextRow = HashMap<String, Option<String>>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("timeout after {0} seconds")]
    Timeout(u64),

    #[error("cannot connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("statement failed: {0}")]
    Statement(String),
}

/// One open connection. Close it with [`Session::close`].
pub struct Session {
    conn: MySqlConnection,
    id: SessionId,
    timeout: Duration,
}

impl Session {
    /// Connect to `endpoint`, giving up after `timeout`.
    pub async fn open(
        endpoint: &Endpoint,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self, SessionError> {
        // Skip the session variables sqlx sets by default; the admin interface rejects them.
        let options = MySqlConnectOptions::new()
            .username(&credentials.username)
            .password(&credentials.password)
            .pipes_as_concat(false)
            .no_engine_substitution(false)
            .timezone(None)
            .set_names(false);
        let options = match endpoint {
            Endpoint::Tcp(addr) => options.host(&addr.host).port(addr.port),
            Endpoint::Socket(path) => options.socket(path),
        };

        let conn = with_deadline(timeout, MySqlConnection::connect_with(&options))
            .await
            .map_err(|_| SessionError::Timeout(timeout.as_secs()))?
            .map_err(|e| SessionError::Connect {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let id = SessionId::new();
        tracing::trace!(session = %id, endpoint = %endpoint, "Session opened");
        Ok(Self { conn, id, timeout })
    }

    /// Run a statement that returns rows.
    pub async fn query(&mut self, sql: &str) -> Result<Vec<TextRow>, SessionError> {
        tracing::trace!(session = %self.id, sql = %sql, "query");
        let rows = with_deadline(self.timeout, (&mut self.conn).fetch_all(sqlx::raw_sql(sql)))
            .await
            .map_err(|_| SessionError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| SessionError::Statement(e.to_string()))?;

        rows.iter()
            .map(text_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SessionError::Statement(e.to_string()))
    }

    /// Run a statement and return the number of affected rows.
    pub async fn execute(&mut self, sql: &str) -> Result<u64, SessionError> {
        tracing::trace!(session = %self.id, sql = %sql, "execute");
        let result = with_deadline(self.timeout, (&mut self.conn).execute(sqlx::raw_sql(sql)))
            .await
            .map_err(|_| SessionError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| SessionError::Statement(e.to_string()))?;
        Ok(result.rows_affected())
    }

    pub async fn close(self) {
        let id = self.id;
        if let Err(e) = self.conn.close().await {
            tracing::debug!(session = %id, error = %e, "Session close failed");
        } else {
            tracing::trace!(session = %id, "Session closed");
        }
    }
}

fn text_row(row: &MySqlRow) -> Result<TextRow, sqlx::Error> {
    row.columns()
        .iter()
        .map(|column| {
            let value: Option<String> = row.try_get_unchecked(column.ordinal())?;
            Ok((column.name().to_string(), value))
        })
        .collect()
}

/// Quote a string literal.
///
/// The ProxySQL admin interface evaluates statements with SQLite, where a
/// backslash is an ordinary character and only `'` needs doubling.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}
