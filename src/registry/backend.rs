//! A routing target row in the router's `mysql_servers` table.
//!
//! # Responsibilities
//! - Model backend status, role and the operator override
//! - Keep the tuning columns the engine carries through untouched
//! - Identify a row by (hostgroup, host, port)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::net::NodeAddr;

/// `mysql_servers.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendStatus {
    Online,
    Shunned,
    OfflineSoft,
    OfflineHard,
}

impl BackendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendStatus::Online => "ONLINE",
            BackendStatus::Shunned => "SHUNNED",
            BackendStatus::OfflineSoft => "OFFLINE_SOFT",
            BackendStatus::OfflineHard => "OFFLINE_HARD",
        }
    }
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ONLINE" => Ok(BackendStatus::Online),
            "SHUNNED" => Ok(BackendStatus::Shunned),
            "OFFLINE_SOFT" => Ok(BackendStatus::OfflineSoft),
            "OFFLINE_HARD" => Ok(BackendStatus::OfflineHard),
            other => Err(format!("unknown backend status '{}'", other)),
        }
    }
}

/// What the engine uses a row for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendRole {
    #[default]
    None,
    Reader,
    Writer,
}

/// Role and operator override, stored in the row's `comment` column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub role: BackendRole,
    pub admin_override: Option<BackendStatus>,
}

impl Annotation {
    pub fn role(role: BackendRole) -> Self {
        Self {
            role,
            admin_override: None,
        }
    }
}

/// Row identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendKey {
    pub hostgroup_id: u32,
    pub addr: NodeAddr,
}

impl fmt::Display for BackendKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@hg{}", self.addr, self.hostgroup_id)
    }
}

/// One `mysql_servers` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterBackend {
    pub hostgroup_id: u32,
    pub hostname: String,
    pub port: u16,
    pub status: BackendStatus,
    pub weight: u32,
    pub compression: u32,
    pub max_connections: u32,
    pub max_replication_lag: u32,
    pub use_ssl: bool,
    pub max_latency_ms: u32,
    pub annotation: Annotation,
}

impl RouterBackend {
    /// A new ONLINE row with the router's column defaults.
    pub fn new(hostgroup_id: u32, addr: &NodeAddr) -> Self {
        Self {
            hostgroup_id,
            hostname: addr.host.clone(),
            port: addr.port,
            status: BackendStatus::Online,
            weight: 1,
            compression: 0,
            max_connections: 10_000,
            max_replication_lag: 0,
            use_ssl: false,
            max_latency_ms: 0,
            annotation: Annotation::default(),
        }
    }

    pub fn with_role(mut self, role: BackendRole) -> Self {
        self.annotation.role = role;
        self
    }

    pub fn with_status(mut self, status: BackendStatus) -> Self {
        self.status = status;
        self
    }

    pub fn addr(&self) -> NodeAddr {
        NodeAddr::new(self.hostname.clone(), self.port)
    }

    pub fn key(&self) -> BackendKey {
        BackendKey {
            hostgroup_id: self.hostgroup_id,
            addr: self.addr(),
        }
    }

    pub fn is_at(&self, addr: &NodeAddr) -> bool {
        self.hostname == addr.host && self.port == addr.port
    }

    /// An operator pinned the row OFFLINE_HARD; the engine must leave it there.
    pub fn is_pinned(&self) -> bool {
        self.annotation.admin_override == Some(BackendStatus::OfflineHard)
    }

    /// Removed rows stay in the table as OFFLINE_HARD.
    pub fn is_removed(&self) -> bool {
        self.status == BackendStatus::OfflineHard
    }

    pub fn is_online(&self) -> bool {
        self.status == BackendStatus::Online
    }
}

impl fmt::Display for RouterBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key().fmt(f)
    }
}
