//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML file.
//! Every section has defaults so a minimal file only names the cluster and
//! the credentials.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::endpoint::parse_host_list_lenient;
use crate::net::{Credentials, Endpoint, NodeAddr};
use crate::reconcile::{ReconcileRequest, WriterBlacklist};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// ProxySQL admin interface.
    pub proxysql: ProxySqlConfig,

    /// Galera cluster and hostgroup layout.
    pub galera: GaleraConfig,

    /// Connect timeouts.
    pub timeouts: TimeoutConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

impl RouterConfig {
    /// Pass parameters derived from the `[galera]` section.
    pub fn reconcile_request(&self) -> ReconcileRequest {
        ReconcileRequest {
            writer_hostgroup: self.galera.writer_hostgroup_id,
            reader_hostgroup: self.galera.reader_hostgroup_id,
            seeds: parse_host_list_lenient(&self.galera.cluster_host),
            blacklist: self
                .galera
                .writer_blacklist
                .as_deref()
                .map(WriterBlacklist::parse)
                .unwrap_or_default(),
        }
    }
}

/// ProxySQL admin interface configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySqlConfig {
    /// Admin interface host.
    pub host: String,

    /// Admin interface port.
    pub admin_port: u16,

    pub admin_username: String,

    pub admin_password: String,

    /// Unix socket of the admin interface. Takes precedence over host/port.
    pub admin_socket: Option<PathBuf>,

    /// Credentials ProxySQL should monitor backends with.
    pub monitor_username: Option<String>,

    pub monitor_password: Option<String>,
}

impl ProxySqlConfig {
    pub fn endpoint(&self) -> Endpoint {
        match &self.admin_socket {
            Some(path) => Endpoint::Socket(path.clone()),
            None => Endpoint::Tcp(NodeAddr::new(self.host.clone(), self.admin_port)),
        }
    }

    pub fn admin_credentials(&self) -> Credentials {
        Credentials::new(self.admin_username.clone(), self.admin_password.clone())
    }

    /// Monitor credentials, when a monitor user is configured.
    pub fn monitor_credentials(&self) -> Option<Credentials> {
        self.monitor_username.as_ref().map(|user| {
            Credentials::new(user.clone(), self.monitor_password.clone().unwrap_or_default())
        })
    }
}

impl Default for ProxySqlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            admin_port: 6032,
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            admin_socket: None,
            monitor_username: None,
            monitor_password: None,
        }
    }
}

impl std::fmt::Debug for ProxySqlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxySqlConfig")
            .field("host", &self.host)
            .field("admin_port", &self.admin_port)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<redacted>")
            .field("admin_socket", &self.admin_socket)
            .field("monitor_username", &self.monitor_username)
            .field("monitor_password", &self.monitor_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Galera cluster configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GaleraConfig {
    /// Discovery seeds, "host:port,host:port".
    pub cluster_host: String,

    pub cluster_username: String,

    pub cluster_password: String,

    /// Only "singlewriter" is supported.
    pub load_balancing_mode: String,

    pub writer_hostgroup_id: u32,

    pub reader_hostgroup_id: u32,

    /// Nodes elected writer only as a last resort, "host:port,host:port".
    pub writer_blacklist: Option<String>,
}

impl GaleraConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.cluster_username.clone(), self.cluster_password.clone())
    }
}

impl Default for GaleraConfig {
    fn default() -> Self {
        Self {
            cluster_host: String::new(),
            cluster_username: "root".to_string(),
            cluster_password: String::new(),
            load_balancing_mode: "singlewriter".to_string(),
            writer_hostgroup_id: 10,
            reader_hostgroup_id: 11,
            writer_blacklist: None,
        }
    }
}

impl std::fmt::Debug for GaleraConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaleraConfig")
            .field("cluster_host", &self.cluster_host)
            .field("cluster_username", &self.cluster_username)
            .field("cluster_password", &"<redacted>")
            .field("load_balancing_mode", &self.load_balancing_mode)
            .field("writer_hostgroup_id", &self.writer_hostgroup_id)
            .field("reader_hostgroup_id", &self.reader_hostgroup_id)
            .field("writer_blacklist", &self.writer_blacklist)
            .finish()
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connect timeout for cluster nodes in seconds.
    pub node_connect_secs: u64,

    /// Connect timeout for the admin interface in seconds.
    pub admin_connect_secs: u64,
}

impl TimeoutConfig {
    pub fn node_connect(&self) -> Duration {
        Duration::from_secs(self.node_connect_secs)
    }

    pub fn admin_connect(&self) -> Duration {
        Duration::from_secs(self.admin_connect_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            node_connect_secs: 5,
            admin_connect_secs: 20,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// "pretty" for humans, "json" for log shippers.
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}
