//! Addresses and credentials for MySQL-protocol endpoints.
//!
//! # Responsibilities
//! - Identify a database node by host and port
//! - Parse `host:port` lists from configuration and status variables
//! - Carry credentials without ever printing the password

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Host and port of a MySQL-protocol server. Identity of a cluster node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeAddr {
    pub host: String,
    pub port: u16,
}

impl NodeAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddrParseError {
    #[error("'{0}' is not in host:port format")]
    MissingPort(String),

    #[error("'{0}' has an empty host")]
    EmptyHost(String),

    #[error("'{0}' has an invalid port")]
    InvalidPort(String),
}

impl FromStr for NodeAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddrParseError::MissingPort(s.to_string()))?;

        let host = host.trim().trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(AddrParseError::EmptyHost(s.to_string()));
        }

        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| AddrParseError::InvalidPort(s.to_string()))?;

        Ok(NodeAddr::new(host, port))
    }
}

/// Parse a comma separated `host:port` list. Any malformed entry fails the whole list.
pub fn parse_host_list(list: &str) -> Result<Vec<NodeAddr>, AddrParseError> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::parse)
        .collect()
}

/// Parse a comma separated `host:port` list, skipping entries that do not parse.
pub fn parse_host_list_lenient(list: &str) -> Vec<NodeAddr> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| match item.parse() {
            Ok(addr) => Some(addr),
            Err(e) => {
                tracing::warn!(entry = %item, error = %e, "Skipping malformed address");
                None
            }
        })
        .collect()
}

/// MySQL user and password.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where to reach a server: TCP or a local unix socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(NodeAddr),
    Socket(PathBuf),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => addr.fmt(f),
            Endpoint::Socket(path) => write!(f, "unix:{}", path.display()),
        }
    }
}
