//! A single Galera cluster member and its reported health.
//!
//! # Responsibilities
//! - Model the status variables that matter for routing
//! - Build a `ClusterNode` from `SHOW GLOBAL STATUS` / `@@global` values
//!
//! # Design Decisions
//! - Identity is host + port only; the health fields are a snapshot
//! - A node is rebuilt from scratch on every pass and never persisted

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::error::NodeError;
use crate::net::NodeAddr;

/// Whether the node's component holds quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterStatus {
    Primary,
    NonPrimary,
}

impl ClusterStatus {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("primary") {
            ClusterStatus::Primary
        } else {
            ClusterStatus::NonPrimary
        }
    }
}

/// Galera local FSM state (`wsrep_local_state`).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocalState {
    Joining = 1,
    DonorDesynced = 2,
    Joined = 3,
    Synced = 4,
}

impl TryFrom<u8> for LocalState {
    type Error = u8;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            1 => Ok(LocalState::Joining),
            2 => Ok(LocalState::DonorDesynced),
            3 => Ok(LocalState::Joined),
            4 => Ok(LocalState::Synced),
            other => Err(other),
        }
    }
}

impl fmt::Display for LocalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LocalState::Joining => "JOINING",
            LocalState::DonorDesynced => "DONOR_DESYNCED",
            LocalState::Joined => "JOINED",
            LocalState::Synced => "SYNCED",
        };
        f.write_str(name)
    }
}

/// Status variable names read from a node.
pub mod vars {
    pub const CLUSTER_STATE_UUID: &str = "wsrep_cluster_state_uuid";
    pub const CLUSTER_STATUS: &str = "wsrep_cluster_status";
    pub const LOCAL_STATE: &str = "wsrep_local_state";
    pub const CLUSTER_NAME: &str = "wsrep_cluster_name";
    pub const INCOMING_ADDRESSES: &str = "wsrep_incoming_addresses";
    pub const REJECT_QUERIES: &str = "wsrep_reject_queries";
    pub const DONOR_REJECTS_QUERIES: &str = "wsrep_sst_donor_rejects_queries";
}

/// One Galera cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterNode {
    pub addr: NodeAddr,
    pub cluster_name: String,
    pub cluster_state_uuid: Uuid,
    pub cluster_status: ClusterStatus,
    pub local_state: LocalState,
    /// `wsrep_reject_queries` is anything but `NONE`.
    pub reject_queries: bool,
    /// `wsrep_sst_donor_rejects_queries` is `ON`.
    pub donor_rejects_queries: bool,
}

impl ClusterNode {
    /// Build a node from status and global variables. Keys are matched
    /// case-insensitively; the two reject flags default to off when absent.
    pub fn from_variables(
        addr: NodeAddr,
        variables: &HashMap<String, String>,
    ) -> Result<Self, NodeError> {
        let lookup: HashMap<String, &str> = variables
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
            .collect();
        let required = |name: &str| {
            lookup
                .get(name)
                .copied()
                .ok_or_else(|| NodeError::Malformed(format!("missing {}", name)))
        };

        let uuid_raw = required(vars::CLUSTER_STATE_UUID)?;
        let cluster_state_uuid = Uuid::parse_str(uuid_raw.trim()).map_err(|e| {
            NodeError::Malformed(format!("{} '{}': {}", vars::CLUSTER_STATE_UUID, uuid_raw, e))
        })?;

        let state_raw = required(vars::LOCAL_STATE)?;
        let local_state = state_raw
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(|n| LocalState::try_from(n).ok())
            .ok_or_else(|| {
                NodeError::Malformed(format!("{} '{}'", vars::LOCAL_STATE, state_raw))
            })?;

        let reject_queries = lookup
            .get(vars::REJECT_QUERIES)
            .map(|v| !v.trim().eq_ignore_ascii_case("none"))
            .unwrap_or(false);
        let donor_rejects_queries = lookup
            .get(vars::DONOR_REJECTS_QUERIES)
            .map(|v| is_on(v))
            .unwrap_or(false);

        Ok(Self {
            addr,
            cluster_name: required(vars::CLUSTER_NAME)?.to_string(),
            cluster_state_uuid,
            cluster_status: ClusterStatus::parse(required(vars::CLUSTER_STATUS)?),
            local_state,
            reject_queries,
            donor_rejects_queries,
        })
    }

    pub fn is_primary(&self) -> bool {
        self.cluster_status == ClusterStatus::Primary
    }

    pub fn is_donor(&self) -> bool {
        self.local_state == LocalState::DonorDesynced
    }

    /// True when the node may receive traffic while the cluster's candidate
    /// tier is `tier`.
    pub fn serves_in_tier(&self, tier: LocalState) -> bool {
        if !self.is_primary() || self.local_state != tier || self.reject_queries {
            return false;
        }
        !(self.is_donor() && self.donor_rejects_queries)
    }
}

impl fmt::Display for ClusterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr.fmt(f)
    }
}

fn is_on(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "1" | "yes" | "true"
    )
}
