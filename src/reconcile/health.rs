//! Per-pass node health classification.
//!
//! Every discovered member is probed once more at the start of a pass. The
//! result is folded into a [`NodeHealth`] per address; a probe failure is a
//! classification, not an error.

use std::fmt;

use crate::cluster::node::{ClusterNode, LocalState};
use crate::error::NodeError;
use crate::net::NodeAddr;
use crate::registry::backend::BackendStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeHealth {
    /// Primary, in the candidate tier and accepting queries.
    Routable,
    /// Reachable but not safe to send traffic to.
    Unsafe,
    /// The probe failed.
    Unreachable,
    /// Not part of the discovered membership.
    Absent,
}

impl NodeHealth {
    /// Status a backend row should converge to.
    pub fn target_status(self) -> BackendStatus {
        match self {
            NodeHealth::Routable => BackendStatus::Online,
            NodeHealth::Unsafe => BackendStatus::OfflineSoft,
            NodeHealth::Unreachable | NodeHealth::Absent => BackendStatus::OfflineHard,
        }
    }
}

impl fmt::Display for NodeHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeHealth::Routable => "routable",
            NodeHealth::Unsafe => "unsafe",
            NodeHealth::Unreachable => "unreachable",
            NodeHealth::Absent => "absent",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    addr: NodeAddr,
    health: NodeHealth,
    /// Reachable donor that still serves queries during SST.
    serving_donor: bool,
}

/// Health of every member, in discovery order.
#[derive(Debug, Clone)]
pub struct HealthMap {
    entries: Vec<Entry>,
}

impl HealthMap {
    pub fn classify<I>(tier: LocalState, probes: I) -> Self
    where
        I: IntoIterator<Item = (NodeAddr, Result<ClusterNode, NodeError>)>,
    {
        let entries = probes
            .into_iter()
            .map(|(addr, probe)| match probe {
                Ok(node) => {
                    let health = if node.serves_in_tier(tier) {
                        NodeHealth::Routable
                    } else {
                        NodeHealth::Unsafe
                    };
                    tracing::debug!(
                        node = %addr,
                        state = %node.local_state,
                        health = %health,
                        "Node classified"
                    );
                    let serving_donor = node.is_primary()
                        && node.is_donor()
                        && !node.reject_queries
                        && !node.donor_rejects_queries;
                    Entry {
                        addr,
                        health,
                        serving_donor,
                    }
                }
                Err(e) => {
                    tracing::warn!(node = %addr, error = %e, "Node health check failed");
                    Entry {
                        addr,
                        health: NodeHealth::Unreachable,
                        serving_donor: false,
                    }
                }
            })
            .collect();

        Self { entries }
    }

    pub fn health(&self, addr: &NodeAddr) -> NodeHealth {
        self.entries
            .iter()
            .find(|e| &e.addr == addr)
            .map_or(NodeHealth::Absent, |e| e.health)
    }

    /// Routable members, in discovery order.
    pub fn candidates(&self) -> impl Iterator<Item = &NodeAddr> + '_ {
        self.entries
            .iter()
            .filter(|e| e.health == NodeHealth::Routable)
            .map(|e| &e.addr)
    }

    pub fn is_serving_donor(&self, addr: &NodeAddr) -> bool {
        self.entries
            .iter()
            .any(|e| &e.addr == addr && e.serving_donor)
    }
}
