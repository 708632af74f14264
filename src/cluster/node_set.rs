//! The discovered membership of one cluster.
//!
//! # Responsibilities
//! - Hold the members found by discovery, in discovery order (seed first)
//! - Look members up by address and by local state
//! - Pick the candidate tier (SYNCED, else DONOR_DESYNCED)

use serde::Serialize;

use crate::cluster::node::{ClusterNode, LocalState};
use crate::net::NodeAddr;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterNodeSet {
    nodes: Vec<ClusterNode>,
}

impl ClusterNodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member. A second node with the same address replaces the first.
    pub fn insert(&mut self, node: ClusterNode) {
        match self.nodes.iter_mut().find(|n| n.addr == node.addr) {
            Some(existing) => *existing = node,
            None => self.nodes.push(node),
        }
    }

    pub fn get(&self, addr: &NodeAddr) -> Option<&ClusterNode> {
        self.nodes.iter().find(|n| &n.addr == addr)
    }

    pub fn contains(&self, addr: &NodeAddr) -> bool {
        self.get(addr).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClusterNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// SYNCED when at least one member is SYNCED, otherwise DONOR_DESYNCED when
    /// at least one member is a donor, otherwise `None`.
    pub fn candidate_tier(&self) -> Option<LocalState> {
        [LocalState::Synced, LocalState::DonorDesynced]
            .into_iter()
            .find(|state| self.nodes.iter().any(|n| n.local_state == *state))
    }

    pub fn addresses(&self) -> Vec<NodeAddr> {
        self.nodes.iter().map(|n| n.addr.clone()).collect()
    }
}

impl FromIterator<ClusterNode> for ClusterNodeSet {
    fn from_iter<T: IntoIterator<Item = ClusterNode>>(iter: T) -> Self {
        let mut set = ClusterNodeSet::new();
        for node in iter {
            set.insert(node);
        }
        set
    }
}

impl<'a> IntoIterator for &'a ClusterNodeSet {
    type Item = &'a ClusterNode;
    type IntoIter = std::slice::Iter<'a, ClusterNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
