//! Scripted in-memory cluster.
//!
//! Implements [`NodeHealthAccessor`] over a table of members so discovery and
//! reconciliation can be exercised without live database nodes.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::cluster::accessor::NodeHealthAccessor;
use crate::cluster::node::{ClusterNode, ClusterStatus, LocalState};
use crate::error::NodeError;
use crate::net::NodeAddr;

#[derive(Debug, Clone)]
struct Member {
    node: ClusterNode,
    peers: Option<Vec<NodeAddr>>,
    unreachable: bool,
    /// Number of successful `fetch_node` calls before the node stops answering.
    answers_left: Option<usize>,
    desynced: bool,
}

#[derive(Debug, Default)]
pub struct InMemoryCluster {
    members: Mutex<Vec<Member>>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a healthy primary member of the cluster identified by `uuid`.
    pub fn member(addr: NodeAddr, state: LocalState, uuid: Uuid) -> ClusterNode {
        ClusterNode {
            addr,
            cluster_name: "galera".to_string(),
            cluster_state_uuid: uuid,
            cluster_status: ClusterStatus::Primary,
            local_state: state,
            reject_queries: false,
            donor_rejects_queries: false,
        }
    }

    /// Add or replace a member. Its peer list defaults to every member added.
    pub fn add(&self, node: ClusterNode) {
        let mut members = self.lock();
        let member = Member {
            node,
            peers: None,
            unreachable: false,
            answers_left: None,
            desynced: false,
        };
        match members.iter_mut().find(|m| m.node.addr == member.node.addr) {
            Some(existing) => *existing = member,
            None => members.push(member),
        }
    }

    pub fn remove(&self, addr: &NodeAddr) {
        self.lock().retain(|m| &m.node.addr != addr);
    }

    pub fn set_state(&self, addr: &NodeAddr, state: LocalState) {
        self.update(addr, |m| m.node.local_state = state);
    }

    pub fn set_cluster_status(&self, addr: &NodeAddr, status: ClusterStatus) {
        self.update(addr, |m| m.node.cluster_status = status);
    }

    pub fn set_reject_queries(&self, addr: &NodeAddr, reject: bool) {
        self.update(addr, |m| m.node.reject_queries = reject);
    }

    pub fn set_donor_rejects_queries(&self, addr: &NodeAddr, reject: bool) {
        self.update(addr, |m| m.node.donor_rejects_queries = reject);
    }

    /// Override what `addr` reports in `wsrep_incoming_addresses`.
    pub fn set_peers(&self, addr: &NodeAddr, peers: Vec<NodeAddr>) {
        self.update(addr, |m| m.peers = Some(peers));
    }

    pub fn set_unreachable(&self, addr: &NodeAddr, unreachable: bool) {
        self.update(addr, |m| m.unreachable = unreachable);
    }

    /// Let `addr` answer `answers` more status reads, then time out.
    pub fn fail_after(&self, addr: &NodeAddr, answers: usize) {
        self.update(addr, |m| m.answers_left = Some(answers));
    }

    pub fn is_desynced(&self, addr: &NodeAddr) -> bool {
        self.lock()
            .iter()
            .any(|m| &m.node.addr == addr && m.desynced)
    }

    fn update(&self, addr: &NodeAddr, f: impl FnOnce(&mut Member)) {
        if let Some(member) = self.lock().iter_mut().find(|m| &m.node.addr == addr) {
            f(member);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Member>> {
        // A panicking test thread must not hide the cluster from the others.
        self.members.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl NodeHealthAccessor for InMemoryCluster {
    async fn fetch_node(&self, addr: &NodeAddr) -> Result<ClusterNode, NodeError> {
        let mut members = self.lock();
        let member = members
            .iter_mut()
            .find(|m| &m.node.addr == addr)
            .ok_or_else(|| NodeError::Connect(format!("no route to {}", addr)))?;

        if member.unreachable {
            return Err(NodeError::Connect(format!("connection refused by {}", addr)));
        }
        match member.answers_left {
            Some(0) => return Err(NodeError::Timeout(5)),
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        Ok(member.node.clone())
    }

    async fn peer_addresses(&self, addr: &NodeAddr) -> Result<Vec<NodeAddr>, NodeError> {
        let members = self.lock();
        let member = members
            .iter()
            .find(|m| &m.node.addr == addr)
            .ok_or_else(|| NodeError::Connect(format!("no route to {}", addr)))?;
        if member.unreachable {
            return Err(NodeError::Connect(format!("connection refused by {}", addr)));
        }
        Ok(member
            .peers
            .clone()
            .unwrap_or_else(|| members.iter().map(|m| m.node.addr.clone()).collect()))
    }

    async fn set_desync(&self, addr: &NodeAddr, desync: bool) -> Result<(), NodeError> {
        let mut found = false;
        self.update(addr, |m| {
            m.desynced = desync;
            found = true;
        });
        if found {
            Ok(())
        } else {
            Err(NodeError::Connect(format!("no route to {}", addr)))
        }
    }
}
