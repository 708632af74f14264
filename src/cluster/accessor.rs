//! Node health accessor port.
//!
//! Abstracts how status is read from a single cluster node so discovery and
//! the reconciliation engine can run against a live cluster or a scripted one.

use async_trait::async_trait;

use crate::cluster::node::ClusterNode;
use crate::error::NodeError;
use crate::net::NodeAddr;

#[async_trait]
pub trait NodeHealthAccessor: Send + Sync {
    /// Read cluster identity, cluster status, local state and the reject flags.
    async fn fetch_node(&self, addr: &NodeAddr) -> Result<ClusterNode, NodeError>;

    /// Read the node's view of the incoming addresses of all members.
    async fn peer_addresses(&self, addr: &NodeAddr) -> Result<Vec<NodeAddr>, NodeError>;

    /// Toggle `wsrep_desync` on the node.
    async fn set_desync(&self, addr: &NodeAddr, desync: bool) -> Result<(), NodeError>;
}
