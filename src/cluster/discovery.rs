//! Cluster membership discovery.
//!
//! # Responsibilities
//! - Verify the seed node belongs to the primary component
//! - Enumerate members from the seed's incoming address list
//! - Keep only peers that are primary and share the seed's state UUID
//! - Fall back to the next seed when one cannot be trusted
//!
//! # Design Decisions
//! - A peer from another cluster (UUID mismatch) is dropped quietly
//! - A peer whose status cannot be read aborts discovery for that seed;
//!   membership built from a partial view would be wrong

use crate::cluster::accessor::NodeHealthAccessor;
use crate::cluster::node_set::ClusterNodeSet;
use crate::error::{SyncError, SyncResult};
use crate::net::NodeAddr;

/// Discover membership starting from a single seed.
pub async fn discover<A>(accessor: &A, seed: &NodeAddr) -> SyncResult<ClusterNodeSet>
where
    A: NodeHealthAccessor + ?Sized,
{
    let seed_node = accessor
        .fetch_node(seed)
        .await
        .map_err(|e| e.into_unknown_state(seed))?;

    if !seed_node.is_primary() {
        return Err(SyncError::NonPrimaryNode {
            node: seed.to_string(),
        });
    }

    let peers = accessor
        .peer_addresses(seed)
        .await
        .map_err(|e| e.into_unknown_state(seed))?;

    let mut members = ClusterNodeSet::new();
    let seed_uuid = seed_node.cluster_state_uuid;
    members.insert(seed_node);

    for peer in peers {
        // The seed lists itself, possibly under another port.
        if peer.host == seed.host {
            continue;
        }

        let node = accessor
            .fetch_node(&peer)
            .await
            .map_err(|e| e.into_unknown_state(&peer))?;

        if node.cluster_state_uuid != seed_uuid {
            tracing::debug!(
                node = %peer,
                uuid = %node.cluster_state_uuid,
                seed_uuid = %seed_uuid,
                "Peer belongs to another cluster, ignoring"
            );
            continue;
        }
        if !node.is_primary() {
            tracing::debug!(node = %peer, "Peer is not in the primary component, ignoring");
            continue;
        }

        members.insert(node);
    }

    tracing::debug!(seed = %seed, members = members.len(), "Cluster discovered");
    Ok(members)
}

/// Try each seed in order and return the first membership that can be trusted.
pub async fn discover_any<A>(accessor: &A, seeds: &[NodeAddr]) -> SyncResult<ClusterNodeSet>
where
    A: NodeHealthAccessor + ?Sized,
{
    let mut last_error = None;

    for seed in seeds {
        match discover(accessor, seed).await {
            Ok(members) => return Ok(members),
            Err(e @ SyncError::NonPrimaryNode { .. }) => {
                tracing::error!(seed = %seed, "Cluster node used for registration is non-primary, skipping");
                last_error = Some(e);
            }
            Err(e @ SyncError::UnknownNodeState { .. }) => {
                tracing::error!(seed = %seed, error = %e, "Cluster node used for registration is in unknown state, skipping");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or(SyncError::ClusterUnavailable))
}
