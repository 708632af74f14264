//! Pass-level error taxonomy.
//!
//! Only conditions that abort a whole reconciliation pass live here. A single
//! node failing a health probe is a [`NodeError`], which the engine turns into a
//! backend status transition instead of propagating.

use thiserror::Error;

/// Errors that abort a reconciliation pass and reach the caller.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The discovery seed is not part of the primary component.
    #[error("Node {node} is not in the primary component")]
    NonPrimaryNode { node: String },

    /// A node's status could not be read during discovery.
    #[error("Node {node} is in unknown state: {reason}")]
    UnknownNodeState { node: String, reason: String },

    /// No SYNCED or DONOR_DESYNCED node exists in the cluster.
    #[error("No node found in SYNCED or DONOR_DESYNCED state")]
    ClusterUnavailable,

    /// The admin store returned no rows where at least one was required.
    #[error("No backends found in hostgroup {hostgroup}")]
    BackendNotFound { hostgroup: u32 },

    /// The admin store is unreachable or rejected a statement.
    #[error("ProxySQL admin connection failed: {0}")]
    AdminConnection(String),

    /// A status update targeted a row that does not exist.
    #[error("Backend {backend} is not registered")]
    BackendUnregistered { backend: String },

    #[error("User {username} not found")]
    UserNotFound { username: String },
}

/// Result type for pass-level operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Failure of a single probe against one cluster node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("connect timeout after {0} seconds")]
    Timeout(u64),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("query failed: {0}")]
    Query(String),

    /// The node answered but a status variable was missing or unparsable.
    #[error("unexpected status: {0}")]
    Malformed(String),
}

impl NodeError {
    pub(crate) fn into_unknown_state(self, node: impl ToString) -> SyncError {
        SyncError::UnknownNodeState {
            node: node.to_string(),
            reason: self.to_string(),
        }
    }
}
