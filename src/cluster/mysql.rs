//! Node accessor over the MySQL protocol.
//!
//! # Responsibilities
//! - Read `wsrep%` status and the relevant `@@global` variables from a node
//! - Parse `wsrep_incoming_addresses` into member addresses
//! - Flip `wsrep_desync` for operator commands

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::cluster::accessor::NodeHealthAccessor;
use crate::cluster::node::{vars, ClusterNode};
use crate::error::NodeError;
use crate::net::connection::SessionError;
use crate::net::endpoint::parse_host_list_lenient;
use crate::net::{Credentials, Endpoint, NodeAddr, Session, TextRow};

const STATUS_QUERY: &str = "SHOW GLOBAL STATUS LIKE 'wsrep%'";
const GLOBALS_QUERY: &str = "SELECT @@global.wsrep_cluster_name AS wsrep_cluster_name, \
     @@global.wsrep_reject_queries AS wsrep_reject_queries, \
     @@global.wsrep_sst_donor_rejects_queries AS wsrep_sst_donor_rejects_queries";
// Servers older than 5.7 have no wsrep_reject_queries.
const GLOBALS_FALLBACK_QUERY: &str = "SELECT @@global.wsrep_cluster_name AS wsrep_cluster_name";

impl From<SessionError> for NodeError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Timeout(secs) => NodeError::Timeout(secs),
            SessionError::Connect { reason, .. } => NodeError::Connect(reason),
            SessionError::Statement(reason) => NodeError::Query(reason),
        }
    }
}

/// Reads node status with a fresh connection per call.
#[derive(Debug, Clone)]
pub struct MySqlNodeAccessor {
    credentials: Credentials,
    connect_timeout: Duration,
}

impl MySqlNodeAccessor {
    pub fn new(credentials: Credentials, connect_timeout: Duration) -> Self {
        Self {
            credentials,
            connect_timeout,
        }
    }

    async fn open(&self, addr: &NodeAddr) -> Result<Session, NodeError> {
        let session = Session::open(
            &Endpoint::Tcp(addr.clone()),
            &self.credentials,
            self.connect_timeout,
        )
        .await?;
        Ok(session)
    }

    async fn status_variables(&self, addr: &NodeAddr) -> Result<HashMap<String, String>, NodeError> {
        let mut session = self.open(addr).await?;
        let result = async {
            let mut variables = variable_rows(session.query(STATUS_QUERY).await?);
            let globals = match session.query(GLOBALS_QUERY).await {
                Ok(rows) => rows,
                Err(SessionError::Statement(e)) => {
                    tracing::debug!(node = %addr, error = %e, "Falling back to cluster name only");
                    session.query(GLOBALS_FALLBACK_QUERY).await?
                }
                Err(e) => return Err(e.into()),
            };
            if let Some(row) = globals.into_iter().next() {
                for (name, value) in row {
                    if let Some(value) = value {
                        variables.insert(name.to_ascii_lowercase(), value);
                    }
                }
            }
            Ok::<_, NodeError>(variables)
        }
        .await;
        session.close().await;
        result
    }
}

/// Fold `Variable_name` / `Value` rows into a map keyed by lowercase name.
fn variable_rows(rows: Vec<TextRow>) -> HashMap<String, String> {
    rows.into_iter()
        .filter_map(|row| {
            let mut name = None;
            let mut value = None;
            for (column, cell) in row {
                match column.to_ascii_lowercase().as_str() {
                    "variable_name" => name = cell,
                    "value" => value = cell,
                    _ => {}
                }
            }
            Some((name?.to_ascii_lowercase(), value.unwrap_or_default()))
        })
        .collect()
}

#[async_trait]
impl NodeHealthAccessor for MySqlNodeAccessor {
    async fn fetch_node(&self, addr: &NodeAddr) -> Result<ClusterNode, NodeError> {
        let variables = self.status_variables(addr).await?;
        ClusterNode::from_variables(addr.clone(), &variables)
    }

    async fn peer_addresses(&self, addr: &NodeAddr) -> Result<Vec<NodeAddr>, NodeError> {
        let mut session = self.open(addr).await?;
        let rows = session
            .query("SHOW GLOBAL STATUS LIKE 'wsrep_incoming_addresses'")
            .await;
        session.close().await;

        let variables = variable_rows(rows?);
        let list = variables
            .get(vars::INCOMING_ADDRESSES)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                NodeError::Malformed(format!("unknown status variable {}", vars::INCOMING_ADDRESSES))
            })?;
        Ok(parse_host_list_lenient(list))
    }

    async fn set_desync(&self, addr: &NodeAddr, desync: bool) -> Result<(), NodeError> {
        let sql = if desync {
            "SET GLOBAL wsrep_desync = ON"
        } else {
            "SET GLOBAL wsrep_desync = OFF"
        };
        let mut session = self.open(addr).await?;
        let result = session.execute(sql).await;
        session.close().await;
        result?;
        tracing::info!(node = %addr, desync, "wsrep_desync updated");
        Ok(())
    }
}
