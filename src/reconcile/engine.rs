//! Reconciliation pass driver.
//!
//! # Responsibilities
//! - Discover membership and probe every member once
//! - Load both hostgroups, plan, diff and apply the difference
//! - Reload the router runtime once per pass
//! - Operator actions: admin overrides, desync, status listing
//!
//! # Data Flow
//! ```text
//! seeds ─► discovery ─► probe ─► HealthMap
//!                                    │
//! admin rows ─► BackendSet ─► planner ─► diff ─► apply ─► reload
//! ```
//!
//! # Design Decisions
//! - The engine holds no state between passes; the caller schedules passes
//! - Nothing is written when the cluster has no routable candidate
//! - A failed write stops the pass, but a reload is still attempted so the
//!   router picks up whatever was already written

use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;

use crate::cluster::accessor::NodeHealthAccessor;
use crate::cluster::discovery::discover_any;
use crate::cluster::node::LocalState;
use crate::error::{SyncError, SyncResult};
use crate::net::{Credentials, NodeAddr};
use crate::reconcile::blacklist::WriterBlacklist;
use crate::reconcile::diff::{diff, Mutation};
use crate::reconcile::health::HealthMap;
use crate::reconcile::planner::{plan, PlanContext};
use crate::registry::admin::{backends_or_empty, RouterAdmin};
use crate::registry::backend::{BackendStatus, RouterBackend};
use crate::registry::backend_set::BackendSet;

const MONITOR_USERNAME_VARIABLE: &str = "mysql-monitor_username";
const MONITOR_PASSWORD_VARIABLE: &str = "mysql-monitor_password";

/// What a pass reconciles.
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    pub writer_hostgroup: u32,
    pub reader_hostgroup: u32,
    /// Discovery seeds, tried in order.
    pub seeds: Vec<NodeAddr>,
    pub blacklist: WriterBlacklist,
}

/// Outcome of a successful pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub writer: Option<NodeAddr>,
    pub mutations: Vec<Mutation>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.mutations.is_empty()
    }
}

pub struct Reconciler {
    nodes: Arc<dyn NodeHealthAccessor>,
    admin: Arc<dyn RouterAdmin>,
    monitor: Option<Credentials>,
    span: tracing::Span,
}

impl Reconciler {
    pub fn new(nodes: Arc<dyn NodeHealthAccessor>, admin: Arc<dyn RouterAdmin>) -> Self {
        Self {
            nodes,
            admin,
            monitor: None,
            span: tracing::info_span!("galera_router"),
        }
    }

    /// Parent span for every pass and operator action.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Credentials the router should use to monitor backends.
    pub fn with_monitor_credentials(mut self, credentials: Credentials) -> Self {
        self.monitor = Some(credentials);
        self
    }

    /// Run one reconciliation pass.
    pub async fn reconcile(&self, request: &ReconcileRequest) -> SyncResult<ReconcileReport> {
        let span = tracing::info_span!(
            parent: &self.span,
            "reconcile",
            writer_hostgroup = request.writer_hostgroup,
            reader_hostgroup = request.reader_hostgroup
        );
        self.run_pass(request).instrument(span).await
    }

    async fn run_pass(&self, request: &ReconcileRequest) -> SyncResult<ReconcileReport> {
        let members = discover_any(self.nodes.as_ref(), &request.seeds).await?;
        let tier = members.candidate_tier().ok_or_else(|| {
            tracing::error!(members = members.len(), "No node found in SYNCED or DONOR_DESYNCED state");
            SyncError::ClusterUnavailable
        })?;

        let health = self.probe(members.addresses(), tier).await;
        if health.candidates().next().is_none() {
            tracing::error!(tier = %tier, "Every candidate failed its health check");
            return Err(SyncError::ClusterUnavailable);
        }

        let current = self
            .load(&[request.writer_hostgroup, request.reader_hostgroup])
            .await?;

        let ctx = PlanContext {
            writer_hostgroup: request.writer_hostgroup,
            reader_hostgroup: request.reader_hostgroup,
            health: &health,
            blacklist: &request.blacklist,
        };
        let planned = plan(&current, &ctx);
        let mutations = diff(&current, &planned.backends, request.writer_hostgroup);

        if let Err(e) = self.apply(&mutations).await {
            tracing::error!(error = %e, "Pass aborted, reloading what was written");
            if let Err(reload) = self.admin.reload_runtime().await {
                tracing::warn!(error = %reload, "Best-effort reload failed");
            }
            return Err(e);
        }
        self.admin.reload_runtime().await?;

        match &planned.writer {
            Some(writer) => tracing::info!(
                writer = %writer,
                mutations = mutations.len(),
                "Reconciliation complete"
            ),
            None => tracing::warn!(mutations = mutations.len(), "Reconciliation complete without a writer"),
        }

        Ok(ReconcileReport {
            writer: planned.writer,
            mutations,
        })
    }

    async fn probe(&self, addresses: Vec<NodeAddr>, tier: LocalState) -> HealthMap {
        let mut probes = Vec::with_capacity(addresses.len());
        for addr in addresses {
            let result = self.nodes.fetch_node(&addr).await;
            probes.push((addr, result));
        }
        HealthMap::classify(tier, probes)
    }

    async fn load(&self, hostgroups: &[u32]) -> SyncResult<BackendSet> {
        let mut rows = Vec::new();
        for hostgroup in hostgroups {
            rows.extend(backends_or_empty(self.admin.as_ref(), *hostgroup).await?);
        }
        Ok(rows.into_iter().collect())
    }

    async fn apply(&self, mutations: &[Mutation]) -> SyncResult<()> {
        if let Some(monitor) = &self.monitor {
            self.admin
                .set_variable(MONITOR_USERNAME_VARIABLE, &monitor.username)
                .await?;
            self.admin
                .set_variable(MONITOR_PASSWORD_VARIABLE, &monitor.password)
                .await?;
        }

        for mutation in mutations {
            tracing::debug!(mutation = %mutation, "Applying");
            match mutation {
                Mutation::Register(b) => self.admin.register_backend(b).await?,
                Mutation::Deregister(b) => self.admin.deregister_backend(b).await?,
                Mutation::SetStatus(b) => self.admin.set_status(b, b.status).await?,
            }
        }
        Ok(())
    }

    /// Rows registered in `hostgroup`; empty when there are none.
    pub async fn status(&self, hostgroup: u32) -> SyncResult<Vec<RouterBackend>> {
        backends_or_empty(self.admin.as_ref(), hostgroup)
            .instrument(self.span.clone())
            .await
    }

    pub async fn ping(&self) -> SyncResult<()> {
        self.admin.ping().instrument(self.span.clone()).await
    }

    /// Set or clear the operator override on every row of `addr` in `hostgroups`.
    ///
    /// Setting an override also applies it as the row status. Clearing it
    /// leaves the status for the next pass to converge. Returns the number of
    /// rows updated.
    pub async fn set_admin_override(
        &self,
        hostgroups: &[u32],
        addr: &NodeAddr,
        status: Option<BackendStatus>,
    ) -> SyncResult<usize> {
        async {
            let rows = self.load(hostgroups).await?;
            let mut updated = 0;
            for row in rows.iter().filter(|b| b.is_at(addr)) {
                let mut row = row.clone();
                row.annotation.admin_override = status;
                if let Some(status) = status {
                    row.status = status;
                }
                self.admin.register_backend(&row).await?;
                updated += 1;
            }
            if updated == 0 {
                return Err(SyncError::BackendUnregistered {
                    backend: addr.to_string(),
                });
            }
            self.admin.reload_runtime().await?;
            tracing::info!(
                node = %addr,
                admin_status = ?status,
                rows = updated,
                "Admin status override updated"
            );
            Ok::<_, SyncError>(updated)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Toggle `wsrep_desync` on a cluster node.
    pub async fn set_desync(&self, addr: &NodeAddr, desync: bool) -> SyncResult<()> {
        self.nodes
            .set_desync(addr, desync)
            .instrument(self.span.clone())
            .await
            .map_err(|e| e.into_unknown_state(addr))
    }
}
