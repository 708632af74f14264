//! Shared utilities for integration tests.

use std::sync::Arc;

use galera_router::cluster::{InMemoryCluster, LocalState};
use galera_router::net::NodeAddr;
use galera_router::reconcile::{ReconcileRequest, Reconciler, WriterBlacklist};
use galera_router::registry::{BackendRole, BackendStatus, InMemoryRouterAdmin, RouterBackend};
use uuid::Uuid;

pub const WRITERS: u32 = 10;
pub const READERS: u32 = 11;

const CLUSTER_UUID: Uuid = Uuid::from_u128(0x8a0f_f8a5_5c5d_11e7_8e1b_0242_ac12_0002);

pub fn addr(host: &str) -> NodeAddr {
    NodeAddr::new(host, 3306)
}

/// A cluster, an admin store and a reconciler wired together.
pub struct Harness {
    pub cluster: Arc<InMemoryCluster>,
    pub admin: Arc<InMemoryRouterAdmin>,
    pub reconciler: Reconciler,
    pub request: ReconcileRequest,
}

impl Harness {
    /// Every host starts SYNCED; the first one is the discovery seed.
    pub fn synced(hosts: &[&str]) -> Self {
        let cluster = Arc::new(InMemoryCluster::new());
        for host in hosts {
            cluster.add(InMemoryCluster::member(addr(host), LocalState::Synced, CLUSTER_UUID));
        }
        let admin = Arc::new(InMemoryRouterAdmin::new());
        let reconciler = Reconciler::new(cluster.clone(), admin.clone());
        let request = ReconcileRequest {
            writer_hostgroup: WRITERS,
            reader_hostgroup: READERS,
            seeds: hosts.iter().map(|h| addr(h)).collect(),
            blacklist: WriterBlacklist::default(),
        };
        Self {
            cluster,
            admin,
            reconciler,
            request,
        }
    }

    #[allow(dead_code)]
    pub fn with_blacklist(mut self, hosts: &[&str]) -> Self {
        self.request.blacklist = WriterBlacklist::new(hosts.iter().map(|h| addr(h)).collect());
        self
    }

    /// Seed the admin store with a row.
    #[allow(dead_code)]
    pub fn register(&self, hostgroup: u32, host: &str, status: BackendStatus) {
        let role = if hostgroup == WRITERS {
            BackendRole::Writer
        } else {
            BackendRole::Reader
        };
        self.admin.insert(
            RouterBackend::new(hostgroup, &addr(host))
                .with_role(role)
                .with_status(status),
        );
    }

    pub fn status(&self, hostgroup: u32, host: &str) -> Option<BackendStatus> {
        self.admin.row(hostgroup, host, 3306).map(|b| b.status)
    }

    /// Hosts ONLINE in `hostgroup`, sorted.
    pub fn online(&self, hostgroup: u32) -> Vec<String> {
        let mut hosts: Vec<String> = self
            .admin
            .rows()
            .into_iter()
            .filter(|b| b.hostgroup_id == hostgroup && b.is_online())
            .map(|b| b.hostname)
            .collect();
        hosts.sort();
        hosts
    }
}
