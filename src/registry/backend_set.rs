//! An ordered, key-unique collection of backend rows.

use crate::net::NodeAddr;
use crate::registry::backend::{BackendKey, BackendStatus, RouterBackend};

/// Backend rows, unique by (hostgroup, host, port), in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendSet {
    rows: Vec<RouterBackend>,
}

impl BackendSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RouterBackend> {
        self.rows.iter()
    }

    pub fn get(&self, key: &BackendKey) -> Option<&RouterBackend> {
        self.rows
            .iter()
            .find(|b| b.hostgroup_id == key.hostgroup_id && b.is_at(&key.addr))
    }

    pub fn get_mut(&mut self, key: &BackendKey) -> Option<&mut RouterBackend> {
        self.rows
            .iter_mut()
            .find(|b| b.hostgroup_id == key.hostgroup_id && b.is_at(&key.addr))
    }

    /// The row for `addr` in `hostgroup`.
    pub fn find(&self, hostgroup: u32, addr: &NodeAddr) -> Option<&RouterBackend> {
        self.get(&BackendKey {
            hostgroup_id: hostgroup,
            addr: addr.clone(),
        })
    }

    pub fn find_mut(&mut self, hostgroup: u32, addr: &NodeAddr) -> Option<&mut RouterBackend> {
        self.rows
            .iter_mut()
            .find(|b| b.hostgroup_id == hostgroup && b.is_at(addr))
    }

    /// Insert `backend`, replacing the row with the same key in place.
    pub fn upsert(&mut self, backend: RouterBackend) {
        match self.get_mut(&backend.key()) {
            Some(existing) => *existing = backend,
            None => self.rows.push(backend),
        }
    }

    pub fn in_hostgroup(&self, hostgroup: u32) -> impl Iterator<Item = &RouterBackend> + '_ {
        self.rows.iter().filter(move |b| b.hostgroup_id == hostgroup)
    }

    /// Keys of every row in `hostgroup`, in load order.
    pub fn keys_in(&self, hostgroup: u32) -> Vec<BackendKey> {
        self.in_hostgroup(hostgroup).map(RouterBackend::key).collect()
    }

    pub fn count(&self, hostgroup: u32, status: BackendStatus) -> usize {
        self.in_hostgroup(hostgroup)
            .filter(|b| b.status == status)
            .count()
    }

    /// Rows in `hostgroup` that are not removed.
    pub fn live_in(&self, hostgroup: u32) -> impl Iterator<Item = &RouterBackend> + '_ {
        self.in_hostgroup(hostgroup).filter(|b| !b.is_removed())
    }

    /// True when `addr` has a row in any hostgroup.
    pub fn has_address(&self, addr: &NodeAddr) -> bool {
        self.rows.iter().any(|b| b.is_at(addr))
    }

    pub fn into_vec(self) -> Vec<RouterBackend> {
        self.rows
    }
}

impl FromIterator<RouterBackend> for BackendSet {
    fn from_iter<I: IntoIterator<Item = RouterBackend>>(iter: I) -> Self {
        let mut set = BackendSet::new();
        for backend in iter {
            set.upsert(backend);
        }
        set
    }
}

impl<'a> IntoIterator for &'a BackendSet {
    type Item = &'a RouterBackend;
    type IntoIter = std::slice::Iter<'a, RouterBackend>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(host: &str) -> NodeAddr {
        NodeAddr::new(host, 3306)
    }

    #[test]
    fn test_upsert_replaces_by_key() {
        let mut set = BackendSet::new();
        set.upsert(RouterBackend::new(10, &addr("db1")));
        set.upsert(RouterBackend::new(11, &addr("db1")));
        set.upsert(RouterBackend::new(10, &addr("db1")).with_status(BackendStatus::OfflineSoft));

        assert_eq!(set.len(), 2);
        assert_eq!(
            set.find(10, &addr("db1")).map(|b| b.status),
            Some(BackendStatus::OfflineSoft)
        );
    }

    #[test]
    fn test_hostgroup_views() {
        let set: BackendSet = vec![
            RouterBackend::new(10, &addr("db1")),
            RouterBackend::new(11, &addr("db2")),
            RouterBackend::new(11, &addr("db3")).with_status(BackendStatus::OfflineHard),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.keys_in(11).len(), 2);
        assert_eq!(set.live_in(11).count(), 1);
        assert_eq!(set.count(10, BackendStatus::Online), 1);
        assert!(set.has_address(&addr("db3")));
        assert!(!set.has_address(&addr("db4")));
    }
}
