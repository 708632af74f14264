//! Turn a plan into the admin calls that realise it.

use std::fmt;

use serde::Serialize;

use crate::registry::backend::{BackendStatus, RouterBackend};
use crate::registry::backend_set::BackendSet;

/// One admin store write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "backend", rename_all = "snake_case")]
pub enum Mutation {
    Register(RouterBackend),
    Deregister(RouterBackend),
    SetStatus(RouterBackend),
}

impl Mutation {
    pub fn backend(&self) -> &RouterBackend {
        match self {
            Mutation::Register(b) | Mutation::Deregister(b) | Mutation::SetStatus(b) => b,
        }
    }

    fn phase(&self) -> u8 {
        match self {
            Mutation::Deregister(_) | Mutation::SetStatus(_) => 0,
            Mutation::Register(_) => 1,
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Register(b) => write!(f, "register {} {}", b, b.status),
            Mutation::Deregister(b) => write!(f, "deregister {}", b),
            Mutation::SetStatus(b) => write!(f, "set {} {}", b, b.status),
        }
    }
}

/// Mutations taking `current` to `planned`.
///
/// Removals and status changes come before registrations, and within each
/// phase the writer hostgroup comes first.
pub fn diff(current: &BackendSet, planned: &BackendSet, writer_hostgroup: u32) -> Vec<Mutation> {
    let mut mutations = Vec::new();

    for target in planned {
        let Some(old) = current.get(&target.key()) else {
            // Nothing to remove where nothing was registered.
            if !target.is_removed() {
                mutations.push(Mutation::Register(target.clone()));
            }
            continue;
        };
        if old == target {
            continue;
        }

        let annotated = old.annotation != target.annotation;
        if old.status == target.status || (annotated && target.status != BackendStatus::Online) {
            mutations.push(Mutation::Register(target.clone()));
            continue;
        }

        match target.status {
            BackendStatus::OfflineHard => mutations.push(Mutation::Deregister(target.clone())),
            BackendStatus::OfflineSoft | BackendStatus::Shunned => {
                mutations.push(Mutation::SetStatus(target.clone()))
            }
            BackendStatus::Online => {
                if !old.is_removed() {
                    mutations.push(Mutation::Deregister(old.clone()));
                }
                mutations.push(Mutation::Register(target.clone()));
            }
        }
    }

    mutations.sort_by_key(|m| (m.phase(), m.backend().hostgroup_id != writer_hostgroup));
    mutations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::NodeAddr;
    use crate::registry::backend::BackendRole;

    fn row(hostgroup: u32, host: &str, status: BackendStatus) -> RouterBackend {
        RouterBackend::new(hostgroup, &NodeAddr::new(host, 3306))
            .with_role(BackendRole::Reader)
            .with_status(status)
    }

    fn set(rows: Vec<RouterBackend>) -> BackendSet {
        rows.into_iter().collect()
    }

    #[test]
    fn test_identical_sets_yield_nothing() {
        let rows = set(vec![row(10, "n1", BackendStatus::Online)]);
        assert!(diff(&rows, &rows.clone(), 10).is_empty());
    }

    #[test]
    fn test_new_hard_row_is_skipped() {
        let planned = set(vec![
            row(11, "n1", BackendStatus::OfflineHard),
            row(11, "n2", BackendStatus::Online),
        ]);
        let mutations = diff(&BackendSet::new(), &planned, 10);
        assert_eq!(mutations, vec![Mutation::Register(row(11, "n2", BackendStatus::Online))]);
    }

    #[test]
    fn test_status_transitions() {
        let current = set(vec![
            row(11, "a", BackendStatus::Online),
            row(11, "b", BackendStatus::Online),
            row(11, "c", BackendStatus::OfflineSoft),
            row(11, "d", BackendStatus::OfflineHard),
        ]);
        let planned = set(vec![
            row(11, "a", BackendStatus::OfflineHard),
            row(11, "b", BackendStatus::OfflineSoft),
            row(11, "c", BackendStatus::Online),
            row(11, "d", BackendStatus::Online),
        ]);
        let mutations = diff(&current, &planned, 10);
        assert_eq!(
            mutations,
            vec![
                Mutation::Deregister(row(11, "a", BackendStatus::OfflineHard)),
                Mutation::SetStatus(row(11, "b", BackendStatus::OfflineSoft)),
                Mutation::Deregister(row(11, "c", BackendStatus::OfflineSoft)),
                Mutation::Register(row(11, "c", BackendStatus::Online)),
                Mutation::Register(row(11, "d", BackendStatus::Online)),
            ]
        );
    }

    #[test]
    fn test_annotation_change_reregisters() {
        let legacy = RouterBackend::new(11, &NodeAddr::new("a", 3306));
        let current = set(vec![legacy.clone()]);
        let planned = set(vec![legacy.with_role(BackendRole::Reader)]);
        let mutations = diff(&current, &planned, 10);
        assert!(matches!(mutations.as_slice(), [Mutation::Register(_)]));
    }

    #[test]
    fn test_writer_hostgroup_first() {
        let current = set(vec![
            row(11, "a", BackendStatus::Online),
            row(10, "b", BackendStatus::Online),
        ]);
        let planned = set(vec![
            row(11, "a", BackendStatus::OfflineHard),
            row(10, "b", BackendStatus::OfflineHard),
            row(10, "c", BackendStatus::Online),
        ]);
        let order: Vec<(u8, u32)> = diff(&current, &planned, 10)
            .iter()
            .map(|m| (m.phase(), m.backend().hostgroup_id))
            .collect();
        assert_eq!(order, vec![(0, 10), (0, 11), (1, 10)]);
    }
}
