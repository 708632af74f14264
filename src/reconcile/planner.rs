//! Single-writer convergence, computed over an in-memory copy of the rows.
//!
//! # Data Flow
//! ```text
//! loaded BackendSet + HealthMap + WriterBlacklist
//!     → elect_writer       writer hostgroup: demote, recover, elect one
//!     → converge_readers   reader hostgroup: follow node health, fallback
//!     → fill_readers       candidates without a row become readers
//!     → retire_writer_reader
//!     → promote_donor
//!     → Plan (target BackendSet, elected writer)
//! ```
//!
//! # Design Decisions
//! - Planning performs no I/O; the engine diffs the plan against the loaded
//!   rows and applies only the difference
//! - OFFLINE_HARD means removed: rows are kept but only election or reader
//!   recovery brings them back
//! - A row pinned by an OFFLINE_HARD operator override is never brought back

use std::collections::BTreeSet;

use crate::net::NodeAddr;
use crate::reconcile::blacklist::WriterBlacklist;
use crate::reconcile::health::{HealthMap, NodeHealth};
use crate::registry::backend::{BackendRole, BackendStatus, RouterBackend};
use crate::registry::backend_set::BackendSet;

/// Inputs that stay fixed for one pass.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub writer_hostgroup: u32,
    pub reader_hostgroup: u32,
    pub health: &'a HealthMap,
    pub blacklist: &'a WriterBlacklist,
}

impl PlanContext<'_> {
    fn has_unlisted_candidate(&self) -> bool {
        self.health
            .candidates()
            .any(|addr| !self.blacklist.contains(addr))
    }
}

/// Target state of both hostgroups.
#[derive(Debug, Clone)]
pub struct Plan {
    pub backends: BackendSet,
    pub writer: Option<NodeAddr>,
}

/// Compute the target rows for one pass.
pub fn plan(current: &BackendSet, ctx: &PlanContext<'_>) -> Plan {
    let mut backends = current.clone();

    let writer = elect_writer(&mut backends, ctx);
    converge_readers(&mut backends, ctx, writer.as_ref());
    fill_readers(&mut backends, ctx);
    if let Some(writer) = &writer {
        retire_writer_reader(&mut backends, ctx, writer);
        promote_donor(&mut backends, ctx, writer);
    }

    Plan { backends, writer }
}

fn pinned_anywhere(set: &BackendSet, addr: &NodeAddr) -> bool {
    set.iter().any(|b| b.is_at(addr) && b.is_pinned())
}

/// Put `addr` in the reader hostgroup with `status`. A missing row is only
/// created when it would carry traffic.
fn ensure_reader(set: &mut BackendSet, hostgroup: u32, addr: &NodeAddr, status: BackendStatus) {
    match set.find_mut(hostgroup, addr) {
        Some(row) if row.is_pinned() => row.status = BackendStatus::OfflineHard,
        Some(row) => {
            row.status = status;
            row.annotation.role = BackendRole::Reader;
        }
        None if status != BackendStatus::OfflineHard => set.upsert(
            RouterBackend::new(hostgroup, addr)
                .with_role(BackendRole::Reader)
                .with_status(status),
        ),
        None => {}
    }
}

fn elect_writer(set: &mut BackendSet, ctx: &PlanContext<'_>) -> Option<NodeAddr> {
    let hostgroup = ctx.writer_hostgroup;
    let unlisted_available = ctx.has_unlisted_candidate();
    let mut recovering = Vec::new();

    for key in set.keys_in(hostgroup) {
        let Some(row) = set.get_mut(&key) else {
            continue;
        };
        if row.is_pinned() {
            row.status = BackendStatus::OfflineHard;
            continue;
        }
        if row.is_removed() {
            continue;
        }

        match ctx.health.health(&key.addr) {
            NodeHealth::Absent | NodeHealth::Unreachable => {
                tracing::info!(backend = %key, "Writer node gone, deregistering");
                row.status = BackendStatus::OfflineHard;
            }
            NodeHealth::Unsafe => {
                if row.status != BackendStatus::OfflineSoft {
                    tracing::info!(backend = %key, "Writer node unsafe, setting OFFLINE_SOFT");
                }
                row.status = BackendStatus::OfflineSoft;
            }
            NodeHealth::Routable => match row.status {
                BackendStatus::Online => {
                    if ctx.blacklist.contains(&key.addr) && unlisted_available {
                        tracing::info!(backend = %key, "Writer is blacklisted, demoting");
                        row.status = BackendStatus::OfflineHard;
                    }
                }
                BackendStatus::OfflineSoft | BackendStatus::Shunned => {
                    recovering.push(key.addr.clone())
                }
                BackendStatus::OfflineHard => {}
            },
        }
    }

    for addr in recovering {
        let writer_online = set.in_hostgroup(hostgroup).any(RouterBackend::is_online);
        let held_back = ctx.blacklist.contains(&addr) && unlisted_available;
        if !writer_online && !held_back {
            if let Some(row) = set.find_mut(hostgroup, &addr) {
                tracing::info!(backend = %row, "Writer recovered");
                row.status = BackendStatus::Online;
                row.annotation.role = BackendRole::Writer;
            }
        } else {
            if let Some(row) = set.find_mut(hostgroup, &addr) {
                row.status = BackendStatus::OfflineHard;
            }
            tracing::info!(node = %addr, "Recovered writer moved to readers");
            ensure_reader(set, ctx.reader_hostgroup, &addr, BackendStatus::Online);
        }
    }

    let online: Vec<NodeAddr> = set
        .in_hostgroup(hostgroup)
        .filter(|b| b.is_online())
        .map(RouterBackend::addr)
        .collect();

    if let Some((kept, extra)) = online.split_first() {
        for addr in extra {
            tracing::warn!(node = %addr, writer = %kept, "More than one writer online, demoting");
            if let Some(row) = set.find_mut(hostgroup, addr) {
                row.status = BackendStatus::OfflineHard;
            }
        }
        return Some(kept.clone());
    }

    let eligible: Vec<&NodeAddr> = ctx
        .health
        .candidates()
        .filter(|addr| !pinned_anywhere(set, addr))
        .collect();
    let chosen = eligible
        .iter()
        .find(|addr| !ctx.blacklist.contains(addr))
        .or_else(|| eligible.first())
        .map(|addr| (*addr).clone());

    let Some(chosen) = chosen else {
        tracing::warn!(hostgroup, "No eligible writer candidate");
        return None;
    };

    if ctx.blacklist.contains(&chosen) {
        tracing::warn!(node = %chosen, "Only blacklisted candidates left, electing anyway");
    }
    match set.find_mut(hostgroup, &chosen) {
        Some(row) => {
            row.status = BackendStatus::Online;
            row.annotation.role = BackendRole::Writer;
        }
        None => set.upsert(RouterBackend::new(hostgroup, &chosen).with_role(BackendRole::Writer)),
    }
    tracing::info!(node = %chosen, hostgroup, "Writer elected");
    Some(chosen)
}

fn converge_readers(set: &mut BackendSet, ctx: &PlanContext<'_>, writer: Option<&NodeAddr>) {
    let hostgroup = ctx.reader_hostgroup;

    for key in set.keys_in(hostgroup) {
        if writer == Some(&key.addr) {
            continue;
        }
        let Some(row) = set.get_mut(&key) else {
            continue;
        };
        if row.is_pinned() {
            row.status = BackendStatus::OfflineHard;
            continue;
        }

        match ctx.health.health(&key.addr) {
            NodeHealth::Routable => {
                row.status = BackendStatus::Online;
                row.annotation.role = BackendRole::Reader;
            }
            // Removed rows only come back once routable.
            NodeHealth::Unsafe if row.is_removed() => {}
            health => row.status = health.target_status(),
        }
    }

    let Some(writer) = writer else {
        return;
    };
    let other_online = set
        .in_hostgroup(hostgroup)
        .any(|b| b.is_online() && !b.is_at(writer));
    if !other_online {
        tracing::debug!(node = %writer, "No other reader online, writer also serves reads");
        ensure_reader(set, hostgroup, writer, BackendStatus::Online);
    }
}

fn fill_readers(set: &mut BackendSet, ctx: &PlanContext<'_>) {
    let candidates: Vec<NodeAddr> = ctx.health.candidates().cloned().collect();

    for addr in candidates {
        let has_reader = set.find(ctx.reader_hostgroup, &addr).is_some();
        let live_writer = set
            .find(ctx.writer_hostgroup, &addr)
            .is_some_and(|b| !b.is_removed());
        if has_reader || live_writer || pinned_anywhere(set, &addr) {
            continue;
        }
        tracing::info!(node = %addr, "Adding reader");
        set.upsert(RouterBackend::new(ctx.reader_hostgroup, &addr).with_role(BackendRole::Reader));
    }
}

/// Drop the writer's reader row once enough dedicated readers exist.
fn retire_writer_reader(set: &mut BackendSet, ctx: &PlanContext<'_>, writer: &NodeAddr) {
    let hostgroup = ctx.reader_hostgroup;
    let writer_reads = set
        .find(hostgroup, writer)
        .is_some_and(|b| !b.is_removed());
    if !writer_reads {
        return;
    }

    let live = set.live_in(hostgroup).count();
    let others_serving = set
        .live_in(hostgroup)
        .filter(|b| !b.is_at(writer))
        .any(|b| b.status != BackendStatus::OfflineSoft);

    if live > 2 && others_serving {
        if let Some(row) = set.find_mut(hostgroup, writer) {
            tracing::info!(node = %writer, "Writer no longer needed as reader");
            row.status = BackendStatus::OfflineHard;
        }
    }
}

/// Keep reads available when only the writer and a donor are left.
fn promote_donor(set: &mut BackendSet, ctx: &PlanContext<'_>, writer: &NodeAddr) {
    let live: BTreeSet<NodeAddr> = set
        .iter()
        .filter(|b| !b.is_removed())
        .map(RouterBackend::addr)
        .collect();
    if live.len() != 2 || !live.contains(writer) {
        return;
    }
    let Some(donor) = live.iter().find(|addr| *addr != writer) else {
        return;
    };
    if !ctx.health.is_serving_donor(donor) {
        return;
    }

    if let Some(row) = set.find_mut(ctx.reader_hostgroup, donor) {
        if !row.is_pinned() && !row.is_removed() && !row.is_online() {
            tracing::info!(node = %donor, "Only writer and donor left, routing reads to donor");
            row.status = BackendStatus::Online;
            row.annotation.role = BackendRole::Reader;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::memory::InMemoryCluster;
    use crate::cluster::node::{ClusterNode, LocalState};
    use crate::error::NodeError;
    use uuid::Uuid;

    const WRITERS: u32 = 10;
    const READERS: u32 = 11;

    fn addr(host: &str) -> NodeAddr {
        NodeAddr::new(host, 3306)
    }

    fn health(tier: LocalState, nodes: &[(&str, Option<LocalState>)]) -> HealthMap {
        HealthMap::classify(
            tier,
            nodes.iter().map(|(host, state)| {
                let probe: Result<ClusterNode, NodeError> = match state {
                    Some(state) => Ok(InMemoryCluster::member(addr(host), *state, Uuid::nil())),
                    None => Err(NodeError::Timeout(5)),
                };
                (addr(host), probe)
            }),
        )
    }

    fn synced(hosts: &[&str]) -> HealthMap {
        let nodes: Vec<_> = hosts.iter().map(|h| (*h, Some(LocalState::Synced))).collect();
        health(LocalState::Synced, &nodes)
    }

    fn row(hostgroup: u32, host: &str, status: BackendStatus) -> RouterBackend {
        let role = if hostgroup == WRITERS {
            BackendRole::Writer
        } else {
            BackendRole::Reader
        };
        RouterBackend::new(hostgroup, &addr(host))
            .with_role(role)
            .with_status(status)
    }

    fn run(current: &BackendSet, health: &HealthMap, blacklist: &WriterBlacklist) -> Plan {
        plan(
            current,
            &PlanContext {
                writer_hostgroup: WRITERS,
                reader_hostgroup: READERS,
                health,
                blacklist,
            },
        )
    }

    fn status(plan: &Plan, hostgroup: u32, host: &str) -> Option<BackendStatus> {
        plan.backends.find(hostgroup, &addr(host)).map(|b| b.status)
    }

    fn online_writers(plan: &Plan) -> usize {
        plan.backends.count(WRITERS, BackendStatus::Online)
    }

    #[test]
    fn test_empty_tables_elect_first_candidate() {
        let plan = run(
            &BackendSet::new(),
            &synced(&["n1", "n2", "n3"]),
            &WriterBlacklist::default(),
        );
        assert_eq!(plan.writer, Some(addr("n1")));
        assert_eq!(online_writers(&plan), 1);
        assert_eq!(status(&plan, READERS, "n2"), Some(BackendStatus::Online));
        assert_eq!(status(&plan, READERS, "n3"), Some(BackendStatus::Online));
        // Retired in the same pass; the diff never registers it.
        assert_eq!(status(&plan, READERS, "n1"), Some(BackendStatus::OfflineHard));
    }

    #[test]
    fn test_converged_tables_are_a_fixpoint() {
        let current: BackendSet = vec![
            row(WRITERS, "n1", BackendStatus::Online),
            row(READERS, "n2", BackendStatus::Online),
            row(READERS, "n3", BackendStatus::Online),
        ]
        .into_iter()
        .collect();
        let plan = run(&current, &synced(&["n1", "n2", "n3"]), &WriterBlacklist::default());
        assert_eq!(plan.backends, current);
    }

    #[test]
    fn test_unsafe_writer_replaced() {
        let current: BackendSet = vec![
            row(WRITERS, "n2", BackendStatus::Online),
            row(READERS, "n1", BackendStatus::Online),
            row(READERS, "n3", BackendStatus::Online),
        ]
        .into_iter()
        .collect();
        let health = health(
            LocalState::Synced,
            &[
                ("n1", Some(LocalState::Synced)),
                ("n2", Some(LocalState::Joining)),
                ("n3", Some(LocalState::Synced)),
            ],
        );
        let plan = run(&current, &health, &WriterBlacklist::default());

        assert_eq!(status(&plan, WRITERS, "n2"), Some(BackendStatus::OfflineSoft));
        assert_eq!(plan.writer, Some(addr("n1")));
        assert_eq!(online_writers(&plan), 1);
    }

    #[test]
    fn test_absent_writer_removed() {
        let current: BackendSet = vec![
            row(WRITERS, "gone", BackendStatus::Online),
            row(READERS, "gone", BackendStatus::Online),
        ]
        .into_iter()
        .collect();
        let plan = run(&current, &synced(&["n1"]), &WriterBlacklist::default());

        assert_eq!(status(&plan, WRITERS, "gone"), Some(BackendStatus::OfflineHard));
        assert_eq!(status(&plan, READERS, "gone"), Some(BackendStatus::OfflineHard));
        assert_eq!(plan.writer, Some(addr("n1")));
        // Single node: also serves reads.
        assert_eq!(status(&plan, READERS, "n1"), Some(BackendStatus::Online));
    }

    #[test]
    fn test_blacklist_respected_unless_forced() {
        let blacklist = WriterBlacklist::new(vec![addr("a")]);

        let plan = run(&BackendSet::new(), &synced(&["a", "b"]), &blacklist);
        assert_eq!(plan.writer, Some(addr("b")));

        let plan = run(&BackendSet::new(), &synced(&["a"]), &blacklist);
        assert_eq!(plan.writer, Some(addr("a")));
    }

    #[test]
    fn test_blacklisted_incumbent_demoted_when_alternative_exists() {
        let current: BackendSet = vec![
            row(WRITERS, "a", BackendStatus::Online),
            row(READERS, "b", BackendStatus::Online),
        ]
        .into_iter()
        .collect();
        let blacklist = WriterBlacklist::new(vec![addr("a")]);
        let plan = run(&current, &synced(&["a", "b"]), &blacklist);

        assert_eq!(plan.writer, Some(addr("b")));
        assert_eq!(status(&plan, WRITERS, "a"), Some(BackendStatus::OfflineHard));
        assert_eq!(status(&plan, READERS, "a"), Some(BackendStatus::Online));
    }

    #[test]
    fn test_recovering_writer_goes_to_readers_when_writer_exists() {
        let current: BackendSet = vec![
            row(WRITERS, "n1", BackendStatus::Online),
            row(WRITERS, "n2", BackendStatus::OfflineSoft),
            row(READERS, "n3", BackendStatus::Online),
        ]
        .into_iter()
        .collect();
        let plan = run(&current, &synced(&["n1", "n2", "n3"]), &WriterBlacklist::default());

        assert_eq!(plan.writer, Some(addr("n1")));
        assert_eq!(status(&plan, WRITERS, "n2"), Some(BackendStatus::OfflineHard));
        assert_eq!(status(&plan, READERS, "n2"), Some(BackendStatus::Online));
    }

    #[test]
    fn test_recovering_writer_resumes_when_alone() {
        let current: BackendSet = vec![
            row(WRITERS, "n2", BackendStatus::OfflineSoft),
            row(READERS, "n1", BackendStatus::Online),
        ]
        .into_iter()
        .collect();
        let plan = run(&current, &synced(&["n1", "n2"]), &WriterBlacklist::default());
        assert_eq!(plan.writer, Some(addr("n2")));
        assert_eq!(status(&plan, WRITERS, "n2"), Some(BackendStatus::Online));
    }

    #[test]
    fn test_duplicate_writers_collapse_to_one() {
        let current: BackendSet = vec![
            row(WRITERS, "n1", BackendStatus::Online),
            row(WRITERS, "n2", BackendStatus::Online),
        ]
        .into_iter()
        .collect();
        let plan = run(&current, &synced(&["n1", "n2"]), &WriterBlacklist::default());
        assert_eq!(online_writers(&plan), 1);
        assert_eq!(plan.writer, Some(addr("n1")));
        assert_eq!(status(&plan, READERS, "n2"), Some(BackendStatus::Online));
    }

    #[test]
    fn test_pinned_rows_stay_hard() {
        let mut pinned = row(WRITERS, "n1", BackendStatus::Online);
        pinned.annotation.admin_override = Some(BackendStatus::OfflineHard);
        let current: BackendSet = vec![pinned].into_iter().collect();

        let plan = run(&current, &synced(&["n1", "n2"]), &WriterBlacklist::default());
        assert_eq!(status(&plan, WRITERS, "n1"), Some(BackendStatus::OfflineHard));
        assert_eq!(plan.writer, Some(addr("n2")));
        // Never added as a reader either.
        assert_eq!(status(&plan, READERS, "n1"), None);
    }

    #[test]
    fn test_no_writer_when_every_candidate_pinned() {
        let mut pinned = row(READERS, "n1", BackendStatus::OfflineHard);
        pinned.annotation.admin_override = Some(BackendStatus::OfflineHard);
        let current: BackendSet = vec![pinned].into_iter().collect();

        let plan = run(&current, &synced(&["n1"]), &WriterBlacklist::default());
        assert_eq!(plan.writer, None);
        assert_eq!(online_writers(&plan), 0);
    }

    #[test]
    fn test_unreachable_reader_goes_hard_and_unsafe_soft() {
        let current: BackendSet = vec![
            row(WRITERS, "n1", BackendStatus::Online),
            row(READERS, "n2", BackendStatus::Online),
            row(READERS, "n3", BackendStatus::Online),
            row(READERS, "n4", BackendStatus::Online),
        ]
        .into_iter()
        .collect();
        let health = health(
            LocalState::Synced,
            &[
                ("n1", Some(LocalState::Synced)),
                ("n2", None),
                ("n3", Some(LocalState::Joined)),
                ("n4", Some(LocalState::Synced)),
            ],
        );
        let plan = run(&current, &health, &WriterBlacklist::default());

        assert_eq!(status(&plan, READERS, "n2"), Some(BackendStatus::OfflineHard));
        assert_eq!(status(&plan, READERS, "n3"), Some(BackendStatus::OfflineSoft));
        assert_eq!(status(&plan, READERS, "n4"), Some(BackendStatus::Online));
        assert_eq!(status(&plan, READERS, "n1"), None);
    }

    #[test]
    fn test_writer_reader_kept_while_others_soft() {
        let current: BackendSet = vec![
            row(WRITERS, "n1", BackendStatus::Online),
            row(READERS, "n1", BackendStatus::Online),
            row(READERS, "n2", BackendStatus::Online),
            row(READERS, "n3", BackendStatus::Online),
        ]
        .into_iter()
        .collect();
        let health = health(
            LocalState::Synced,
            &[
                ("n1", Some(LocalState::Synced)),
                ("n2", Some(LocalState::Joining)),
                ("n3", Some(LocalState::Joining)),
            ],
        );
        let plan = run(&current, &health, &WriterBlacklist::default());
        assert_eq!(status(&plan, READERS, "n1"), Some(BackendStatus::Online));
        assert_eq!(status(&plan, READERS, "n2"), Some(BackendStatus::OfflineSoft));
    }

    #[test]
    fn test_donor_promoted_when_only_writer_left() {
        let current: BackendSet = vec![
            row(WRITERS, "n1", BackendStatus::Online),
            row(READERS, "n2", BackendStatus::OfflineHard),
            row(READERS, "n3", BackendStatus::Online),
        ]
        .into_iter()
        .collect();
        let health = health(
            LocalState::Synced,
            &[
                ("n1", Some(LocalState::Synced)),
                ("n2", None),
                ("n3", Some(LocalState::DonorDesynced)),
            ],
        );
        let plan = run(&current, &health, &WriterBlacklist::default());
        assert_eq!(plan.writer, Some(addr("n1")));
        assert_eq!(status(&plan, READERS, "n3"), Some(BackendStatus::Online));
        assert_eq!(status(&plan, READERS, "n2"), Some(BackendStatus::OfflineHard));
    }

    #[test]
    fn test_donor_tier_when_nothing_synced() {
        let health = health(
            LocalState::DonorDesynced,
            &[
                ("n1", Some(LocalState::DonorDesynced)),
                ("n2", Some(LocalState::Joining)),
            ],
        );
        let plan = run(&BackendSet::new(), &health, &WriterBlacklist::default());
        assert_eq!(plan.writer, Some(addr("n1")));
        assert_eq!(status(&plan, READERS, "n2"), None);
    }
}
