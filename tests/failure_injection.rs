//! Failure injection tests: unreachable nodes, unusable seeds and a failing
//! admin store.

use galera_router::cluster::{ClusterStatus, LocalState};
use galera_router::registry::memory::AdminCall;
use galera_router::registry::BackendStatus;
use galera_router::SyncError;

mod common;

use common::{addr, Harness, READERS, WRITERS};

#[tokio::test]
async fn test_unreachable_node_does_not_abort_pass() {
    let h = Harness::synced(&["n1", "n2", "n3"]);
    h.reconciler.reconcile(&h.request).await.unwrap();

    // Answers discovery, then times out on the health probe.
    h.cluster.fail_after(&addr("n3"), 1);
    let report = h.reconciler.reconcile(&h.request).await.unwrap();

    assert_eq!(report.writer, Some(addr("n1")));
    assert_eq!(h.status(READERS, "n3"), Some(BackendStatus::OfflineHard));
    assert_eq!(h.status(READERS, "n2"), Some(BackendStatus::Online));
}

#[tokio::test]
async fn test_unreachable_writer_is_replaced() {
    let h = Harness::synced(&["n1", "n2", "n3"]);
    h.reconciler.reconcile(&h.request).await.unwrap();

    h.cluster.fail_after(&addr("n1"), 1);
    // n1 is the first seed; it answers discovery once.
    let report = h.reconciler.reconcile(&h.request).await.unwrap();

    assert_eq!(h.status(WRITERS, "n1"), Some(BackendStatus::OfflineHard));
    assert_eq!(report.writer, Some(addr("n2")));
    assert_eq!(h.online(WRITERS), vec!["n2"]);
}

#[tokio::test]
async fn test_no_candidates_mutates_nothing() {
    let h = Harness::synced(&["n1", "n2"]);
    h.reconciler.reconcile(&h.request).await.unwrap();
    let rows = h.admin.rows();
    h.admin.clear_journal();

    h.cluster.set_state(&addr("n1"), LocalState::Joining);
    h.cluster.set_state(&addr("n2"), LocalState::Joined);
    let err = h.reconciler.reconcile(&h.request).await.unwrap_err();

    assert!(matches!(err, SyncError::ClusterUnavailable));
    assert!(h.admin.journal().is_empty());
    assert_eq!(h.admin.rows(), rows);
}

#[tokio::test]
async fn test_every_seed_non_primary() {
    let h = Harness::synced(&["n1", "n2"]);
    h.cluster.set_cluster_status(&addr("n1"), ClusterStatus::NonPrimary);
    h.cluster.set_cluster_status(&addr("n2"), ClusterStatus::NonPrimary);

    let err = h.reconciler.reconcile(&h.request).await.unwrap_err();
    assert!(matches!(err, SyncError::NonPrimaryNode { .. }));
    assert!(h.admin.journal().is_empty());
}

#[tokio::test]
async fn test_unreadable_peer_during_discovery_fails_over_to_next_seed() {
    let h = Harness::synced(&["n1", "n2"]);
    h.cluster.set_unreachable(&addr("n2"), true);
    // n1 lists n2, whose status cannot be read. n2 as a seed is unreachable too.
    let err = h.reconciler.reconcile(&h.request).await.unwrap_err();
    assert!(matches!(err, SyncError::UnknownNodeState { .. }));
}

#[tokio::test]
async fn test_admin_down_aborts_pass() {
    let h = Harness::synced(&["n1"]);
    h.admin.set_down(true);

    let err = h.reconciler.reconcile(&h.request).await.unwrap_err();
    assert!(matches!(err, SyncError::AdminConnection(_)));
    assert!(h.admin.journal().is_empty());
}

#[tokio::test]
async fn test_failed_write_still_reloads() {
    let h = Harness::synced(&["n1", "n2", "n3"]);
    h.admin.fail_writes_after(1);

    let err = h.reconciler.reconcile(&h.request).await.unwrap_err();
    assert!(matches!(err, SyncError::AdminConnection(_)));

    let journal = h.admin.journal();
    assert_eq!(h.admin.writes(), 1);
    assert_eq!(journal.last(), Some(&AdminCall::Reload));
}

#[tokio::test]
async fn test_set_status_on_vanished_row() {
    use galera_router::registry::{RouterAdmin, RouterBackend};

    let h = Harness::synced(&["n1"]);
    let ghost = RouterBackend::new(READERS, &addr("ghost"));
    let err = h
        .admin
        .set_status(&ghost, BackendStatus::OfflineSoft)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::BackendUnregistered { .. }));
}
