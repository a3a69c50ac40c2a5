//! Status derivation, sync and recover flows against the mock cluster
//! and daemon. The canned mock state desires `cid1` and `cid3` while the
//! daemon only holds `cid1`, so `cid3` is drifting from the start.

mod common;

use std::time::Duration;

use capstan_core::testutil as mock;
use capstan_core::{IpfsPinStatus, Pin, TrackerStatus};
use capstan_tracker::{OperationKind, Phase, Tracker, TrackerConfig, TrackerError};

use common::{tracker_pair, wait_for_status};

fn seed_error_record(tracker: &Tracker, cid: capstan_core::Cid, kind: OperationKind) {
    tracker
        .optracker()
        .track_new_operation(Pin::cid_only(cid.clone()), kind, Phase::Queued)
        .expect("record installs");
    tracker.optracker().set_error(&cid, "test error");
}

#[tokio::test]
async fn status_joins_cluster_and_daemon() {
    let (tracker, rpc) = tracker_pair();

    // Desired and held.
    let info = tracker.status(&mock::cid1()).await.unwrap();
    assert_eq!(info.status, TrackerStatus::Pinned);
    assert!(info.error.is_none());

    // Desired and missing.
    let info = tracker.status(&mock::cid3()).await.unwrap();
    assert_eq!(info.status, TrackerStatus::PinError);
    assert!(info.error.is_some());

    // Neither desired nor held.
    let info = tracker.status(&mock::cid4()).await.unwrap();
    assert_eq!(info.status, TrackerStatus::Unpinned);

    // Held without being desired.
    rpc.set_daemon_status(mock::cid4(), IpfsPinStatus::Recursive);
    let info = tracker.status(&mock::cid4()).await.unwrap();
    assert_eq!(info.status, TrackerStatus::UnpinError);

    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn status_reports_remote_allocations() {
    let (tracker, rpc) = tracker_pair();
    rpc.set_cluster_pin(Pin::cid_only(mock::cid4()).with_allocations(vec![mock::peer2()]));

    let info = tracker.status(&mock::cid4()).await.unwrap();
    assert_eq!(info.status, TrackerStatus::Remote);
    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn status_prefers_operation_records() {
    let (tracker, _rpc) = tracker_pair();
    let slow = mock::slow_cid1();

    tracker.track(Pin::cid_only(slow.clone())).unwrap();
    wait_for_status(&tracker, &slow, TrackerStatus::Pinning, Duration::from_secs(1)).await;

    let info = tracker.status(&slow).await.unwrap();
    assert_eq!(info.status, TrackerStatus::Pinning);
    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn status_all_joins_and_omits_irrelevant_cids() {
    let (tracker, rpc) = tracker_pair();
    // Undesired content held by the daemon.
    rpc.set_daemon_status(mock::cid2(), IpfsPinStatus::Recursive);

    let rows = tracker.status_all().await.unwrap();
    let get = |cid: &capstan_core::Cid| {
        rows.iter()
            .find(|r| r.cid == *cid)
            .map(|r| r.status)
    };

    assert_eq!(get(&mock::cid1()), Some(TrackerStatus::Pinned));
    assert_eq!(get(&mock::cid2()), Some(TrackerStatus::UnpinError));
    assert_eq!(get(&mock::cid3()), Some(TrackerStatus::PinError));
    assert_eq!(get(&mock::cid4()), None, "unknown CIDs are omitted");

    let mut sorted = rows.clone();
    sorted.sort_by(|a, b| a.cid.cmp(&b.cid));
    assert_eq!(rows, sorted, "rows come back ordered by CID");

    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn sync_all_reports_errored_cids_and_corrects_drift() {
    let (tracker, rpc) = tracker_pair();

    seed_error_record(&tracker, mock::cid1(), OperationKind::Pin);
    seed_error_record(&tracker, mock::cid2(), OperationKind::Pin);

    let synced = tracker.sync_all().await.unwrap();
    let get = |cid: &capstan_core::Cid| {
        synced.iter().find(|r| r.cid == *cid).map(|r| r.status)
    };

    // cid1: the daemon already holds it, the failure was stale.
    assert_eq!(get(&mock::cid1()), Some(TrackerStatus::Pinned));
    assert!(tracker.optracker().get(&mock::cid1()).is_none());
    // cid2: neither desired nor held, the record was moot.
    assert_eq!(get(&mock::cid2()), Some(TrackerStatus::Unpinned));
    // cid3: desired and missing, corrective pin enqueued. The worker may
    // already be executing it by the time the snapshot is taken.
    assert!(matches!(
        get(&mock::cid3()),
        Some(TrackerStatus::PinQueued | TrackerStatus::Pinning | TrackerStatus::Pinned)
    ));
    assert_eq!(synced.len(), 3);

    wait_for_status(&tracker, &mock::cid3(), TrackerStatus::Pinned, Duration::from_secs(2)).await;
    assert!(rpc.pin_log().contains(&mock::cid3()));

    // With the drift corrected, a second pass has nothing to report.
    let synced = tracker.sync_all().await.unwrap();
    assert!(synced.is_empty());

    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn sync_all_releases_content_allocated_elsewhere() {
    let (tracker, rpc) = tracker_pair();
    let pin = Pin::cid_only(mock::cid4()).with_allocations(vec![mock::peer2()]);
    rpc.set_cluster_pin(pin.clone());
    rpc.set_daemon_status(mock::cid4(), IpfsPinStatus::Recursive);

    tracker.track(pin).unwrap();
    assert_eq!(
        tracker.optracker().status(&mock::cid4()),
        Some(TrackerStatus::Remote)
    );

    let synced = tracker.sync_all().await.unwrap();
    // The leftover daemon copy is released without being reported.
    assert!(synced.iter().all(|r| r.cid != mock::cid4()));
    wait_for_status(&tracker, &mock::cid4(), TrackerStatus::Unpinned, Duration::from_secs(2)).await;
    assert!(rpc.unpin_log().contains(&mock::cid4()));

    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn recover_requeues_failed_pin() {
    let (tracker, rpc) = tracker_pair();
    seed_error_record(&tracker, mock::cid3(), OperationKind::Pin);

    let info = tracker.recover(&mock::cid3()).await.unwrap();
    assert!(matches!(
        info.status,
        TrackerStatus::PinQueued | TrackerStatus::Pinning | TrackerStatus::Pinned
    ));

    wait_for_status(&tracker, &mock::cid3(), TrackerStatus::Pinned, Duration::from_secs(2)).await;
    assert!(rpc.pin_log().contains(&mock::cid3()));
    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn recover_requeues_failed_unpin() {
    let (tracker, rpc) = tracker_pair();
    // The daemon holds content nobody wants anymore; a previous unpin
    // failed.
    rpc.set_daemon_status(mock::cid2(), IpfsPinStatus::Recursive);
    seed_error_record(&tracker, mock::cid2(), OperationKind::Unpin);

    let info = tracker.recover(&mock::cid2()).await.unwrap();
    assert!(matches!(
        info.status,
        TrackerStatus::UnpinQueued | TrackerStatus::Unpinning | TrackerStatus::Unpinned
    ));

    wait_for_status(&tracker, &mock::cid2(), TrackerStatus::Unpinned, Duration::from_secs(2)).await;
    assert!(rpc.unpin_log().contains(&mock::cid2()));
    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn recover_leaves_nominal_cids_alone() {
    let (tracker, rpc) = tracker_pair();

    let info = tracker.recover(&mock::cid1()).await.unwrap();
    assert_eq!(info.status, TrackerStatus::Pinned);
    assert!(tracker.optracker().is_empty());
    assert!(rpc.pin_log().is_empty());
    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn recover_all_targets_only_errors() {
    let (tracker, rpc) = tracker_pair();
    rpc.set_daemon_status(mock::cid2(), IpfsPinStatus::Recursive);
    seed_error_record(&tracker, mock::cid2(), OperationKind::Unpin);

    let infos = tracker.recover_all().await.unwrap();
    let get = |cid: &capstan_core::Cid| {
        infos.iter().find(|r| r.cid == *cid).map(|r| r.status)
    };

    // The failed unpin and the canned drift of cid3 both get work.
    assert!(matches!(
        get(&mock::cid2()),
        Some(TrackerStatus::UnpinQueued | TrackerStatus::Unpinning | TrackerStatus::Unpinned)
    ));
    assert!(matches!(
        get(&mock::cid3()),
        Some(TrackerStatus::PinQueued | TrackerStatus::Pinning | TrackerStatus::Pinned)
    ));
    assert_eq!(get(&mock::cid1()), None);

    wait_for_status(&tracker, &mock::cid2(), TrackerStatus::Unpinned, Duration::from_secs(2)).await;
    wait_for_status(&tracker, &mock::cid3(), TrackerStatus::Pinned, Duration::from_secs(2)).await;
    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn queries_fail_without_a_client() {
    let tracker = Tracker::new(TrackerConfig::default(), mock::peer1(), "peer1");
    let err = tracker.status(&mock::cid1()).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<TrackerError>(),
        Some(&TrackerError::ClientNotSet)
    );
}
