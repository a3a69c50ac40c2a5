#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use capstan_core::testutil::{self as mock, MockRpc};
use capstan_core::{Cid, TrackerStatus};
use capstan_tracker::{Tracker, TrackerConfig};

/// A tracker wired to a fresh mock RPC client with one worker per queue,
/// so queueing behavior is deterministic.
pub fn tracker_pair() -> (Tracker, Arc<MockRpc>) {
    tracker_with_config(TrackerConfig {
        concurrent_pins: 1,
        ..TrackerConfig::default()
    })
}

pub fn tracker_with_config(config: TrackerConfig) -> (Tracker, Arc<MockRpc>) {
    let rpc = Arc::new(MockRpc::new());
    let tracker = Tracker::new(config, mock::peer1(), "peer1");
    tracker.set_client(rpc.clone());
    (tracker, rpc)
}

/// Polls until the operation map reports `want` for `cid`.
pub async fn wait_for_status(tracker: &Tracker, cid: &Cid, want: TrackerStatus, within: Duration) {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let got = tracker.optracker().status(cid);
        if got == Some(want) {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {cid} to reach {want}, currently {got:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
