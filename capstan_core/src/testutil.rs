//! Test utilities for exercising pin trackers.
//!
//! This module provides [`MockRpc`], an in-memory [`ClusterRpc`]
//! implementation with a small canned cluster/daemon state and a few
//! well-known CIDs with special behavior.
//!
//! # Usage
//!
//! In your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! capstan_core = { workspace = true, features = ["testutil"] }
//! ```
//!
//! In your test:
//!
//! ```ignore
//! let rpc = Arc::new(MockRpc::new());
//! tracker.set_client(rpc.clone());
//! ```
//!
//! The default state desires [`cid1`] and [`cid3`] and reports [`cid1`]
//! as recursively pinned by the daemon. Special CIDs:
//!
//! - [`slow_cid1`]: pin and unpin block for the configured slow delay
//!   (default 2s), honoring cancellation.
//! - [`pin_cancel_cid`] / [`unpin_cancel_cid`]: the daemon call fails
//!   loudly; tests use these to assert an operation was descheduled
//!   before ever reaching the daemon (check [`MockRpc::pin_log`]).
//! - [`error_cid`]: `cluster_pin_get` fails with a generic error.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::anyhow;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::{Cid, ClusterRpc, IpfsPinStatus, PeerId, Pin, PinNotFound, RpcResult};

pub fn cid1() -> Cid {
    Cid::new("QmP63DkAFEnDYNjDYBpyNDfttu1fvWw99Gpe6sqepAxkcv")
}

pub fn cid2() -> Cid {
    Cid::new("QmP63DkAFEnDYNjDYBpyNDfttu1fvWw99Gpe6sqepAxkcw")
}

pub fn cid3() -> Cid {
    Cid::new("QmP63DkAFEnDYNjDYBpyNDfttu1fvWw99Gpe6sqepAxkcx")
}

pub fn cid4() -> Cid {
    Cid::new("QmP63DkAFEnDYNjDYBpyNDfttu1fvWw99Gpe6sqepAxkcy")
}

/// Pin and unpin calls for this CID take the slow delay to complete.
pub fn slow_cid1() -> Cid {
    Cid::new("QmSlowCid1fvWw99GpeP63DkAFEnDYNjDYBpyNDfttu1sqe")
}

/// The daemon must never see a pin for this CID.
pub fn pin_cancel_cid() -> Cid {
    Cid::new("QmPinCancelCidw99GpeP63DkAFEnDYNjDYBpyNDfttu1sq")
}

/// The daemon must never see an unpin for this CID.
pub fn unpin_cancel_cid() -> Cid {
    Cid::new("QmUnpinCancelCid9GpeP63DkAFEnDYNjDYBpyNDfttu1sq")
}

/// `cluster_pin_get` fails for this CID.
pub fn error_cid() -> Cid {
    Cid::new("QmErrorCid1fvWw99GpeP63DkAFEnDYNjDYBpyNDfttu1sq")
}

pub fn peer1() -> PeerId {
    PeerId::new("12D3KooWGHTKzeT4KaLGLrbKKyT8zKrBPXAUBRzCAN6ZMDMo4M6M")
}

pub fn peer2() -> PeerId {
    PeerId::new("12D3KooWGHTKzeT4KaLGLrbKKyT8zKrBPXAUBRzCAN6ZMDMo4M6N")
}

/// A fresh random CID, for tests that need identifiers with no special
/// behavior attached.
pub fn random_cid() -> Cid {
    const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    let mut rng = rand::rng();
    let tail: String = (0..44)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    Cid::new(format!("Qm{tail}"))
}

#[derive(Debug)]
struct MockState {
    cluster_pins: HashMap<Cid, Pin>,
    daemon: HashMap<Cid, IpfsPinStatus>,
}

/// In-memory [`ClusterRpc`] implementation for tests.
///
/// Successful pin and unpin calls update the simulated daemon state, so
/// status queries observe the effect of executed operations. All calls
/// are recorded; see [`pin_log`](MockRpc::pin_log) and
/// [`unpin_log`](MockRpc::unpin_log).
#[derive(Debug)]
pub struct MockRpc {
    state: Mutex<MockState>,
    pin_log: Mutex<Vec<Cid>>,
    unpin_log: Mutex<Vec<Cid>>,
    slow_delay: Duration,
}

impl Default for MockRpc {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRpc {
    /// A mock with the canned default state: the cluster desires `cid1`
    /// and `cid3`, and the daemon holds `cid1` recursively.
    pub fn new() -> Self {
        let rpc = Self::empty();
        rpc.set_cluster_pin(Pin::cid_only(cid1()));
        rpc.set_cluster_pin(Pin::cid_only(cid3()));
        rpc.set_daemon_status(cid1(), IpfsPinStatus::Recursive);
        rpc
    }

    /// A mock with no cluster pins and an empty daemon.
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(MockState {
                cluster_pins: HashMap::new(),
                daemon: HashMap::new(),
            }),
            pin_log: Mutex::new(Vec::new()),
            unpin_log: Mutex::new(Vec::new()),
            slow_delay: Duration::from_secs(2),
        }
    }

    pub fn with_slow_delay(mut self, delay: Duration) -> Self {
        self.slow_delay = delay;
        self
    }

    /// Adds or replaces a desired pin in the simulated cluster state.
    pub fn set_cluster_pin(&self, pin: Pin) {
        let mut state = self.state.lock().unwrap();
        state.cluster_pins.insert(pin.cid.clone(), pin);
    }

    pub fn remove_cluster_pin(&self, cid: &Cid) {
        let mut state = self.state.lock().unwrap();
        state.cluster_pins.remove(cid);
    }

    /// Sets the simulated daemon's pin state for a CID.
    pub fn set_daemon_status(&self, cid: Cid, status: IpfsPinStatus) {
        let mut state = self.state.lock().unwrap();
        if status == IpfsPinStatus::Unpinned {
            state.daemon.remove(&cid);
        } else {
            state.daemon.insert(cid, status);
        }
    }

    /// CIDs the daemon has been asked to pin, in call order.
    pub fn pin_log(&self) -> Vec<Cid> {
        self.pin_log.lock().unwrap().clone()
    }

    /// CIDs the daemon has been asked to unpin, in call order.
    pub fn unpin_log(&self) -> Vec<Cid> {
        self.unpin_log.lock().unwrap().clone()
    }

    async fn simulate_latency(&self, ctx: &CancellationToken, cid: &Cid) -> RpcResult<()> {
        if *cid != slow_cid1() {
            return Ok(());
        }
        tokio::select! {
            _ = ctx.cancelled() => Err(anyhow!("daemon call for {} interrupted", cid.fmt_short())),
            _ = tokio::time::sleep(self.slow_delay) => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl ClusterRpc for MockRpc {
    async fn cluster_pins(&self, _ctx: CancellationToken) -> RpcResult<Vec<Pin>> {
        let state = self.state.lock().unwrap();
        let mut pins: Vec<Pin> = state.cluster_pins.values().cloned().collect();
        pins.sort_by(|a, b| a.cid.cmp(&b.cid));
        Ok(pins)
    }

    async fn cluster_pin_get(&self, _ctx: CancellationToken, cid: &Cid) -> RpcResult<Pin> {
        if *cid == error_cid() {
            return Err(anyhow!("cluster state unavailable for {cid}"));
        }
        let state = self.state.lock().unwrap();
        state
            .cluster_pins
            .get(cid)
            .cloned()
            .ok_or_else(|| PinNotFound { cid: cid.clone() }.into())
    }

    async fn ipfs_pin(&self, ctx: CancellationToken, pin: &Pin) -> RpcResult<()> {
        self.pin_log.lock().unwrap().push(pin.cid.clone());
        if pin.cid == pin_cancel_cid() {
            return Err(anyhow!(
                "daemon received a pin for {} that should have been descheduled",
                pin.cid.fmt_short()
            ));
        }
        self.simulate_latency(&ctx, &pin.cid).await?;
        let mut state = self.state.lock().unwrap();
        state.daemon.insert(pin.cid.clone(), IpfsPinStatus::Recursive);
        Ok(())
    }

    async fn ipfs_unpin(&self, ctx: CancellationToken, pin: &Pin) -> RpcResult<()> {
        self.unpin_log.lock().unwrap().push(pin.cid.clone());
        if pin.cid == unpin_cancel_cid() {
            return Err(anyhow!(
                "daemon received an unpin for {} that should have been descheduled",
                pin.cid.fmt_short()
            ));
        }
        self.simulate_latency(&ctx, &pin.cid).await?;
        let mut state = self.state.lock().unwrap();
        state.daemon.remove(&pin.cid);
        Ok(())
    }

    async fn ipfs_pin_ls(
        &self,
        _ctx: CancellationToken,
        filter: &str,
    ) -> RpcResult<HashMap<Cid, IpfsPinStatus>> {
        let state = self.state.lock().unwrap();
        let listing = state
            .daemon
            .iter()
            .filter(|(_, status)| match filter {
                "recursive" => **status == IpfsPinStatus::Recursive,
                "direct" => **status == IpfsPinStatus::Direct,
                _ => true,
            })
            .map(|(cid, status)| (cid.clone(), *status))
            .collect();
        Ok(listing)
    }

    async fn ipfs_pin_ls_cid(
        &self,
        _ctx: CancellationToken,
        cid: &Cid,
    ) -> RpcResult<IpfsPinStatus> {
        let state = self.state.lock().unwrap();
        Ok(state.daemon.get(cid).copied().unwrap_or(IpfsPinStatus::Unpinned))
    }
}
