//! The injected service boundary between a pin tracker and the rest of
//! the cluster peer.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::{Cid, IpfsPinStatus, Pin};

pub type RpcResult<T> = anyhow::Result<T>;

/// Returned by [`ClusterRpc::cluster_pin_get`] for CIDs the cluster does
/// not know about.
///
/// Reconcilers treat this as "not desired" rather than as a failure; use
/// [`is_pin_not_found`] to match it on an `anyhow` chain.
#[derive(Debug, Clone, thiserror::Error)]
#[error("pin {cid} not found in cluster state")]
pub struct PinNotFound {
    pub cid: Cid,
}

/// Whether an RPC error is a [`PinNotFound`].
pub fn is_pin_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<PinNotFound>().is_some()
}

/// Capability set a pin tracker needs from its cluster peer and local
/// storage daemon.
///
/// Method names mirror the RPC surface they are backed by:
/// `Cluster.Pins`, `Cluster.PinGet`, `IPFSConnector.Pin`,
/// `IPFSConnector.Unpin`, `IPFSConnector.PinLs` and
/// `IPFSConnector.PinLsCid`.
///
/// Every method takes a cancellation token and must return promptly once
/// it fires, propagating the cancellation to the underlying transport.
#[async_trait::async_trait]
pub trait ClusterRpc: Send + Sync + std::fmt::Debug {
    /// The cluster's shared set of desired pins.
    async fn cluster_pins(&self, ctx: CancellationToken) -> RpcResult<Vec<Pin>>;

    /// The desired-state record for a single CID.
    ///
    /// Fails with [`PinNotFound`] when the cluster does not desire `cid`.
    async fn cluster_pin_get(&self, ctx: CancellationToken, cid: &Cid) -> RpcResult<Pin>;

    /// Asks the daemon to retain the pinned content.
    async fn ipfs_pin(&self, ctx: CancellationToken, pin: &Pin) -> RpcResult<()>;

    /// Asks the daemon to release the pinned content.
    async fn ipfs_unpin(&self, ctx: CancellationToken, pin: &Pin) -> RpcResult<()>;

    /// The daemon's full pin listing. `filter` selects the pin types to
    /// report, e.g. `"recursive"`.
    async fn ipfs_pin_ls(
        &self,
        ctx: CancellationToken,
        filter: &str,
    ) -> RpcResult<HashMap<Cid, IpfsPinStatus>>;

    /// The daemon's pin state for a single CID.
    async fn ipfs_pin_ls_cid(&self, ctx: CancellationToken, cid: &Cid)
    -> RpcResult<IpfsPinStatus>;
}
