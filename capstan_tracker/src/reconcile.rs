//! Status derivation and the sync/recover flows.
//!
//! A CID's reported status joins three sources: the cluster's desired
//! pin set, the daemon's own listing, and the operation map. Live or
//! terminal operation records take precedence; for everything else the
//! status is synthesized from desired-versus-actual:
//!
//! - desired and allocated here, daemon has it: pinned
//! - desired and allocated here, daemon lacks it: pin error (drift)
//! - desired but allocated to other peers: remote
//! - not desired, daemon has it: unpin error (drift)
//! - not desired, daemon lacks it: omitted
//!
//! Sync reads the bulk sources once per pass; races with concurrent
//! track/untrack calls are tolerated and resolved on the next cycle.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use capstan_core::{
    Cid, ClusterRpc, IpfsPinStatus, Pin, PinInfo, TrackerStatus, is_pin_not_found,
};

use crate::optracker::{OperationKind, Phase};
use crate::tracker::Tracker;

impl Tracker {
    /// Reconciled status of a single CID. Never mutates; an existing
    /// operation record answers without consulting the RPC sources.
    pub async fn status(&self, cid: &Cid) -> Result<PinInfo> {
        if let Some(info) = self.optracker().pin_info(cid) {
            return Ok(info);
        }
        let client = self.client()?.clone();
        let ctx = self.query_token();
        let desired = self.desired_pin(&client, &ctx, cid).await?;
        let present = client.ipfs_pin_ls_cid(ctx, cid).await?.is_pinned();
        Ok(self.synthesize(cid, desired.as_ref(), present))
    }

    /// Reconciled status of every known CID: the union of the cluster
    /// pin set, the daemon listing and the operation map. Never mutates.
    pub async fn status_all(&self) -> Result<Vec<PinInfo>> {
        let client = self.client()?.clone();
        let ctx = self.query_token();
        let desired = client.cluster_pins(ctx.clone()).await?;
        let listing = client.ipfs_pin_ls(ctx, "recursive").await?;
        Ok(self.join_snapshot(&desired, &listing))
    }

    /// Recomputes status for every known CID and enqueues corrective
    /// operations where it finds errors or drift: a pin when content is
    /// desired here and missing, an unpin when it is retained without
    /// being desired. Stale error records whose daemon state already
    /// matches desire are dropped instead.
    ///
    /// Returns the infos of exactly those CIDs that reported an error
    /// status when the sync began, carrying their post-sync status.
    pub async fn sync_all(&self) -> Result<Vec<PinInfo>> {
        let client = self.client()?.clone();
        let ctx = self.query_token();
        let desired = client.cluster_pins(ctx.clone()).await?;
        let listing = client.ipfs_pin_ls(ctx.clone(), "recursive").await?;
        let snapshot = self.join_snapshot(&desired, &listing);

        // Content the daemon still holds for pins that moved to other
        // peers is drift as well; release it without reporting, since
        // those rows were nominal at call time.
        for info in &snapshot {
            if info.status == TrackerStatus::Remote
                && listing.get(&info.cid).is_some_and(|s| s.is_pinned())
            {
                debug!(
                    "{} moved to other peers, releasing local copy",
                    info.cid.fmt_short()
                );
                let _ = self.enqueue(Pin::cid_only(info.cid.clone()), OperationKind::Unpin);
            }
        }

        let attention = snapshot.into_iter().filter(|i| i.status.is_error());
        let corrected = join_all(attention.map(|info| {
            let client = client.clone();
            let ctx = ctx.clone();
            async move { self.correct(&client, &ctx, info).await }
        }))
        .await;
        corrected.into_iter().collect()
    }

    /// Re-evaluates a single CID and, when its status is an error,
    /// enqueues the corrective operation. Returns the resulting info.
    pub async fn recover(&self, cid: &Cid) -> Result<PinInfo> {
        let info = self.status(cid).await?;
        if !info.status.is_error() {
            return Ok(info);
        }
        let client = self.client()?.clone();
        let ctx = self.query_token();
        self.correct(&client, &ctx, info).await
    }

    /// [`recover`](Tracker::recover) for every CID currently reporting
    /// an error status.
    pub async fn recover_all(&self) -> Result<Vec<PinInfo>> {
        let client = self.client()?.clone();
        let ctx = self.query_token();
        let errored = self
            .status_all()
            .await?
            .into_iter()
            .filter(|i| i.status.is_error());
        let corrected = join_all(errored.map(|info| {
            let client = client.clone();
            let ctx = ctx.clone();
            async move { self.correct(&client, &ctx, info).await }
        }))
        .await;
        corrected.into_iter().collect()
    }

    // --- Join internals ---

    fn join_snapshot(
        &self,
        desired: &[Pin],
        listing: &HashMap<Cid, IpfsPinStatus>,
    ) -> Vec<PinInfo> {
        // Operation records answer first, including terminal ones.
        let mut rows: HashMap<Cid, PinInfo> = self
            .optracker()
            .pin_infos()
            .into_iter()
            .map(|info| (info.cid.clone(), info))
            .collect();
        for pin in desired {
            if rows.contains_key(&pin.cid) {
                continue;
            }
            let present = listing.get(&pin.cid).is_some_and(|s| s.is_pinned());
            rows.insert(pin.cid.clone(), self.synthesize(&pin.cid, Some(pin), present));
        }
        for (cid, status) in listing {
            if !status.is_pinned() || rows.contains_key(cid) {
                continue;
            }
            rows.insert(cid.clone(), self.synthesize(cid, None, true));
        }
        let mut rows: Vec<PinInfo> = rows.into_values().collect();
        rows.sort_by(|a, b| a.cid.cmp(&b.cid));
        rows
    }

    fn synthesize(&self, cid: &Cid, desired: Option<&Pin>, present: bool) -> PinInfo {
        let name = desired.map(|p| p.options.name.as_str()).unwrap_or("");
        let (status, error) = match desired {
            Some(pin) if pin.is_remote_for(self.peer_id()) => (TrackerStatus::Remote, None),
            Some(_) if present => (TrackerStatus::Pinned, None),
            Some(_) => (
                TrackerStatus::PinError,
                Some("expected to be pinned by the daemon but it is not".to_string()),
            ),
            None if present => (
                TrackerStatus::UnpinError,
                Some("retained by the daemon but absent from the cluster pin set".to_string()),
            ),
            None => (TrackerStatus::Unpinned, None),
        };
        self.make_info(cid, name, status, error)
    }

    /// Corrects one errored row. Both sources are re-checked for the
    /// specific CID, since the bulk snapshot may lag the daemon and
    /// error records can outlive the failure that produced them.
    async fn correct(
        &self,
        client: &Arc<dyn ClusterRpc>,
        ctx: &CancellationToken,
        info: PinInfo,
    ) -> Result<PinInfo> {
        let cid = info.cid;
        let desired = self.desired_pin(client, ctx, &cid).await?;
        let present = client.ipfs_pin_ls_cid(ctx.clone(), &cid).await?.is_pinned();
        match desired {
            Some(pin) if !pin.is_remote_for(self.peer_id()) => {
                if present {
                    // Stale failure; the daemon already agrees with the
                    // cluster.
                    self.clean_failed_record(&cid);
                    let name = pin.options.name.clone();
                    Ok(self.make_info(&cid, &name, TrackerStatus::Pinned, None))
                } else {
                    Ok(self.enqueue_corrective(pin, OperationKind::Pin))
                }
            }
            Some(pin) => {
                if present {
                    Ok(self.enqueue_corrective(Pin::cid_only(cid), OperationKind::Unpin))
                } else {
                    self.optracker()
                        .track_new_operation(pin, OperationKind::Remote, Phase::Done);
                    Ok(self.make_info(&cid, "", TrackerStatus::Remote, None))
                }
            }
            None => {
                if present {
                    Ok(self.enqueue_corrective(Pin::cid_only(cid), OperationKind::Unpin))
                } else {
                    self.clean_failed_record(&cid);
                    Ok(self.make_info(&cid, "", TrackerStatus::Unpinned, None))
                }
            }
        }
    }

    fn clean_failed_record(&self, cid: &Cid) {
        if let Some(op) = self.optracker().get(cid)
            && op.phase() == Phase::Error
        {
            self.optracker().clean(&op);
        }
    }

    fn enqueue_corrective(&self, pin: Pin, kind: OperationKind) -> PinInfo {
        let cid = pin.cid.clone();
        let name = pin.options.name.clone();
        // A failed enqueue leaves an error record behind; the snapshot
        // below reports whichever outcome we got.
        let _ = self.enqueue(pin, kind);
        self.optracker().pin_info(&cid).unwrap_or_else(|| {
            let status = if kind == OperationKind::Pin {
                TrackerStatus::PinQueued
            } else {
                TrackerStatus::UnpinQueued
            };
            self.make_info(&cid, &name, status, None)
        })
    }

    async fn desired_pin(
        &self,
        client: &Arc<dyn ClusterRpc>,
        ctx: &CancellationToken,
        cid: &Cid,
    ) -> Result<Option<Pin>> {
        match client.cluster_pin_get(ctx.clone(), cid).await {
            Ok(pin) => Ok(Some(pin)),
            Err(err) if is_pin_not_found(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn make_info(
        &self,
        cid: &Cid,
        name: &str,
        status: TrackerStatus,
        error: Option<String>,
    ) -> PinInfo {
        PinInfo {
            cid: cid.clone(),
            peer: self.peer_id().clone(),
            peer_name: self.peer_name().to_string(),
            name: name.to_string(),
            status,
            timestamp: Utc::now(),
            error,
        }
    }
}
