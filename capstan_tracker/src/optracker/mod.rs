//! The operation map: at most one live operation per CID.
//!
//! The tracker decides what to do with an incoming intent by consulting
//! this map. Replacement follows a small set of rules: a newer intent
//! cancels and replaces an opposite one, repeats of a live or
//! successfully finished intent are ignored, and a failed record gives
//! way to a retry of the same intent. The old operation's token is fired
//! before the replacement becomes visible, so anyone holding that token
//! observes the cancellation first.

mod operation;

pub use operation::{Operation, OperationKind, Phase};

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use capstan_core::{Cid, PeerId, Pin, PinInfo, TrackerStatus};

/// Owns every [`Operation`] record. All map accesses take one short
/// mutex; no I/O happens under it.
pub struct OperationTracker {
    lifetime: CancellationToken,
    peer_id: PeerId,
    peer_name: String,
    operations: Mutex<HashMap<Cid, Arc<Operation>>>,
}

impl fmt::Debug for OperationTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationTracker")
            .field("peer_id", &self.peer_id)
            .field("operations", &self.operations.lock().unwrap().len())
            .finish()
    }
}

impl OperationTracker {
    pub fn new(lifetime: CancellationToken, peer_id: PeerId, peer_name: String) -> Self {
        Self {
            lifetime,
            peer_id,
            peer_name,
            operations: Mutex::new(HashMap::new()),
        }
    }

    /// Installs a new operation for `pin`'s CID, possibly replacing an
    /// existing one.
    ///
    /// Returns `None` when an equivalent operation already exists: same
    /// intent and still queued, in flight, or finished successfully.
    /// Anything else (opposite intent, or a failed record of the same
    /// intent) is cancelled and atomically replaced; callers never
    /// observe an empty slot in between.
    pub fn track_new_operation(
        &self,
        pin: Pin,
        kind: OperationKind,
        phase: Phase,
    ) -> Option<Arc<Operation>> {
        let mut ops = self.operations.lock().unwrap();
        if let Some(existing) = ops.get(&pin.cid) {
            if existing.kind() == kind && existing.phase() != Phase::Error {
                return None;
            }
            existing.cancel();
        }
        let op = Operation::new(&self.lifetime, pin, kind, phase);
        ops.insert(op.cid().clone(), op.clone());
        Some(op)
    }

    /// Removes `op` from the map, but only while it is still the current
    /// record for its CID. A record that has already been replaced is
    /// left alone.
    pub fn clean(&self, op: &Arc<Operation>) {
        let mut ops = self.operations.lock().unwrap();
        if let Some(current) = ops.get(op.cid())
            && Arc::ptr_eq(current, op)
        {
            ops.remove(op.cid());
        }
    }

    /// The current operation for `cid`, if any.
    pub fn get(&self, cid: &Cid) -> Option<Arc<Operation>> {
        self.operations.lock().unwrap().get(cid).cloned()
    }

    /// Status snapshot for `cid`, or `None` when untracked.
    pub fn pin_info(&self, cid: &Cid) -> Option<PinInfo> {
        self.get(cid)
            .map(|op| op.pin_info(&self.peer_id, &self.peer_name))
    }

    pub fn status(&self, cid: &Cid) -> Option<TrackerStatus> {
        self.get(cid).map(|op| op.tracker_status())
    }

    /// Marks the current operation for `cid` terminally failed. Does
    /// nothing when no operation is present.
    pub fn set_error(&self, cid: &Cid, err: impl fmt::Display) {
        if let Some(op) = self.get(cid) {
            op.set_error(err);
        }
    }

    /// The cancellation token of the current operation for `cid`.
    pub fn op_context(&self, cid: &Cid) -> Option<CancellationToken> {
        self.get(cid).map(|op| op.token())
    }

    /// Status snapshots of all operations matching `pred`, sorted by CID.
    pub fn filter(&self, pred: impl Fn(&Operation) -> bool) -> Vec<PinInfo> {
        let mut infos: Vec<PinInfo> = {
            let ops = self.operations.lock().unwrap();
            ops.values()
                .filter(|op| pred(op))
                .map(|op| op.pin_info(&self.peer_id, &self.peer_name))
                .collect()
        };
        infos.sort_by(|a, b| a.cid.cmp(&b.cid));
        infos
    }

    /// Status snapshots of every tracked operation, sorted by CID.
    pub fn pin_infos(&self) -> Vec<PinInfo> {
        self.filter(|_| true)
    }

    pub fn len(&self) -> usize {
        self.operations.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.lock().unwrap().is_empty()
    }
}
