//! Bounded executors that drain the pin and unpin queues.
//!
//! Each queue gets its own worker fanout so that unpins never starve
//! behind slow pins. Workers race every daemon call against the
//! operation's cancellation token; an operation that loses its slot to a
//! newer intent is dropped without touching the record that replaced it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use capstan_core::{ClusterRpc, RpcResult};

use crate::optracker::{Operation, OperationKind, OperationTracker, Phase};

/// Spawns `concurrency` workers sharing one queue receiver.
pub(crate) fn spawn_workers(
    concurrency: usize,
    optracker: Arc<OperationTracker>,
    client: Arc<dyn ClusterRpc>,
    rx: mpsc::Receiver<Arc<Operation>>,
) -> Vec<JoinHandle<()>> {
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    (0..concurrency.max(1))
        .map(|_| tokio::spawn(op_worker(optracker.clone(), client.clone(), rx.clone())))
        .collect()
}

async fn op_worker(
    optracker: Arc<OperationTracker>,
    client: Arc<dyn ClusterRpc>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Arc<Operation>>>>,
) {
    loop {
        let op = {
            let mut rx = rx.lock().await;
            match rx.recv().await {
                Some(op) => op,
                // Queue closed, the tracker is shutting down.
                None => return,
            }
        };
        execute(&optracker, client.as_ref(), op).await;
    }
}

async fn execute(optracker: &OperationTracker, client: &dyn ClusterRpc, op: Arc<Operation>) {
    if op.is_cancelled() {
        return;
    }
    // The operation may have been superseded while it sat in the queue.
    match optracker.get(op.cid()) {
        Some(current) if Arc::ptr_eq(&current, &op) && op.phase() == Phase::Queued => {}
        _ => {
            trace!("skipping superseded {} of {}", op.kind(), op.cid().fmt_short());
            return;
        }
    }

    op.set_phase(Phase::InProgress);
    let token = op.token();
    let result = tokio::select! {
        _ = token.cancelled() => {
            // A newer intent owns the record now; leave it alone.
            debug!("{} of {} cancelled in flight", op.kind(), op.cid().fmt_short());
            return;
        }
        result = daemon_call(client, &op) => result,
    };

    if op.is_cancelled() {
        return;
    }
    match result {
        Ok(()) => {
            debug!("{} of {} done", op.kind(), op.cid().fmt_short());
            op.set_phase(Phase::Done);
            // The token is no longer needed.
            op.cancel();
        }
        Err(err) => {
            warn!("{} of {} failed: {err:#}", op.kind(), op.cid().fmt_short());
            op.set_error(err);
        }
    }
}

async fn daemon_call(client: &dyn ClusterRpc, op: &Operation) -> RpcResult<()> {
    match op.kind() {
        OperationKind::Pin => client.ipfs_pin(op.token(), op.pin()).await,
        OperationKind::Unpin => client.ipfs_unpin(op.token(), op.pin()).await,
        // Remote operations are bookkeeping only and are never queued.
        OperationKind::Remote => Ok(()),
    }
}
