//! The public pin tracker facade.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tracing::{debug, error, info};

use capstan_core::{Cid, ClusterRpc, PeerId, Pin};

use crate::config::TrackerConfig;
use crate::optracker::{Operation, OperationKind, OperationTracker, Phase};
use crate::worker;

/// Errors the facade reports synchronously. Execution failures never
/// surface here; they become terminal operation phases observed through
/// status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("pin tracker is shutting down")]
    ShuttingDown,
    #[error("rpc client not attached")]
    ClientNotSet,
    #[error("operation queue is full")]
    QueueFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Running,
    ShuttingDown,
    Terminated,
}

struct Queues {
    pin_tx: mpsc::Sender<Arc<Operation>>,
    unpin_tx: mpsc::Sender<Arc<Operation>>,
}

/// Stateless pin tracker.
///
/// Created with the peer's identity and configuration, it becomes
/// operable once the RPC client is attached with
/// [`set_client`](Tracker::set_client). Intents submitted before that
/// queue up and are executed as soon as the workers start.
///
/// `track` and `untrack` return after at most one operation-map mutation
/// and one non-blocking queue send; they never wait on the daemon.
pub struct Tracker {
    config: TrackerConfig,
    peer_id: PeerId,
    peer_name: String,
    lifetime: CancellationToken,
    optracker: Arc<OperationTracker>,
    client: OnceLock<Arc<dyn ClusterRpc>>,
    state: Mutex<State>,
    queues: Mutex<Option<Queues>>,
    pending_rx: Mutex<Option<(mpsc::Receiver<Arc<Operation>>, mpsc::Receiver<Arc<Operation>>)>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("peer_id", &self.peer_id)
            .field("state", &*self.state.lock().unwrap())
            .finish()
    }
}

impl Tracker {
    pub fn new(config: TrackerConfig, peer_id: PeerId, peer_name: impl Into<String>) -> Self {
        let peer_name = peer_name.into();
        let lifetime = CancellationToken::new();
        let optracker = Arc::new(OperationTracker::new(
            lifetime.clone(),
            peer_id.clone(),
            peer_name.clone(),
        ));
        let capacity = config.max_pin_queue_size.max(1);
        let (pin_tx, pin_rx) = mpsc::channel(capacity);
        let (unpin_tx, unpin_rx) = mpsc::channel(capacity);
        Self {
            config,
            peer_id,
            peer_name,
            lifetime,
            optracker,
            client: OnceLock::new(),
            state: Mutex::new(State::Created),
            queues: Mutex::new(Some(Queues { pin_tx, unpin_tx })),
            pending_rx: Mutex::new(Some((pin_rx, unpin_rx))),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Attaches the RPC client and starts the worker pools. Must be
    /// called from within a tokio runtime. Subsequent calls are ignored.
    pub fn set_client(&self, client: Arc<dyn ClusterRpc>) {
        if matches!(
            *self.state.lock().unwrap(),
            State::ShuttingDown | State::Terminated
        ) {
            return;
        }
        if self.client.set(client.clone()).is_err() {
            return;
        }
        let Some((pin_rx, unpin_rx)) = self.pending_rx.lock().unwrap().take() else {
            return;
        };
        let mut workers = self.workers.lock().unwrap();
        workers.extend(worker::spawn_workers(
            self.config.concurrent_pins,
            self.optracker.clone(),
            client.clone(),
            pin_rx,
        ));
        workers.extend(worker::spawn_workers(
            self.config.concurrent_pins,
            self.optracker.clone(),
            client,
            unpin_rx,
        ));
        let mut state = self.state.lock().unwrap();
        if *state == State::Created {
            *state = State::Running;
        }
    }

    /// Drives `pin`'s CID toward being pinned by the local daemon, or
    /// marks it remote when the pin is allocated to other peers.
    pub fn track(&self, pin: Pin) -> Result<(), TrackerError> {
        self.check_accepting()?;
        if pin.is_remote_for(&self.peer_id) {
            debug!("{} is allocated elsewhere, marking remote", pin.cid.fmt_short());
            self.optracker
                .track_new_operation(pin, OperationKind::Remote, Phase::Done);
            return Ok(());
        }
        self.enqueue(pin, OperationKind::Pin)
    }

    /// Drives `cid` toward being unpinned by the local daemon.
    pub fn untrack(&self, cid: &Cid) -> Result<(), TrackerError> {
        self.check_accepting()?;
        self.enqueue(Pin::cid_only(cid.clone()), OperationKind::Unpin)
    }

    pub(crate) fn enqueue(&self, pin: Pin, kind: OperationKind) -> Result<(), TrackerError> {
        let Some(op) = self.optracker.track_new_operation(pin, kind, Phase::Queued) else {
            // An equivalent operation already covers this intent.
            return Ok(());
        };
        let queues = self.queues.lock().unwrap();
        let Some(queues) = queues.as_ref() else {
            return Err(TrackerError::ShuttingDown);
        };
        let tx = if kind == OperationKind::Pin {
            &queues.pin_tx
        } else {
            &queues.unpin_tx
        };
        match tx.try_send(op) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(op)) => {
                error!("cannot queue {} of {}: queue is full", kind, op.cid().fmt_short());
                op.set_error("operation queue is full");
                Err(TrackerError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(TrackerError::ShuttingDown),
        }
    }

    /// Stops the tracker: cancels every live operation token, discards
    /// queued work and drains both worker pools. Safe to call more than
    /// once; later calls return immediately.
    pub async fn shutdown(&self) -> Result<(), TrackerError> {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                State::ShuttingDown | State::Terminated => return Ok(()),
                _ => *state = State::ShuttingDown,
            }
        }
        info!("stopping pin tracker");
        self.lifetime.cancel();
        // Closing the queues lets idle workers see the end of input.
        *self.queues.lock().unwrap() = None;
        self.pending_rx.lock().unwrap().take();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }
        *self.state.lock().unwrap() = State::Terminated;
        Ok(())
    }

    /// The operation map. Exposes per-CID snapshots, filters and
    /// operation contexts.
    pub fn optracker(&self) -> &OperationTracker {
        &self.optracker
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn peer_name(&self) -> &str {
        &self.peer_name
    }

    pub(crate) fn client(&self) -> Result<&Arc<dyn ClusterRpc>, TrackerError> {
        self.client.get().ok_or(TrackerError::ClientNotSet)
    }

    /// A child token of the tracker lifetime for read-only RPC fanout,
    /// so shutdown interrupts in-flight queries.
    pub(crate) fn query_token(&self) -> CancellationToken {
        self.lifetime.child_token()
    }

    fn check_accepting(&self) -> Result<(), TrackerError> {
        match *self.state.lock().unwrap() {
            State::ShuttingDown | State::Terminated => Err(TrackerError::ShuttingDown),
            State::Created | State::Running => Ok(()),
        }
    }
}
