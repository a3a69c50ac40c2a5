use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use capstan_core::{Cid, PeerId, Pin, PinInfo, TrackerStatus};

/// The intent an operation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Make the daemon retain the content.
    Pin,
    /// Make the daemon release the content.
    Unpin,
    /// The content is some other peer's responsibility; nothing to
    /// execute locally.
    Remote,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Pin => "pin",
            OperationKind::Unpin => "unpin",
            OperationKind::Remote => "remote",
        };
        f.write_str(s)
    }
}

/// Execution stage of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a worker.
    Queued,
    /// A worker is executing the daemon call.
    InProgress,
    /// Finished successfully.
    Done,
    /// Finished with a recorded error.
    Error,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Error)
    }
}

#[derive(Debug)]
struct Mutable {
    phase: Phase,
    error: Option<String>,
    timestamp: DateTime<Utc>,
}

/// A single tracked unit of intent toward a CID.
///
/// Operations are shared between the operation map and the worker
/// executing them; the phase, error and timestamp live behind a mutex,
/// while the kind, pin record and cancellation token are fixed at
/// creation. Once a terminal phase is reached the record is frozen; a
/// newer intent replaces it in the map instead of mutating it.
#[derive(Debug)]
pub struct Operation {
    pin: Pin,
    kind: OperationKind,
    token: CancellationToken,
    mutable: Mutex<Mutable>,
}

impl Operation {
    pub(crate) fn new(
        lifetime: &CancellationToken,
        pin: Pin,
        kind: OperationKind,
        phase: Phase,
    ) -> Arc<Self> {
        Arc::new(Self {
            pin,
            kind,
            token: lifetime.child_token(),
            mutable: Mutex::new(Mutable {
                phase,
                error: None,
                timestamp: Utc::now(),
            }),
        })
    }

    pub fn cid(&self) -> &Cid {
        &self.pin.cid
    }

    pub fn pin(&self) -> &Pin {
        &self.pin
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn phase(&self) -> Phase {
        self.mutable.lock().unwrap().phase
    }

    /// Advances the execution stage. Ignored once the operation is
    /// terminal; terminal records are replaced, not mutated.
    pub fn set_phase(&self, phase: Phase) {
        let mut m = self.mutable.lock().unwrap();
        if m.phase.is_terminal() {
            return;
        }
        m.phase = phase;
        m.timestamp = Utc::now();
    }

    pub fn error(&self) -> Option<String> {
        self.mutable.lock().unwrap().error.clone()
    }

    /// Marks the operation terminally failed and releases its token.
    /// Ignored once the operation is terminal.
    pub fn set_error(&self, err: impl fmt::Display) {
        {
            let mut m = self.mutable.lock().unwrap();
            if m.phase.is_terminal() {
                return;
            }
            m.phase = Phase::Error;
            m.error = Some(err.to_string());
            m.timestamp = Utc::now();
        }
        self.token.cancel();
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.mutable.lock().unwrap().timestamp
    }

    /// Fires the operation's cancellation token. Safe to call any number
    /// of times and concurrently with map mutation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A handle on the operation's cancellation token, for callers that
    /// need to wait for it to fire.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Projects the (kind, phase) pair onto the reported status set.
    pub fn tracker_status(&self) -> TrackerStatus {
        status_for(self.kind, self.phase())
    }

    pub(crate) fn pin_info(&self, peer: &PeerId, peer_name: &str) -> PinInfo {
        let m = self.mutable.lock().unwrap();
        PinInfo {
            cid: self.pin.cid.clone(),
            peer: peer.clone(),
            peer_name: peer_name.to_string(),
            name: self.pin.options.name.clone(),
            status: status_for(self.kind, m.phase),
            timestamp: m.timestamp,
            error: m.error.clone(),
        }
    }
}

fn status_for(kind: OperationKind, phase: Phase) -> TrackerStatus {
    match (kind, phase) {
        (OperationKind::Pin, Phase::Queued) => TrackerStatus::PinQueued,
        (OperationKind::Pin, Phase::InProgress) => TrackerStatus::Pinning,
        (OperationKind::Pin, Phase::Done) => TrackerStatus::Pinned,
        (OperationKind::Pin, Phase::Error) => TrackerStatus::PinError,
        (OperationKind::Unpin, Phase::Queued) => TrackerStatus::UnpinQueued,
        (OperationKind::Unpin, Phase::InProgress) => TrackerStatus::Unpinning,
        (OperationKind::Unpin, Phase::Done) => TrackerStatus::Unpinned,
        (OperationKind::Unpin, Phase::Error) => TrackerStatus::UnpinError,
        (OperationKind::Remote, _) => TrackerStatus::Remote,
    }
}
