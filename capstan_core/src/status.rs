//! Status enumerations and the reported status row.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::{Cid, PeerId};

/// The reconciled status of a CID as reported by a pin tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerStatus {
    /// A pin operation is waiting for a worker.
    PinQueued,
    /// A pin operation is being executed against the daemon.
    Pinning,
    /// The daemon retains the content.
    Pinned,
    /// The last pin attempt failed, or the daemon should have the content
    /// and does not.
    PinError,
    /// An unpin operation is waiting for a worker.
    UnpinQueued,
    /// An unpin operation is being executed against the daemon.
    Unpinning,
    /// The content is not retained here.
    Unpinned,
    /// The last unpin attempt failed, or the daemon retains content it
    /// should not.
    UnpinError,
    /// The cluster allocates this CID to other peers.
    Remote,
}

impl TrackerStatus {
    pub fn is_error(self) -> bool {
        matches!(self, TrackerStatus::PinError | TrackerStatus::UnpinError)
    }

    /// Nominal statuses require no further work.
    pub fn is_nominal(self) -> bool {
        matches!(
            self,
            TrackerStatus::Pinned | TrackerStatus::Unpinned | TrackerStatus::Remote
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrackerStatus::PinQueued => "pin_queued",
            TrackerStatus::Pinning => "pinning",
            TrackerStatus::Pinned => "pinned",
            TrackerStatus::PinError => "pin_error",
            TrackerStatus::UnpinQueued => "unpin_queued",
            TrackerStatus::Unpinning => "unpinning",
            TrackerStatus::Unpinned => "unpinned",
            TrackerStatus::UnpinError => "unpin_error",
            TrackerStatus::Remote => "remote",
        }
    }
}

impl fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pin state as reported by the storage daemon itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpfsPinStatus {
    Direct,
    Recursive,
    Indirect,
    Unpinned,
    Error,
}

impl IpfsPinStatus {
    /// Whether the daemon considers the content present.
    ///
    /// Only direct and recursive pins count; indirectly pinned content is
    /// retained on behalf of some other pin and can vanish with it.
    pub fn is_pinned(self) -> bool {
        matches!(self, IpfsPinStatus::Direct | IpfsPinStatus::Recursive)
    }
}

impl fmt::Display for IpfsPinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IpfsPinStatus::Direct => "direct",
            IpfsPinStatus::Recursive => "recursive",
            IpfsPinStatus::Indirect => "indirect",
            IpfsPinStatus::Unpinned => "unpinned",
            IpfsPinStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// One row of reconciled status for a CID on a given peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinInfo {
    pub cid: Cid,
    pub peer: PeerId,
    pub peer_name: String,
    /// Pin name from the cluster record, empty when unknown.
    pub name: String,
    pub status: TrackerStatus,
    /// Time of the last status transition, or of the query for
    /// synthesized rows.
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}
