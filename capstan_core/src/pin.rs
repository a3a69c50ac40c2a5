//! Desired-state pin records as emitted by the cluster.

use crate::{Cid, PeerId};

/// Options attached to a [`Pin`] by the cluster.
///
/// Replication factors and the traversal depth use `-1` for "unbounded",
/// mirroring the wire representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinOptions {
    pub replication_factor_min: i32,
    pub replication_factor_max: i32,
    /// Human-readable name for the pin, may be empty.
    pub name: String,
    /// Maximum DAG traversal depth when pinning, `-1` for unlimited.
    pub max_depth: i32,
}

impl Default for PinOptions {
    fn default() -> Self {
        Self {
            replication_factor_min: -1,
            replication_factor_max: -1,
            name: String::new(),
            max_depth: -1,
        }
    }
}

/// A declaration that a CID should be retained by the cluster.
///
/// Pins are immutable once emitted by the cluster. `allocations` lists the
/// peers responsible for retaining the content; an empty list means every
/// peer is responsible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pin {
    pub cid: Cid,
    pub options: PinOptions,
    pub allocations: Vec<PeerId>,
}

impl Pin {
    /// A pin for `cid` with the given options and no explicit allocations.
    pub fn with_opts(cid: Cid, options: PinOptions) -> Self {
        Self {
            cid,
            options,
            allocations: Vec::new(),
        }
    }

    /// A bare pin carrying only the CID, used where options are irrelevant
    /// (unpin requests, lookups).
    pub fn cid_only(cid: Cid) -> Self {
        Self::with_opts(cid, PinOptions::default())
    }

    pub fn with_allocations(mut self, allocations: Vec<PeerId>) -> Self {
        self.allocations = allocations;
        self
    }

    /// Whether this pin is somebody else's responsibility.
    ///
    /// A pin is remote for `peer` when it has explicit allocations and
    /// `peer` is not among them.
    pub fn is_remote_for(&self, peer: &PeerId) -> bool {
        !self.allocations.is_empty() && !self.allocations.contains(peer)
    }
}
