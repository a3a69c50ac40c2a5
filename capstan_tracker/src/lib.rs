//! # Capstan stateless pin tracker
//!
//! Translates desired-state changes from the cluster into bounded,
//! cancellable pin and unpin operations against the local storage
//! daemon, tracks their progress, and reports reconciled status.
//!
//! The tracker is *stateless*: nothing is persisted, and its whole truth
//! is recomputable from the cluster's shared pin set plus the daemon's
//! own pin listing.
//!
//! ## Layers
//! 1. `optracker` – the operation map, the single mutable ground truth
//!    for queued and in-flight work.
//! 2. `worker` – fixed-concurrency executors draining one pin queue and
//!    one unpin queue.
//! 3. `reconcile` – status derivation by joining the cluster pin set,
//!    the daemon listing and the operation map; sync and recover flows.
//! 4. `tracker` – the [`Tracker`] facade applications use.

pub mod config;
pub mod optracker;
mod reconcile;
mod tracker;
mod worker;

pub use config::TrackerConfig;
pub use optracker::{Operation, OperationKind, OperationTracker, Phase};
pub use tracker::{Tracker, TrackerError};
