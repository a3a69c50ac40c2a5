//! Core capstan types and the cluster/daemon service boundary.
//!
//! This crate defines the shared types used by all capstan crates.
//!
//! ## Protocol types
//!
//! - Content identifiers (`cid::Cid`)
//! - Peer identifiers (`peer::PeerId`)
//! - Desired-state pin records (`pin::Pin`, `pin::PinOptions`)
//! - Status enumerations (`status::TrackerStatus`, `status::IpfsPinStatus`)
//!   and the reported status row (`status::PinInfo`)
//!
//! These types cross the RPC boundary between cluster peers and the local
//! storage daemon; their meaning is stable.
//!
//! ## Service boundary
//!
//! The [`ClusterRpc`] trait is the single injected capability set a pin
//! tracker needs: the cluster's shared pin set (`cluster_pins`,
//! `cluster_pin_get`) and the daemon's pinning surface (`ipfs_pin`,
//! `ipfs_unpin`, `ipfs_pin_ls`, `ipfs_pin_ls_cid`). Production peers back
//! it with their RPC transport; tests substitute the in-memory
//! implementation from [`testutil`].
//!
//! Every method takes a cancellation token and is expected to return
//! promptly once it fires.

pub mod cid;
pub mod peer;
pub mod pin;
pub mod rpc;
pub mod status;

// Test utilities (behind feature flag)
#[cfg(feature = "testutil")]
pub mod testutil;

pub use cid::Cid;
pub use peer::PeerId;
pub use pin::{Pin, PinOptions};
pub use rpc::{ClusterRpc, PinNotFound, RpcResult, is_pin_not_found};
pub use status::{IpfsPinStatus, PinInfo, TrackerStatus};
