//! # Hub Sync Engine
//!
//! Diff sync between hubs over the merkle trie of sync ids.
//!
//! This crate provides:
//! - Sync state machine (idle → comparing → fetching → merging)
//! - Snapshot comparison to skip peers that already match
//! - Depth-first walk of the diverging part of the peer's trie
//! - Peer abstraction with an in-process implementation
//! - Trie rebuild from the message stores
//!
//! ## Architecture
//!
//! Sync is **pull only**: a hub fetches what it lacks and merges it through
//! its own stores, which update its own trie. Two hubs that have seen the
//! same messages end with the same root hash regardless of arrival order,
//! because every store applies the same ordering rule before the trie is
//! touched.
//!
//! ## Key Invariants
//!
//! - Only one cycle runs per engine; concurrent calls are skipped
//! - A rejected message never aborts a cycle
//! - A peer failure aborts the cycle without touching local state
//! - Every peer call is bounded by a timeout

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod peer;
mod state;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use peer::{InProcessPeer, PeerClient};
pub use state::{SyncCycleResult, SyncEngine, SyncState, SyncStats};
