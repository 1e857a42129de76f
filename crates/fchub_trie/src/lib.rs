//! # Hub Sync Trie
//!
//! Merkle trie over message sync ids, used to tell whether two hubs hold
//! the same messages and, if not, where they differ.
//!
//! - Keys start with a 10-digit decimal timestamp, so the first ten levels
//!   group messages by second
//! - Every node hashes its children in byte order; the shape of the trie is
//!   a function of the key set alone, so equal sets give equal root hashes
//! - Nodes are persisted under their prefix, loaded lazily and unloaded
//!   after a configurable number of mutations
//! - [`MerkleTrieHandle`] runs the trie on its own thread and doubles as a
//!   [`fchub_core::HubEventObserver`] that keeps the trie in step with the
//!   stores
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use fchub_storage::MemoryStore;
//! use fchub_trie::{MerkleTrie, TrieConfig};
//!
//! let mut trie = MerkleTrie::open(Arc::new(MemoryStore::new()), TrieConfig::default()).unwrap();
//! let key = [b"0000000042".as_slice(), &[7u8; 29]].concat();
//! assert!(trie.insert(&key).unwrap());
//! assert!(trie.exists(&key).unwrap());
//! assert_eq!(trie.items(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod actor;
mod config;
mod error;
mod merkle_trie;
mod node;

pub use actor::{MerkleTrieHandle, TrieCheckpoint};
pub use config::TrieConfig;
pub use error::{TrieError, TrieResult};
pub use merkle_trie::{divergence_prefix, empty_hash, MerkleTrie, NodeMetadata, TrieSnapshot};
pub use node::{
    blake3_20, DbTrieNode, TrieNode, MAX_VALUES_RETURNED_PER_CALL, TIMESTAMP_LENGTH,
    TRIE_HASH_LENGTH,
};
