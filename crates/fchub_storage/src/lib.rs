//! # Hub Storage
//!
//! Keyed store abstraction and implementations for the hub.
//!
//! Everything the hub persists (message records, set indices, the event log
//! and merkle trie nodes) lives in a single ordered key-value namespace.
//! Stores in this crate are **opaque byte maps**: they know nothing about
//! message layouts or key prefixes.
//!
//! ## Design Principles
//!
//! - Reads are point lookups or ascending prefix scans
//! - Writes are collected in a [`WriteBatch`] and applied atomically by
//!   [`KeyValueStore::commit`]
//! - Stores must be `Send + Sync` so they can be shared behind an `Arc`
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - For testing and ephemeral hubs
//! - [`FileStore`] - Durable store backed by an append-only batch log
//!
//! ## Example
//!
//! ```rust
//! use fchub_storage::{KeyValueStore, MemoryStore, WriteBatch};
//!
//! let store = MemoryStore::new();
//! let mut batch = WriteBatch::new();
//! batch.put(b"a:1".to_vec(), b"one".to_vec());
//! batch.put(b"a:2".to_vec(), b"two".to_vec());
//! store.commit(batch).unwrap();
//!
//! assert_eq!(store.get(b"a:1").unwrap(), Some(b"one".to_vec()));
//! assert_eq!(store.count_prefix(b"a:").unwrap(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod batch;
mod error;
mod file;
mod memory;

pub use backend::{increment_prefix, KeyValueStore, ScanControl};
pub use batch::{BatchOp, WriteBatch};
pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;
