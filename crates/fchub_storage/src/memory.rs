//! In-memory keyed store.

use crate::backend::{KeyValueStore, ScanControl};
use crate::batch::{BatchOp, WriteBatch};
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// An in-memory keyed store.
///
/// This store keeps every entry in an ordered map and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral hubs that don't need persistence
///
/// # Thread Safety
///
/// The store is thread-safe and can be shared across threads. Scan visitors
/// run while a read lock is held and must not write back into the store.
///
/// # Example
///
/// ```rust
/// use fchub_storage::{KeyValueStore, MemoryStore, WriteBatch};
///
/// let store = MemoryStore::new();
/// let mut batch = WriteBatch::new();
/// batch.put(b"key".to_vec(), b"value".to_vec());
/// store.commit(batch).unwrap();
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding pre-existing entries.
    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>) -> Self {
        Self {
            data: RwLock::new(entries.into_iter().collect()),
        }
    }

    /// Number of entries in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns a copy of every entry, in key order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.data.write().clear();
    }

    pub(crate) fn apply(&self, ops: Vec<BatchOp>) {
        let mut data = self.data.write();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn commit(&self, batch: WriteBatch) -> StorageResult<()> {
        self.apply(batch.into_ops());
        Ok(())
    }

    fn scan_prefix_from(
        &self,
        prefix: &[u8],
        from: &[u8],
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> ScanControl,
    ) -> StorageResult<()> {
        let data = self.data.read();
        let start = if from < prefix { prefix } else { from };
        let range = data.range::<[u8], _>((Bound::Included(start), Bound::Unbounded));
        for (key, value) in range {
            if !key.starts_with(prefix) {
                break;
            }
            if visitor(key, value) == ScanControl::Stop {
                break;
            }
        }
        Ok(())
    }

    fn last_with_prefix(&self, prefix: &[u8]) -> StorageResult<Option<(Vec<u8>, Vec<u8>)>> {
        let data = self.data.read();
        let upper = match crate::backend::increment_prefix(prefix) {
            Some(bound) => Bound::Excluded(bound),
            None => Bound::Unbounded,
        };
        let last = data
            .range::<[u8], _>((Bound::Included(prefix), upper.as_ref().map(Vec::as_slice)))
            .next_back()
            .map(|(k, v)| (k.clone(), v.clone()));
        Ok(last)
    }
}
