//! Ordered write batches.

use serde::{Deserialize, Serialize};

/// A single mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOp {
    /// Store `value` under `key`, replacing any previous value.
    Put {
        /// Key to write.
        key: Vec<u8>,
        /// Value to write.
        value: Vec<u8>,
    },
    /// Remove `key` if present.
    Delete {
        /// Key to remove.
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// Returns the key this operation touches.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOp::Put { key, .. } | BatchOp::Delete { key } => key,
        }
    }
}

/// An ordered list of puts and deletes applied atomically on commit.
///
/// Later operations on the same key win, so deleting an index entry and then
/// writing it again inside one batch leaves the new value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a put.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Queues a delete.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Delete { key: key.into() });
        self
    }

    /// Appends every operation of `other` after the operations already queued.
    pub fn extend(&mut self, other: WriteBatch) -> &mut Self {
        self.ops.extend(other.ops);
        self
    }

    /// Number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterates over the queued operations in order.
    pub fn ops(&self) -> impl Iterator<Item = &BatchOp> {
        self.ops.iter()
    }

    /// Consumes the batch, yielding its operations.
    #[must_use]
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_preserves_operation_order() {
        let mut batch = WriteBatch::new();
        batch.put(b"k".to_vec(), b"v1".to_vec());
        batch.delete(b"k".to_vec());
        batch.put(b"k".to_vec(), b"v2".to_vec());

        let keys: Vec<_> = batch.ops().map(|op| op.key().to_vec()).collect();
        assert_eq!(keys, vec![b"k".to_vec(); 3]);
        assert!(matches!(batch.into_ops().last(), Some(BatchOp::Put { value, .. }) if value == b"v2"));
    }

    #[test]
    fn batch_extend_appends() {
        let mut first = WriteBatch::new();
        first.put(b"a".to_vec(), b"1".to_vec());
        let mut second = WriteBatch::new();
        second.delete(b"b".to_vec());

        first.extend(second);
        assert_eq!(first.len(), 2);
        assert!(!first.is_empty());
    }
}
