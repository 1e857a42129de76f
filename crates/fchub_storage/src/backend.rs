//! Keyed store trait definition.

use crate::batch::WriteBatch;
use crate::error::StorageResult;

/// Tells a prefix scan whether to keep visiting entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    /// Visit the next entry.
    Continue,
    /// Stop the scan after this entry.
    Stop,
}

/// A transactional, ordered key-value store.
///
/// Keys are compared as raw bytes. All writes go through [`WriteBatch`] so
/// that a multi-key mutation (a message record plus its indices plus the
/// event describing it) is applied all-or-nothing.
///
/// # Invariants
///
/// - `commit` applies the batch operations in order, atomically
/// - a failed `commit` leaves the store unchanged
/// - scans visit keys in ascending byte order
/// - stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or an I/O error occurs.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Atomically applies every operation in `batch`.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be made durable. Nothing is
    /// applied in that case.
    fn commit(&self, batch: WriteBatch) -> StorageResult<()>;

    /// Visits entries whose key starts with `prefix` and is `>= from`,
    /// in ascending key order, until the visitor returns [`ScanControl::Stop`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or an I/O error occurs.
    fn scan_prefix_from(
        &self,
        prefix: &[u8],
        from: &[u8],
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> ScanControl,
    ) -> StorageResult<()>;

    /// Returns the entry with the greatest key under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or an I/O error occurs.
    fn last_with_prefix(&self, prefix: &[u8]) -> StorageResult<Option<(Vec<u8>, Vec<u8>)>> {
        let mut last = None;
        self.scan_prefix(prefix, &mut |key, value| {
            last = Some((key.to_vec(), value.to_vec()));
            ScanControl::Continue
        })?;
        Ok(last)
    }

    /// Visits every entry whose key starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or an I/O error occurs.
    fn scan_prefix(
        &self,
        prefix: &[u8],
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> ScanControl,
    ) -> StorageResult<()> {
        self.scan_prefix_from(prefix, prefix, visitor)
    }

    /// Returns the entry with the smallest key under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or an I/O error occurs.
    fn first_with_prefix(&self, prefix: &[u8]) -> StorageResult<Option<(Vec<u8>, Vec<u8>)>> {
        let mut first = None;
        self.scan_prefix(prefix, &mut |key, value| {
            first = Some((key.to_vec(), value.to_vec()));
            ScanControl::Stop
        })?;
        Ok(first)
    }

    /// Counts the entries under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or an I/O error occurs.
    fn count_prefix(&self, prefix: &[u8]) -> StorageResult<u64> {
        let mut count = 0u64;
        self.scan_prefix(prefix, &mut |_, _| {
            count += 1;
            ScanControl::Continue
        })?;
        Ok(count)
    }

    /// Collects every entry under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or an I/O error occurs.
    fn entries_with_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut entries = Vec::new();
        self.scan_prefix(prefix, &mut |key, value| {
            entries.push((key.to_vec(), value.to_vec()));
            ScanControl::Continue
        })?;
        Ok(entries)
    }
}

/// Returns the smallest byte string greater than every key starting with
/// `prefix`, or `None` when no such bound exists (empty or all-`0xff`).
#[must_use]
pub fn increment_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.pop() {
        if last < u8::MAX {
            bound.push(last + 1);
            return Some(bound);
        }
    }
    None
}
