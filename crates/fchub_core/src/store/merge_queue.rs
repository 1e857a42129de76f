//! Per-account merge serialization.

use crate::error::{HubError, HubResult};
use crate::types::Fid;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Striped FIFO locks keyed by fid.
///
/// Merges for one account run one at a time in arrival order. Accounts
/// that hash to different stripes merge in parallel.
#[derive(Debug)]
pub struct MergeQueue {
    stripes: Vec<Mutex<()>>,
    timeout: Duration,
}

impl MergeQueue {
    /// Creates a queue with `stripes` locks and a bounded wait.
    #[must_use]
    pub fn new(stripes: usize, timeout: Duration) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
            timeout,
        }
    }

    /// Waits for the lock of `fid`'s stripe.
    ///
    /// # Errors
    ///
    /// Returns `unavailable.storage_failure` if the wait exceeds the timeout.
    pub async fn acquire(&self, fid: Fid) -> HubResult<MutexGuard<'_, ()>> {
        let index = usize::try_from(fid.as_u64() % self.stripes.len() as u64).unwrap_or(0);
        tokio::time::timeout(self.timeout, self.stripes[index].lock())
            .await
            .map_err(|_| HubError::storage_failure("merge timed out"))
    }
}
