//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for diff sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// A peer node with at most this many messages is fetched whole
    /// instead of being walked child by child.
    pub hashes_per_fetch: u64,
    /// Snapshots are taken at a multiple of this many seconds, so that
    /// messages younger than that do not trigger a sync.
    pub sync_threshold_secs: u32,
    /// Upper bound on a single peer call.
    pub sync_interrupt_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            hashes_per_fetch: 50,
            sync_threshold_secs: 10,
            sync_interrupt_timeout: Duration::from_secs(30),
        }
    }
}

impl SyncConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the whole-node fetch threshold.
    #[must_use]
    pub const fn hashes_per_fetch(mut self, hashes: u64) -> Self {
        self.hashes_per_fetch = hashes;
        self
    }

    /// Sets the snapshot granularity in seconds. Zero is treated as one.
    #[must_use]
    pub const fn sync_threshold_secs(mut self, secs: u32) -> Self {
        self.sync_threshold_secs = secs;
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub const fn sync_interrupt_timeout(mut self, timeout: Duration) -> Self {
        self.sync_interrupt_timeout = timeout;
        self
    }

    /// Snapshot timestamp for the given farcaster time.
    #[must_use]
    pub fn snapshot_timestamp(&self, now: u32) -> u32 {
        let threshold = self.sync_threshold_secs.max(1);
        (now / threshold) * threshold
    }
}
