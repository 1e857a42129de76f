//! Sync engine state machine.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::peer::PeerClient;
use fchub_core::{farcaster_time, timestamp_to_padded_prefix, Message, MessageEngine, SyncId};
use fchub_trie::{MerkleTrieHandle, NodeMetadata, TrieSnapshot};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Sync ids inserted per trie command while rebuilding.
const REBUILD_BATCH_SIZE: usize = 1024;

/// Events read per page while replaying the log into the trie.
const REPLAY_PAGE_SIZE: usize = 1024;

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Engine is idle, not syncing.
    Idle,
    /// Engine is comparing snapshots and trie nodes with the peer.
    Comparing,
    /// Engine is fetching sync ids or messages from the peer.
    Fetching,
    /// Engine is merging fetched messages.
    Merging,
}

impl SyncState {
    /// Returns true if a sync is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncState::Idle)
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Sync cycles that ran to completion.
    pub cycles_completed: u64,
    /// Sync cycles that ended with an error.
    pub cycles_failed: u64,
    /// Messages fetched from peers.
    pub messages_fetched: u64,
    /// Fetched messages that merged.
    pub messages_merged: u64,
    /// Fetched messages that were rejected.
    pub merge_failures: u64,
    /// End of the last completed cycle.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of a sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCycleResult {
    /// True if another sync was running and this call did nothing.
    pub skipped: bool,
    /// Prefix at which the snapshots first differed.
    pub divergence_prefix: Vec<u8>,
    /// Trie prefixes compared against the peer.
    pub prefixes_visited: u64,
    /// Missing sync ids requested from the peer.
    pub ids_missing: u64,
    /// Messages received from the peer.
    pub fetched: u64,
    /// Messages that merged.
    pub merged: u64,
    /// Messages that were rejected by the stores.
    pub failed: u64,
    /// True if our snapshot matches the peer's after the cycle.
    pub converged: bool,
    /// Duration of the cycle.
    pub duration: Duration,
}

impl SyncCycleResult {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

// Clears the syncing and cancel flags and the state when a cycle ends,
// however it ends.
struct CycleGuard<'a> {
    engine: &'a SyncEngine,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        *self.engine.state.write() = SyncState::Idle;
        self.engine.cancelled.store(false, Ordering::SeqCst);
        self.engine.syncing.store(false, Ordering::SeqCst);
    }
}

/// Diff-sync driver for one hub.
///
/// Compares trie snapshots with a peer, walks the diverging part of the
/// peer's trie and pulls the messages we lack. Only one cycle runs at a
/// time; concurrent calls return a skipped result.
pub struct SyncEngine {
    config: SyncConfig,
    engine: Arc<MessageEngine>,
    trie: MerkleTrieHandle,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    syncing: AtomicBool,
    cancelled: AtomicBool,
    shutdown: AtomicBool,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Creates a sync engine over a message engine and its trie.
    pub fn new(config: SyncConfig, engine: Arc<MessageEngine>, trie: MerkleTrieHandle) -> Self {
        Self {
            config,
            engine,
            trie,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            syncing: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Creates a sync engine and brings the trie up to date with the
    /// stored messages; see [`SyncEngine::recover_trie`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the trie fails.
    pub async fn start(
        config: SyncConfig,
        engine: Arc<MessageEngine>,
        trie: MerkleTrieHandle,
    ) -> SyncResult<Self> {
        let sync = Self::new(config, engine, trie);
        sync.recover_trie().await?;
        Ok(sync)
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the message engine.
    pub fn engine(&self) -> &Arc<MessageEngine> {
        &self.engine
    }

    /// Gets the trie handle.
    pub fn trie(&self) -> &MerkleTrieHandle {
        &self.trie
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns true while a cycle is running.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// Interrupts the running cycle at its next step, or the next cycle if
    /// none is running.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Cancels the running cycle and every later one.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.cancel();
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancelled.load(Ordering::SeqCst) || self.shutdown.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Latest multiple of the sync threshold not after now.
    ///
    /// # Errors
    ///
    /// Returns an error if the clock is before the protocol epoch.
    pub fn snapshot_timestamp(&self) -> SyncResult<u32> {
        Ok(self.config.snapshot_timestamp(farcaster_time()?))
    }

    /// Our snapshot along `prefix`, or along the current snapshot
    /// timestamp when `prefix` is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the clock or the trie fails.
    pub async fn get_snapshot_by_prefix(&self, prefix: &[u8]) -> SyncResult<TrieSnapshot> {
        if prefix.is_empty() {
            let prefix = timestamp_to_padded_prefix(self.snapshot_timestamp()?);
            Ok(self.trie.get_snapshot(&prefix).await?)
        } else {
            Ok(self.trie.get_snapshot(prefix).await?)
        }
    }

    /// Our trie node at `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the trie fails.
    pub async fn get_trie_node_metadata(&self, prefix: &[u8]) -> SyncResult<Option<NodeMetadata>> {
        Ok(self.trie.get_node_metadata(prefix).await?)
    }

    /// Our sync ids under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the trie fails.
    pub async fn get_all_sync_ids_by_prefix(&self, prefix: &[u8]) -> SyncResult<Vec<Vec<u8>>> {
        Ok(self.trie.get_all_values(prefix).await?)
    }

    /// Stored messages for raw sync ids.
    ///
    /// # Errors
    ///
    /// Returns a protocol error for a malformed id, or the store error.
    pub fn get_all_messages_by_sync_ids(&self, sync_ids: &[Vec<u8>]) -> SyncResult<Vec<Message>> {
        let ids = sync_ids
            .iter()
            .map(|bytes| SyncId::from_bytes(bytes).map_err(|e| SyncError::protocol(e.to_string())))
            .collect::<SyncResult<Vec<_>>>()?;
        Ok(self.engine.get_all_messages_by_sync_ids(&ids)?)
    }

    /// Returns true if the peer's snapshot differs from ours at the same
    /// prefix. Always false while a cycle is running.
    ///
    /// # Errors
    ///
    /// Returns an error if the trie fails.
    pub async fn should_sync(&self, theirs: &TrieSnapshot) -> SyncResult<bool> {
        if self.is_syncing() {
            debug!("should_sync: already syncing");
            return Ok(false);
        }
        let ours = self.get_snapshot_by_prefix(&theirs.prefix).await?;
        Ok(ours.excluded_hashes != theirs.excluded_hashes)
    }

    /// Fetches the peer's current snapshot and syncs if it differs.
    ///
    /// # Errors
    ///
    /// Returns an error if the peer or the local hub fails.
    pub async fn sync_with_peer(&self, peer: &dyn PeerClient) -> SyncResult<SyncCycleResult> {
        let prefix = timestamp_to_padded_prefix(self.snapshot_timestamp()?);
        let theirs = self
            .peer_call(peer.get_sync_snapshot_by_prefix(&prefix))
            .await?;
        if !self.should_sync(&theirs).await? {
            debug!("snapshots match, skipping sync");
            return Ok(SyncCycleResult {
                converged: true,
                ..SyncCycleResult::default()
            });
        }
        self.perform_sync(&theirs, peer).await
    }

    /// Pulls every message the peer has under the diverging part of
    /// `theirs` and merges it.
    ///
    /// Rejected messages are counted and skipped. A peer failure aborts
    /// the cycle; messages merged up to that point stay merged.
    ///
    /// # Errors
    ///
    /// Returns an error if the peer is unreachable, a peer call times out,
    /// the cycle is cancelled or the local trie fails.
    pub async fn perform_sync(
        &self,
        theirs: &TrieSnapshot,
        peer: &dyn PeerClient,
    ) -> SyncResult<SyncCycleResult> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("perform_sync: already syncing");
            return Ok(SyncCycleResult::skipped());
        }
        let _guard = CycleGuard { engine: self };

        let start = Instant::now();
        let mut result = SyncCycleResult::default();
        match self.run_cycle(theirs, peer, &mut result).await {
            Ok(()) => {
                result.duration = start.elapsed();
                let mut stats = self.stats.write();
                stats.cycles_completed += 1;
                stats.messages_fetched += result.fetched;
                stats.messages_merged += result.merged;
                stats.merge_failures += result.failed;
                stats.last_sync_time = Some(Instant::now());
                stats.last_error = None;
                drop(stats);
                info!(
                    prefix = %String::from_utf8_lossy(&result.divergence_prefix),
                    fetched = result.fetched,
                    merged = result.merged,
                    failed = result.failed,
                    converged = result.converged,
                    "sync complete"
                );
                Ok(result)
            }
            Err(e) => {
                let mut stats = self.stats.write();
                stats.cycles_failed += 1;
                stats.messages_fetched += result.fetched;
                stats.messages_merged += result.merged;
                stats.merge_failures += result.failed;
                stats.last_error = Some(e.to_string());
                drop(stats);
                warn!(error = %e, merged = result.merged, "sync aborted");
                Err(e)
            }
        }
    }

    async fn run_cycle(
        &self,
        theirs: &TrieSnapshot,
        peer: &dyn PeerClient,
        result: &mut SyncCycleResult,
    ) -> SyncResult<()> {
        self.check_cancelled()?;
        if self.trie.checkpoint().await?.needs_rebuild {
            warn!("trie is out of step with the stores, rebuilding");
            self.rebuild_trie().await?;
        }

        self.set_state(SyncState::Comparing);
        let ours = self.trie.get_snapshot(&theirs.prefix).await?;
        let divergence = self
            .trie
            .get_divergence_prefix(&ours.prefix, theirs.excluded_hashes.clone())
            .await?;
        debug!(
            divergence = %String::from_utf8_lossy(&divergence),
            prefix = %String::from_utf8_lossy(&ours.prefix),
            "divergence prefix"
        );
        result.divergence_prefix.clone_from(&divergence);

        let mut pending = vec![divergence];
        while let Some(prefix) = pending.pop() {
            self.check_cancelled()?;
            self.set_state(SyncState::Comparing);
            result.prefixes_visited += 1;

            let our_node = self.trie.get_node_metadata(&prefix).await?;
            let Some(their_node) = self
                .peer_call(peer.get_sync_metadata_by_prefix(&prefix))
                .await?
            else {
                continue;
            };
            if their_node.num_messages == 0 {
                warn!(prefix = %String::from_utf8_lossy(&prefix), "peer node has no messages");
                continue;
            }
            if our_node.as_ref().map(|node| &node.hash) == Some(&their_node.hash) {
                continue;
            }

            if their_node.num_messages <= self.config.hashes_per_fetch {
                if let Some(our_node) = &our_node {
                    if our_node.num_messages > their_node.num_messages {
                        debug!(
                            prefix = %String::from_utf8_lossy(&prefix),
                            ours = our_node.num_messages,
                            theirs = their_node.num_messages,
                            "we hold more messages, skipping node"
                        );
                        continue;
                    }
                }
                self.set_state(SyncState::Fetching);
                let ids = self
                    .peer_call(peer.get_all_sync_ids_by_prefix(&their_node.prefix))
                    .await?;
                self.fetch_and_merge(ids, peer, result).await?;
            } else {
                // Reverse so the smallest child is visited first.
                for (key, child) in their_node.children.iter().rev() {
                    let our_child = our_node.as_ref().and_then(|node| node.children.get(key));
                    if our_child.map(|node| &node.hash) != Some(&child.hash) {
                        pending.push(child.prefix.clone());
                    }
                }
            }
        }

        self.set_state(SyncState::Comparing);
        let after = self.trie.get_snapshot(&theirs.prefix).await?;
        result.converged = after.excluded_hashes == theirs.excluded_hashes;
        Ok(())
    }

    async fn fetch_and_merge(
        &self,
        ids: Vec<Vec<u8>>,
        peer: &dyn PeerClient,
        result: &mut SyncCycleResult,
    ) -> SyncResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let present = self.trie.exists_many(ids.clone()).await?;
        let missing: Vec<Vec<u8>> = ids
            .into_iter()
            .zip(present)
            .filter_map(|(id, present)| (!present).then_some(id))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        result.ids_missing += missing.len() as u64;

        let mut messages = self
            .peer_call(peer.get_all_messages_by_sync_ids(&missing))
            .await?;
        result.fetched += messages.len() as u64;

        self.set_state(SyncState::Merging);
        messages.sort_by_key(Message::timestamp);
        let mut first_error = None;
        for message in &messages {
            self.check_cancelled()?;
            match self.engine.merge_message(message).await {
                Ok(event_id) => {
                    result.merged += 1;
                    debug!(fid = message.fid().as_u64(), event_id, "merged synced message");
                }
                Err(e) => {
                    result.failed += 1;
                    debug!(fid = message.fid().as_u64(), error = %e, "synced message rejected");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            warn!(
                total = messages.len(),
                failed = result.failed,
                error = %e,
                code = e.code(),
                "failed to merge synced messages"
            );
        }
        self.set_state(SyncState::Fetching);
        Ok(())
    }

    async fn peer_call<T>(&self, call: impl Future<Output = SyncResult<T>>) -> SyncResult<T> {
        tokio::time::timeout(self.config.sync_interrupt_timeout, call)
            .await
            .map_err(|_| SyncError::Timeout)?
    }

    /// Brings the trie up to date with the stores.
    ///
    /// Replays the events logged after the trie's persisted checkpoint. A
    /// trie with no checkpoint while the log is not empty, one marked for
    /// rebuild, or one whose replay fails is rebuilt from the stored
    /// messages. Returns the number of events replayed or ids inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the trie fails.
    pub async fn recover_trie(&self) -> SyncResult<u64> {
        let checkpoint = self.trie.checkpoint().await?;
        let last = self.engine.events().last_event_id()?;
        debug!(checkpoint = ?checkpoint, last_event_id = ?last, "recovering trie");

        if checkpoint.needs_rebuild {
            return self.rebuild_trie().await;
        }
        let Some(last) = last else {
            return Ok(0);
        };
        let Some(applied) = checkpoint.applied else {
            info!(last_event_id = last, "trie has no checkpoint");
            return self.rebuild_trie().await;
        };
        if applied >= last {
            return Ok(0);
        }

        match self.replay_events(applied).await {
            Ok(replayed) => {
                info!(from = applied, to = last, replayed, "replayed events into trie");
                Ok(replayed)
            }
            Err(e) => {
                warn!(error = %e, "event replay failed");
                self.rebuild_trie().await
            }
        }
    }

    async fn replay_events(&self, after: u64) -> SyncResult<u64> {
        let events = self.engine.events();
        let mut from = after.saturating_add(1);
        let mut replayed = 0u64;
        loop {
            let page = events.get_events(Some(from), REPLAY_PAGE_SIZE)?;
            for event in &page {
                self.trie.apply_event(event).await?;
                replayed += 1;
            }
            match page.last() {
                Some(event) if page.len() == REPLAY_PAGE_SIZE => from = event.id.saturating_add(1),
                _ => break,
            }
        }
        self.trie.commit().await?;
        Ok(replayed)
    }

    /// Clears the trie and reinserts the sync id of every stored message.
    ///
    /// Returns the number of ids inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the trie fails.
    pub async fn rebuild_trie(&self) -> SyncResult<u64> {
        info!("rebuilding sync trie");
        self.trie.clear().await?;
        let last_event_id = self.engine.events().last_event_id()?;

        let mut ids = Vec::new();
        self.engine.for_each_message(&mut |message| {
            ids.push(SyncId::from_message(message)?);
            Ok(())
        })?;

        for chunk in ids.chunks(REBUILD_BATCH_SIZE) {
            self.trie.insert_many(chunk).await?;
        }
        self.trie.finish_rebuild(last_event_id).await?;
        self.trie.commit().await?;
        let items = self.trie.items().await?;
        info!(items, "rebuilt sync trie");
        Ok(items)
    }
}
