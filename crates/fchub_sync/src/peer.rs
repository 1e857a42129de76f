//! Peer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use crate::state::SyncEngine;
use async_trait::async_trait;
use fchub_core::Message;
use fchub_trie::{NodeMetadata, TrieSnapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The calls diff sync makes against a remote hub.
///
/// This trait abstracts the network layer, so that the engine can be
/// driven by an RPC client or, in tests, by another hub in the same
/// process.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Snapshot of the peer's trie along `prefix`.
    async fn get_sync_snapshot_by_prefix(&self, prefix: &[u8]) -> SyncResult<TrieSnapshot>;

    /// The peer's node at `prefix` with its children.
    async fn get_sync_metadata_by_prefix(&self, prefix: &[u8])
        -> SyncResult<Option<NodeMetadata>>;

    /// Sync ids the peer holds under `prefix`.
    async fn get_all_sync_ids_by_prefix(&self, prefix: &[u8]) -> SyncResult<Vec<Vec<u8>>>;

    /// Messages for the given sync ids. Ids the peer no longer holds are
    /// skipped.
    async fn get_all_messages_by_sync_ids(&self, sync_ids: &[Vec<u8>]) -> SyncResult<Vec<Message>>;
}

/// A peer served by another [`SyncEngine`] in the same process.
#[derive(Debug)]
pub struct InProcessPeer {
    engine: Arc<SyncEngine>,
    reachable: AtomicBool,
}

impl InProcessPeer {
    /// Serves `engine` as a peer.
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            reachable: AtomicBool::new(true),
        }
    }

    /// Makes every call fail with a network error while false.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Returns true if calls currently reach the engine.
    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    fn ensure_reachable(&self) -> SyncResult<()> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(SyncError::network("peer unreachable"))
        }
    }
}

#[async_trait]
impl PeerClient for InProcessPeer {
    async fn get_sync_snapshot_by_prefix(&self, prefix: &[u8]) -> SyncResult<TrieSnapshot> {
        self.ensure_reachable()?;
        self.engine.get_snapshot_by_prefix(prefix).await
    }

    async fn get_sync_metadata_by_prefix(
        &self,
        prefix: &[u8],
    ) -> SyncResult<Option<NodeMetadata>> {
        self.ensure_reachable()?;
        self.engine.get_trie_node_metadata(prefix).await
    }

    async fn get_all_sync_ids_by_prefix(&self, prefix: &[u8]) -> SyncResult<Vec<Vec<u8>>> {
        self.ensure_reachable()?;
        self.engine.get_all_sync_ids_by_prefix(prefix).await
    }

    async fn get_all_messages_by_sync_ids(&self, sync_ids: &[Vec<u8>]) -> SyncResult<Vec<Message>> {
        self.ensure_reachable()?;
        self.engine.get_all_messages_by_sync_ids(sync_ids)
    }
}
