//! A fully wired hub for tests.

use fchub_core::{
    EventId, Fid, HubConfig, HubEventObserver, HubResult, Message, MessageEngine,
    StoreEventHandler,
};
use fchub_storage::{FileStore, KeyValueStore, MemoryStore};
use fchub_sync::{InProcessPeer, SyncConfig, SyncEngine};
use fchub_trie::{MerkleTrieHandle, TrieConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const DB_FILE: &str = "hub.db";

/// Configuration of every layer of a [`TestHub`].
#[derive(Debug, Clone, Default)]
pub struct TestHubConfig {
    /// Stores and commit pipeline.
    pub hub: HubConfig,
    /// Sync trie.
    pub trie: TrieConfig,
    /// Diff sync.
    pub sync: SyncConfig,
}

/// A keyed store, trie actor, event handler, message engine and sync
/// engine wired together the way a hub runs them.
///
/// The trie is registered as an event observer, so every merge, prune and
/// revoke is reflected in it before the call returns. Wiring a hub over an
/// existing store replays the events the trie missed before it is used.
pub struct TestHub {
    db: Arc<dyn KeyValueStore>,
    sync: Arc<SyncEngine>,
    config: TestHubConfig,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl std::fmt::Debug for TestHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestHub")
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

impl TestHub {
    /// Creates a hub over a memory store with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the trie actor or the writer cannot start.
    pub async fn memory() -> HubResult<Self> {
        Self::memory_with(TestHubConfig::default()).await
    }

    /// Creates a hub over a memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the trie actor or the writer cannot start.
    pub async fn memory_with(config: TestHubConfig) -> HubResult<Self> {
        Self::wire(Arc::new(MemoryStore::new()), config, None).await
    }

    /// Creates a hub over a file store in a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or the store cannot be created.
    pub async fn file() -> HubResult<Self> {
        let temp_dir = TempDir::new().map_err(fchub_storage::StorageError::from)?;
        let store = FileStore::open(&temp_dir.path().join(DB_FILE))?;
        Self::wire(Arc::new(store), TestHubConfig::default(), Some(temp_dir)).await
    }

    async fn wire(
        db: Arc<dyn KeyValueStore>,
        config: TestHubConfig,
        temp_dir: Option<TempDir>,
    ) -> HubResult<Self> {
        let trie = MerkleTrieHandle::spawn(Arc::clone(&db), config.trie.clone())?;
        let observer: Arc<dyn HubEventObserver> = Arc::new(trie.clone());
        let events = StoreEventHandler::start(Arc::clone(&db), &config.hub, vec![observer]).await?;
        let engine = Arc::new(MessageEngine::new(events, &config.hub));
        let sync = Arc::new(SyncEngine::start(config.sync.clone(), engine, trie).await?);
        Ok(Self {
            db,
            sync,
            config,
            temp_dir,
        })
    }

    /// Stops the trie and reopens the same file store.
    ///
    /// # Errors
    ///
    /// Returns `invalid_param` for a memory hub, or the error from
    /// flushing or reopening.
    pub async fn reopen(self) -> HubResult<Self> {
        let Some(path) = self.path() else {
            return Err(fchub_core::HubError::invalid_param(
                "only file hubs can be reopened",
            ));
        };
        self.trie().stop().await?;
        let Self {
            db,
            sync,
            config,
            temp_dir,
        } = self;
        drop(sync);
        drop(db);
        let store = FileStore::open(&path)?;
        Self::wire(Arc::new(store), config, temp_dir).await
    }

    /// Opens a second hub over a copy of this hub's file store taken while
    /// this hub keeps running.
    ///
    /// Only committed batches reach the copy. Trie nodes this hub holds in
    /// memory are missing from it, as after a power loss.
    ///
    /// # Errors
    ///
    /// Returns `invalid_param` for a memory hub, or the error from copying
    /// or opening the store.
    pub async fn open_crash_copy(&self) -> HubResult<Self> {
        let Some(path) = self.path() else {
            return Err(fchub_core::HubError::invalid_param(
                "only file hubs can be copied",
            ));
        };
        let temp_dir = TempDir::new().map_err(fchub_storage::StorageError::from)?;
        let copy = temp_dir.path().join(DB_FILE);
        std::fs::copy(&path, &copy).map_err(fchub_storage::StorageError::from)?;
        let store = FileStore::open(&copy)?;
        Self::wire(Arc::new(store), self.config.clone(), Some(temp_dir)).await
    }

    /// Path of the file store, if any.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|dir| dir.path().join(DB_FILE))
    }

    /// Directory holding the file store, if any.
    pub fn dir(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// The keyed store.
    pub fn db(&self) -> &Arc<dyn KeyValueStore> {
        &self.db
    }

    /// The message engine.
    pub fn engine(&self) -> &Arc<MessageEngine> {
        self.sync.engine()
    }

    /// The commit pipeline.
    pub fn events(&self) -> &Arc<StoreEventHandler> {
        self.engine().events()
    }

    /// The trie actor.
    pub fn trie(&self) -> &MerkleTrieHandle {
        self.sync.trie()
    }

    /// The sync engine.
    pub fn sync(&self) -> &Arc<SyncEngine> {
        &self.sync
    }

    /// A peer serving this hub.
    pub fn peer(&self) -> InProcessPeer {
        InProcessPeer::new(Arc::clone(&self.sync))
    }

    /// Merges one message.
    ///
    /// # Errors
    ///
    /// Returns the validation or store error.
    pub async fn merge(&self, message: &Message) -> HubResult<EventId> {
        self.engine().merge_message(message).await
    }

    /// Merges messages in order, keeping every result.
    pub async fn merge_all(&self, messages: &[Message]) -> Vec<HubResult<EventId>> {
        self.engine().merge_messages(messages).await
    }

    /// Every stored message of `fid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn messages(&self, fid: u64) -> HubResult<Vec<Message>> {
        self.engine().get_all_messages_by_fid(Fid::new(fid))
    }

    /// Root hash of the trie.
    ///
    /// # Errors
    ///
    /// Returns an error if the trie actor is gone.
    pub async fn root_hash(&self) -> HubResult<Vec<u8>> {
        Ok(self.trie().root_hash().await?)
    }

    /// Number of sync ids in the trie.
    ///
    /// # Errors
    ///
    /// Returns an error if the trie actor is gone.
    pub async fn trie_items(&self) -> HubResult<u64> {
        Ok(self.trie().items().await?)
    }
}
