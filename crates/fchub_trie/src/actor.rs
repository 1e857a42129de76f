//! Trie actor: a dedicated thread that owns a [`MerkleTrie`] and serves
//! commands over a channel.

use crate::config::TrieConfig;
use crate::error::{TrieError, TrieResult};
use crate::merkle_trie::{MerkleTrie, NodeMetadata, TrieSnapshot};
use async_trait::async_trait;
use fchub_core::{EventId, HubEvent, HubEventBody, HubEventObserver, HubResult, SyncId};
use fchub_storage::KeyValueStore;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

type Reply<T> = oneshot::Sender<TrieResult<T>>;

/// How far the trie has caught up with the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieCheckpoint {
    /// Last event applied in memory.
    pub applied: Option<EventId>,
    /// Last event whose changes are persisted.
    pub persisted: Option<EventId>,
    /// True after a failed update; the trie must be rebuilt.
    pub needs_rebuild: bool,
}

/// Commands sent to the trie actor.
enum TrieCommand {
    Insert {
        key: Vec<u8>,
        resp: Reply<bool>,
    },
    Delete {
        key: Vec<u8>,
        resp: Reply<bool>,
    },
    Exists {
        key: Vec<u8>,
        resp: Reply<bool>,
    },
    ExistsMany {
        keys: Vec<Vec<u8>>,
        resp: Reply<Vec<bool>>,
    },
    Apply {
        event_id: Option<EventId>,
        deletes: Vec<Vec<u8>>,
        inserts: Vec<Vec<u8>>,
        resp: Reply<()>,
    },
    Snapshot {
        prefix: Vec<u8>,
        resp: Reply<TrieSnapshot>,
    },
    DivergencePrefix {
        prefix: Vec<u8>,
        excluded_hashes: Vec<Vec<u8>>,
        resp: Reply<Vec<u8>>,
    },
    NodeMetadata {
        prefix: Vec<u8>,
        resp: Reply<Option<NodeMetadata>>,
    },
    AllValues {
        prefix: Vec<u8>,
        resp: Reply<Vec<Vec<u8>>>,
    },
    Items {
        resp: oneshot::Sender<u64>,
    },
    RootHash {
        resp: oneshot::Sender<Vec<u8>>,
    },
    Checkpoint {
        resp: oneshot::Sender<TrieCheckpoint>,
    },
    FinishRebuild {
        last_event_id: Option<EventId>,
        resp: oneshot::Sender<()>,
    },
    Commit {
        resp: Reply<()>,
    },
    Clear {
        resp: Reply<()>,
    },
    Stop {
        resp: Reply<()>,
    },
}

struct TrieActor {
    trie: MerkleTrie,
    rx: mpsc::Receiver<TrieCommand>,
}

impl TrieActor {
    fn run(mut self) {
        info!(items = self.trie.items(), "trie actor started");
        while let Some(cmd) = self.rx.blocking_recv() {
            match cmd {
                TrieCommand::Insert { key, resp } => {
                    let _ = resp.send(self.trie.insert(&key));
                }
                TrieCommand::Delete { key, resp } => {
                    let _ = resp.send(self.trie.delete(&key));
                }
                TrieCommand::Exists { key, resp } => {
                    let _ = resp.send(self.trie.exists(&key));
                }
                TrieCommand::ExistsMany { keys, resp } => {
                    let result: TrieResult<Vec<bool>> = keys.iter().map(|key| self.trie.exists(key)).collect();
                    let _ = resp.send(result);
                }
                TrieCommand::Apply {
                    event_id,
                    deletes,
                    inserts,
                    resp,
                } => {
                    let _ = resp.send(self.apply(event_id, &deletes, &inserts));
                }
                TrieCommand::Snapshot { prefix, resp } => {
                    let _ = resp.send(self.trie.get_snapshot(&prefix));
                }
                TrieCommand::DivergencePrefix {
                    prefix,
                    excluded_hashes,
                    resp,
                } => {
                    let _ = resp.send(self.trie.get_divergence_prefix(&prefix, &excluded_hashes));
                }
                TrieCommand::NodeMetadata { prefix, resp } => {
                    let _ = resp.send(self.trie.get_node_metadata(&prefix));
                }
                TrieCommand::AllValues { prefix, resp } => {
                    let _ = resp.send(self.trie.get_all_values(&prefix));
                }
                TrieCommand::Items { resp } => {
                    let _ = resp.send(self.trie.items());
                }
                TrieCommand::RootHash { resp } => {
                    let _ = resp.send(self.trie.root_hash());
                }
                TrieCommand::Checkpoint { resp } => {
                    let _ = resp.send(TrieCheckpoint {
                        applied: self.trie.applied_event_id(),
                        persisted: self.trie.checkpoint(),
                        needs_rebuild: self.trie.needs_rebuild(),
                    });
                }
                TrieCommand::FinishRebuild {
                    last_event_id,
                    resp,
                } => {
                    self.trie.finish_rebuild(last_event_id);
                    let _ = resp.send(());
                }
                TrieCommand::Commit { resp } => {
                    let _ = resp.send(self.trie.commit());
                }
                TrieCommand::Clear { resp } => {
                    let _ = resp.send(self.trie.clear());
                }
                TrieCommand::Stop { resp } => {
                    let _ = resp.send(self.trie.unload());
                    info!("trie actor stopped");
                    return;
                }
            }
        }
        if let Err(e) = self.trie.commit() {
            warn!(error = %e, "failed to flush trie on shutdown");
        }
        debug!("trie actor channel closed");
    }

    fn apply(
        &mut self,
        event_id: Option<EventId>,
        deletes: &[Vec<u8>],
        inserts: &[Vec<u8>],
    ) -> TrieResult<()> {
        let result = self.mutate(deletes, inserts);
        match &result {
            Ok(()) => {
                if let Some(id) = event_id {
                    self.trie.mark_applied(id);
                }
            }
            Err(e) => {
                error!(event_id = ?event_id, error = %e, "trie update failed");
                if let Err(e) = self.trie.invalidate() {
                    error!(error = %e, "failed to drop trie checkpoint");
                }
            }
        }
        result
    }

    fn mutate(&mut self, deletes: &[Vec<u8>], inserts: &[Vec<u8>]) -> TrieResult<()> {
        for key in deletes {
            self.trie.delete(key)?;
        }
        for key in inserts {
            self.trie.insert(key)?;
        }
        Ok(())
    }
}

/// Cloneable handle to the trie actor.
///
/// Every call is a request/response round trip; calls from one handle are
/// applied in the order they were sent.
#[derive(Clone)]
pub struct MerkleTrieHandle {
    tx: mpsc::Sender<TrieCommand>,
}

impl std::fmt::Debug for MerkleTrieHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerkleTrieHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl MerkleTrieHandle {
    /// Opens the trie persisted in `db` and starts its actor thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be loaded or the thread cannot
    /// be spawned.
    pub fn spawn(db: Arc<dyn KeyValueStore>, config: TrieConfig) -> TrieResult<Self> {
        let (tx, rx) = mpsc::channel(config.command_queue_capacity.max(1));
        let trie = MerkleTrie::open(db, config)?;
        let actor = TrieActor { trie, rx };
        std::thread::Builder::new()
            .name("merkle-trie".into())
            .spawn(move || actor.run())
            .map_err(|e| TrieError::Spawn(e.to_string()))?;
        Ok(Self { tx })
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> TrieCommand,
    ) -> TrieResult<T> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(build(resp))
            .await
            .map_err(|_| TrieError::ActorStopped)?;
        rx.await.map_err(|_| TrieError::ActorStopped)
    }

    /// Inserts a sync id.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone or the insert fails.
    pub async fn insert(&self, id: &SyncId) -> TrieResult<bool> {
        let key = id.as_bytes().to_vec();
        self.request(|resp| TrieCommand::Insert { key, resp }).await?
    }

    /// Deletes a sync id.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone or the delete fails.
    pub async fn delete(&self, id: &SyncId) -> TrieResult<bool> {
        let key = id.as_bytes().to_vec();
        self.request(|resp| TrieCommand::Delete { key, resp }).await?
    }

    /// Returns true if the sync id is present.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone or a node cannot be loaded.
    pub async fn exists(&self, id: &SyncId) -> TrieResult<bool> {
        let key = id.as_bytes().to_vec();
        self.request(|resp| TrieCommand::Exists { key, resp }).await?
    }

    /// Checks several raw keys in one round trip.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone or a node cannot be loaded.
    pub async fn exists_many(&self, keys: Vec<Vec<u8>>) -> TrieResult<Vec<bool>> {
        self.request(|resp| TrieCommand::ExistsMany { keys, resp })
            .await?
    }

    /// Inserts several sync ids in one round trip.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone or an insert fails.
    pub async fn insert_many(&self, ids: &[SyncId]) -> TrieResult<()> {
        let inserts = ids.iter().map(|id| id.as_bytes().to_vec()).collect();
        self.apply(Vec::new(), inserts).await
    }

    /// Applies the trie changes of one hub event and records it as applied.
    ///
    /// A failed update invalidates the trie; see
    /// [`MerkleTrieHandle::checkpoint`].
    ///
    /// # Errors
    ///
    /// Returns an error if a sync id cannot be derived, the actor is gone
    /// or a mutation fails.
    pub async fn apply_event(&self, event: &HubEvent) -> HubResult<()> {
        let (deletes, inserts) = match &event.body {
            HubEventBody::MergeMessage {
                message,
                deleted_messages,
            } => (
                deleted_messages
                    .iter()
                    .map(sync_id_bytes)
                    .collect::<HubResult<Vec<_>>>()?,
                vec![sync_id_bytes(message)?],
            ),
            HubEventBody::PruneMessage { message } | HubEventBody::RevokeMessage { message } => {
                (vec![sync_id_bytes(message)?], Vec::new())
            }
            HubEventBody::MergeOnChainEvent { .. } | HubEventBody::MergeUsernameProof { .. } => {
                (Vec::new(), Vec::new())
            }
        };
        self.request(|resp| TrieCommand::Apply {
            event_id: Some(event.id),
            deletes,
            inserts,
            resp,
        })
        .await??;
        Ok(())
    }

    /// Reports how far the trie has caught up with the event log.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone.
    pub async fn checkpoint(&self) -> TrieResult<TrieCheckpoint> {
        self.request(|resp| TrieCommand::Checkpoint { resp }).await
    }

    /// Ends a rebuild started by [`MerkleTrieHandle::clear`].
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone.
    pub async fn finish_rebuild(&self, last_event_id: Option<EventId>) -> TrieResult<()> {
        self.request(|resp| TrieCommand::FinishRebuild {
            last_event_id,
            resp,
        })
        .await
    }

    /// Deletes then inserts raw keys as one command.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone or a mutation fails.
    pub async fn apply(&self, deletes: Vec<Vec<u8>>, inserts: Vec<Vec<u8>>) -> TrieResult<()> {
        self.request(|resp| TrieCommand::Apply {
            event_id: None,
            deletes,
            inserts,
            resp,
        })
        .await?
    }

    /// Summarizes the trie along `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone or a node cannot be loaded.
    pub async fn get_snapshot(&self, prefix: &[u8]) -> TrieResult<TrieSnapshot> {
        let prefix = prefix.to_vec();
        self.request(|resp| TrieCommand::Snapshot { prefix, resp })
            .await?
    }

    /// Prefix at which `excluded_hashes` first differ from ours.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone or a node cannot be loaded.
    pub async fn get_divergence_prefix(
        &self,
        prefix: &[u8],
        excluded_hashes: Vec<Vec<u8>>,
    ) -> TrieResult<Vec<u8>> {
        let prefix = prefix.to_vec();
        self.request(|resp| TrieCommand::DivergencePrefix {
            prefix,
            excluded_hashes,
            resp,
        })
        .await?
    }

    /// Describes the node at `prefix` and its children.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone or a node cannot be loaded.
    pub async fn get_node_metadata(&self, prefix: &[u8]) -> TrieResult<Option<NodeMetadata>> {
        let prefix = prefix.to_vec();
        self.request(|resp| TrieCommand::NodeMetadata { prefix, resp })
            .await?
    }

    /// Keys under `prefix`, capped per call.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone or a node cannot be loaded.
    pub async fn get_all_values(&self, prefix: &[u8]) -> TrieResult<Vec<Vec<u8>>> {
        let prefix = prefix.to_vec();
        self.request(|resp| TrieCommand::AllValues { prefix, resp })
            .await?
    }

    /// Keys in the trie.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone.
    pub async fn items(&self) -> TrieResult<u64> {
        self.request(|resp| TrieCommand::Items { resp }).await
    }

    /// Root hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone.
    pub async fn root_hash(&self) -> TrieResult<Vec<u8>> {
        self.request(|resp| TrieCommand::RootHash { resp }).await
    }

    /// Flushes pending node writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone or the flush fails.
    pub async fn commit(&self) -> TrieResult<()> {
        self.request(|resp| TrieCommand::Commit { resp }).await?
    }

    /// Removes every key.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is gone or the store rejects the
    /// deletion.
    pub async fn clear(&self) -> TrieResult<()> {
        self.request(|resp| TrieCommand::Clear { resp }).await?
    }

    /// Flushes, unloads and stops the actor. Later calls on any handle
    /// fail with [`TrieError::ActorStopped`].
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is already gone or the flush fails.
    pub async fn stop(&self) -> TrieResult<()> {
        self.request(|resp| TrieCommand::Stop { resp }).await?
    }
}

fn sync_id_bytes(message: &fchub_core::Message) -> HubResult<Vec<u8>> {
    Ok(SyncId::from_message(message)?.into_bytes())
}

#[async_trait]
impl HubEventObserver for MerkleTrieHandle {
    async fn on_event(&self, event: &HubEvent) -> HubResult<()> {
        self.apply_event(event).await
    }
}
