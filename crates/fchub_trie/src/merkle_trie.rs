//! The sync trie over a keyed store.

use crate::config::TrieConfig;
use crate::error::{TrieError, TrieResult};
use crate::node::{blake3_20, DbTrieNode, NodeStore, TrieNode, MAX_VALUES_RETURNED_PER_CALL};
use fchub_core::keys::{self, RootPrefix};
use fchub_core::EventId;
use fchub_storage::{KeyValueStore, ScanControl, WriteBatch};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-depth summary of the trie along a prefix.
///
/// `excluded_hashes[i]` hashes every child of the node at `prefix[..i]`
/// except the one on the path; the last entry is the hash of the node at
/// `prefix` itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrieSnapshot {
    /// Deepest prefix that exists in the trie.
    pub prefix: Vec<u8>,
    /// Sibling-exclusive hash per depth.
    pub excluded_hashes: Vec<Vec<u8>>,
    /// Keys covered by the hashes.
    pub num_messages: u64,
}

/// A node and its direct children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Prefix of the node.
    pub prefix: Vec<u8>,
    /// Keys in the subtree.
    pub num_messages: u64,
    /// Merkle hash of the subtree.
    pub hash: Vec<u8>,
    /// Children keyed by their byte, without grandchildren.
    pub children: BTreeMap<u8, NodeMetadata>,
}

/// First prefix of `prefix` at which two snapshots disagree.
///
/// A depth missing from both sides counts as equal. Returns the whole
/// prefix when every depth matches.
#[must_use]
pub fn divergence_prefix(prefix: &[u8], ours: &[Vec<u8>], theirs: &[Vec<u8>]) -> Vec<u8> {
    for i in 0..prefix.len() {
        if ours.get(i) != theirs.get(i) {
            return prefix[..i].to_vec();
        }
    }
    prefix.to_vec()
}

/// Merkle trie of sync ids.
///
/// Node writes are buffered and flushed by [`MerkleTrie::commit`], which
/// also runs automatically every `unload_threshold` mutations, after which
/// the in-memory children of the root are dropped and reloaded on demand.
///
/// Every flush also persists the checkpoint: the id of the last hub event
/// whose changes the flushed nodes contain. After a crash the trie is
/// brought up to date by replaying the events after the checkpoint. A trie
/// without a checkpoint, or one invalidated by a failed update, must be
/// rebuilt from the stored messages.
pub struct MerkleTrie {
    db: Arc<dyn KeyValueStore>,
    root: TrieNode,
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    config: TrieConfig,
    mutations: usize,
    checkpoint: Option<EventId>,
    applied: Option<EventId>,
    invalid: bool,
    rebuilding: bool,
}

impl std::fmt::Debug for MerkleTrie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerkleTrie")
            .field("items", &self.root.items())
            .field("root_hash", &hex::encode(self.root.hash()))
            .field("pending", &self.pending.len())
            .field("applied", &self.applied)
            .field("invalid", &self.invalid)
            .finish_non_exhaustive()
    }
}

impl MerkleTrie {
    /// Opens the trie persisted in `db`, or an empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if the root record cannot be read or decoded.
    pub fn open(db: Arc<dyn KeyValueStore>, config: TrieConfig) -> TrieResult<Self> {
        let root = match db.get(&keys::trie_node_key(&[]))? {
            Some(bytes) => TrieNode::from_db(DbTrieNode::decode(&bytes)?),
            None => TrieNode::new(),
        };
        let checkpoint = match db.get(&keys::trie_checkpoint_key())? {
            Some(bytes) => Some(decode_checkpoint(&bytes)?),
            None => None,
        };
        info!(items = root.items(), checkpoint = ?checkpoint, "opened merkle trie");
        Ok(Self {
            db,
            root,
            pending: BTreeMap::new(),
            config,
            mutations: 0,
            checkpoint,
            applied: checkpoint,
            invalid: false,
            rebuilding: false,
        })
    }

    /// Inserts a key. Returns false if it was already present.
    ///
    /// # Errors
    ///
    /// Returns an error if a node cannot be loaded or the key is shorter
    /// than the path it needs.
    pub fn insert(&mut self, key: &[u8]) -> TrieResult<bool> {
        let mut store = NodeStore {
            db: self.db.as_ref(),
            pending: &mut self.pending,
        };
        let inserted = self.root.insert(key, &mut store, 0)?;
        if inserted {
            self.after_mutation()?;
        }
        Ok(inserted)
    }

    /// Deletes a key. Returns false if it was not present.
    ///
    /// # Errors
    ///
    /// Returns an error if a node cannot be loaded.
    pub fn delete(&mut self, key: &[u8]) -> TrieResult<bool> {
        let mut store = NodeStore {
            db: self.db.as_ref(),
            pending: &mut self.pending,
        };
        let deleted = self.root.delete(key, &mut store, 0)?;
        if deleted {
            self.after_mutation()?;
        }
        Ok(deleted)
    }

    /// Returns true if the key is present.
    ///
    /// # Errors
    ///
    /// Returns an error if a node cannot be loaded.
    pub fn exists(&mut self, key: &[u8]) -> TrieResult<bool> {
        let store = NodeStore {
            db: self.db.as_ref(),
            pending: &mut self.pending,
        };
        self.root.exists(key, &store, 0)
    }

    /// Summarizes the trie along `prefix`.
    ///
    /// If the trie ends before `prefix` does, the snapshot is taken at the
    /// deepest existing prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if a node cannot be loaded.
    pub fn get_snapshot(&mut self, prefix: &[u8]) -> TrieResult<TrieSnapshot> {
        let store = NodeStore {
            db: self.db.as_ref(),
            pending: &mut self.pending,
        };
        let mut excluded_hashes = Vec::with_capacity(prefix.len() + 1);
        let mut num_messages = 0;
        let mut node = &mut self.root;

        for (i, &char) in prefix.iter().enumerate() {
            let (hash, items) = node.excluded_hash(&prefix[..i], char, &store)?;
            excluded_hashes.push(hash);
            num_messages += items;
            if !node.child_chars().any(|c| c == char) {
                return Ok(TrieSnapshot {
                    prefix: prefix[..i].to_vec(),
                    excluded_hashes,
                    num_messages,
                });
            }
            node = node.get_or_load_child(&prefix[..i], char, &store)?;
        }

        excluded_hashes.push(node.hash().to_vec());
        num_messages += node.items();
        Ok(TrieSnapshot {
            prefix: prefix.to_vec(),
            excluded_hashes,
            num_messages,
        })
    }

    /// Prefix at which a peer's excluded hashes first differ from ours.
    ///
    /// # Errors
    ///
    /// Returns an error if a node cannot be loaded.
    pub fn get_divergence_prefix(
        &mut self,
        prefix: &[u8],
        their_excluded_hashes: &[Vec<u8>],
    ) -> TrieResult<Vec<u8>> {
        let ours = self.get_snapshot(prefix)?;
        Ok(divergence_prefix(
            prefix,
            &ours.excluded_hashes,
            their_excluded_hashes,
        ))
    }

    /// Describes the node at `prefix` and its children.
    ///
    /// # Errors
    ///
    /// Returns an error if a node cannot be loaded.
    pub fn get_node_metadata(&mut self, prefix: &[u8]) -> TrieResult<Option<NodeMetadata>> {
        let store = NodeStore {
            db: self.db.as_ref(),
            pending: &mut self.pending,
        };
        let Some(node) = self.root.get_node(prefix, &store, 0)? else {
            return Ok(None);
        };
        let mut children = BTreeMap::new();
        let chars: Vec<u8> = node.child_chars().collect();
        for char in chars {
            let child = node.get_or_load_child(prefix, char, &store)?;
            let mut child_prefix = prefix.to_vec();
            child_prefix.push(char);
            children.insert(
                char,
                NodeMetadata {
                    prefix: child_prefix,
                    num_messages: child.items(),
                    hash: child.hash().to_vec(),
                    children: BTreeMap::new(),
                },
            );
        }
        Ok(Some(NodeMetadata {
            prefix: prefix.to_vec(),
            num_messages: node.items(),
            hash: node.hash().to_vec(),
            children,
        }))
    }

    /// Keys under `prefix`, at most [`MAX_VALUES_RETURNED_PER_CALL`].
    ///
    /// # Errors
    ///
    /// Returns an error if a node cannot be loaded.
    pub fn get_all_values(&mut self, prefix: &[u8]) -> TrieResult<Vec<Vec<u8>>> {
        let store = NodeStore {
            db: self.db.as_ref(),
            pending: &mut self.pending,
        };
        let mut values = Vec::new();
        if let Some(node) = self.root.get_node(prefix, &store, 0)? {
            node.get_all_values(prefix, &store, &mut values)?;
        }
        debug_assert!(values.len() <= MAX_VALUES_RETURNED_PER_CALL);
        Ok(values)
    }

    /// Keys in the trie.
    #[must_use]
    pub fn items(&self) -> u64 {
        self.root.items()
    }

    /// Hash of the root node.
    #[must_use]
    pub fn root_hash(&self) -> Vec<u8> {
        self.root.hash().to_vec()
    }

    /// Id of the last event applied to the trie, flushed or not.
    #[must_use]
    pub fn applied_event_id(&self) -> Option<EventId> {
        self.applied
    }

    /// Checkpoint as last persisted.
    #[must_use]
    pub fn checkpoint(&self) -> Option<EventId> {
        self.checkpoint
    }

    /// Returns true if a failed update left the trie out of step with the
    /// stored messages.
    #[must_use]
    pub fn needs_rebuild(&self) -> bool {
        self.invalid
    }

    /// Records that every change of event `id` is applied.
    ///
    /// Ignored while the trie is invalid or being rebuilt.
    pub fn mark_applied(&mut self, id: EventId) {
        if self.invalid || self.rebuilding {
            return;
        }
        self.applied = Some(self.applied.map_or(id, |applied| applied.max(id)));
    }

    /// Marks the trie as out of step with the stored messages and drops
    /// the persisted checkpoint, so a restart rebuilds it.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be deleted.
    pub fn invalidate(&mut self) -> TrieResult<()> {
        warn!(applied = ?self.applied, "merkle trie invalidated");
        self.invalid = true;
        self.applied = None;
        let mut batch = WriteBatch::new();
        batch.delete(keys::trie_checkpoint_key());
        self.db.commit(batch)?;
        self.checkpoint = None;
        Ok(())
    }

    /// Ends a rebuild started by [`MerkleTrie::clear`]. The trie then holds
    /// every change up to `last_event_id`.
    pub fn finish_rebuild(&mut self, last_event_id: Option<EventId>) {
        self.rebuilding = false;
        self.applied = last_event_id;
    }

    /// Node writes not yet flushed.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Flushes pending node writes in one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be committed. Pending writes are
    /// kept in that case.
    pub fn commit(&mut self) -> TrieResult<()> {
        if self.pending.is_empty() && self.applied == self.checkpoint {
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        for (key, value) in &self.pending {
            match value {
                Some(bytes) => batch.put(key.clone(), bytes.clone()),
                None => batch.delete(key.clone()),
            };
        }
        if self.applied != self.checkpoint {
            match self.applied {
                Some(id) => batch.put(keys::trie_checkpoint_key(), id.to_be_bytes().to_vec()),
                None => batch.delete(keys::trie_checkpoint_key()),
            };
        }
        let writes = batch.len();
        self.db.commit(batch)?;
        self.pending.clear();
        self.checkpoint = self.applied;
        debug!(writes, checkpoint = ?self.checkpoint, "flushed trie nodes");
        Ok(())
    }

    /// Flushes and drops every in-memory node below the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn unload(&mut self) -> TrieResult<()> {
        self.commit()?;
        self.root.unload_children();
        self.mutations = 0;
        Ok(())
    }

    /// Removes every key and the checkpoint, in memory and in the store.
    ///
    /// The trie stays in rebuild mode, ignoring [`MerkleTrie::mark_applied`],
    /// until [`MerkleTrie::finish_rebuild`].
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted nodes cannot be deleted.
    pub fn clear(&mut self) -> TrieResult<()> {
        let mut batch = WriteBatch::new();
        self.db
            .scan_prefix(&[RootPrefix::SyncMerkleTrieNode.as_byte()], &mut |key, _| {
                batch.delete(key.to_vec());
                ScanControl::Continue
            })?;
        let removed = batch.len();
        batch.delete(keys::trie_checkpoint_key());
        self.db.commit(batch)?;
        self.pending.clear();
        self.root = TrieNode::new();
        self.mutations = 0;
        self.checkpoint = None;
        self.applied = None;
        self.invalid = false;
        self.rebuilding = true;
        info!(removed, "cleared merkle trie");
        Ok(())
    }

    fn after_mutation(&mut self) -> TrieResult<()> {
        self.mutations += 1;
        if self.mutations >= self.config.unload_threshold {
            debug!(mutations = self.mutations, "unloading trie children");
            self.unload()?;
        }
        Ok(())
    }
}

fn decode_checkpoint(bytes: &[u8]) -> TrieResult<EventId> {
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| TrieError::codec(format!("trie checkpoint has {} bytes", bytes.len())))?;
    Ok(EventId::from_be_bytes(bytes))
}

/// Hash of an empty trie.
#[must_use]
pub fn empty_hash() -> Vec<u8> {
    blake3_20(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use fchub_core::{timestamp_to_padded_prefix, Fid, MessageFamily, SyncId};
    use fchub_storage::MemoryStore;
    use proptest::prelude::*;

    fn sync_id(timestamp: u32, seed: u8) -> Vec<u8> {
        let hash = blake3_20(&[seed]);
        SyncId::from_parts(timestamp, &hash, Fid::new(1), MessageFamily::Cast)
            .unwrap()
            .into_bytes()
    }

    fn trie() -> MerkleTrie {
        MerkleTrie::open(Arc::new(MemoryStore::new()), TrieConfig::default()).unwrap()
    }

    #[test]
    fn insert_delete_exists() {
        let mut trie = trie();
        let id = sync_id(100, 1);
        assert!(trie.insert(&id).unwrap());
        assert!(!trie.insert(&id).unwrap());
        assert!(trie.exists(&id).unwrap());
        assert_eq!(trie.items(), 1);

        assert!(trie.delete(&id).unwrap());
        assert!(!trie.delete(&id).unwrap());
        assert!(!trie.exists(&id).unwrap());
        assert_eq!(trie.items(), 0);
        assert_eq!(trie.root_hash(), empty_hash());
    }

    #[test]
    fn persists_across_reopen() {
        let db: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut trie = MerkleTrie::open(Arc::clone(&db), TrieConfig::default()).unwrap();
        for seed in 0..20 {
            trie.insert(&sync_id(1_000 + u32::from(seed), seed)).unwrap();
        }
        let hash = trie.root_hash();
        assert!(trie.pending_writes() > 0);
        trie.commit().unwrap();
        assert_eq!(trie.pending_writes(), 0);

        let mut reopened = MerkleTrie::open(db, TrieConfig::default()).unwrap();
        assert_eq!(reopened.root_hash(), hash);
        assert_eq!(reopened.items(), 20);
        assert!(reopened.exists(&sync_id(1_005, 5)).unwrap());
        assert!(reopened.delete(&sync_id(1_005, 5)).unwrap());
        assert_eq!(reopened.items(), 19);
    }

    #[test]
    fn checkpoint_is_flushed_with_nodes() {
        let db: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut trie = MerkleTrie::open(Arc::clone(&db), TrieConfig::default()).unwrap();
        assert_eq!(trie.checkpoint(), None);

        trie.insert(&sync_id(100, 1)).unwrap();
        trie.mark_applied(7);
        trie.mark_applied(5);
        assert_eq!(trie.applied_event_id(), Some(7));
        assert_eq!(trie.checkpoint(), None);

        // Without a commit the reopened trie knows nothing of event 7.
        let unflushed = MerkleTrie::open(Arc::clone(&db), TrieConfig::default()).unwrap();
        assert_eq!(unflushed.checkpoint(), None);
        assert_eq!(unflushed.items(), 0);

        trie.commit().unwrap();
        let reopened = MerkleTrie::open(Arc::clone(&db), TrieConfig::default()).unwrap();
        assert_eq!(reopened.checkpoint(), Some(7));
        assert_eq!(reopened.applied_event_id(), Some(7));
        assert_eq!(reopened.items(), 1);

        // A new checkpoint alone is still written.
        trie.mark_applied(9);
        trie.commit().unwrap();
        let reopened = MerkleTrie::open(db, TrieConfig::default()).unwrap();
        assert_eq!(reopened.checkpoint(), Some(9));
    }

    #[test]
    fn invalidate_drops_checkpoint_until_rebuilt() {
        let db: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut trie = MerkleTrie::open(Arc::clone(&db), TrieConfig::default()).unwrap();
        trie.insert(&sync_id(100, 1)).unwrap();
        trie.mark_applied(3);
        trie.commit().unwrap();

        trie.invalidate().unwrap();
        assert!(trie.needs_rebuild());
        trie.mark_applied(4);
        assert_eq!(trie.applied_event_id(), None);
        trie.commit().unwrap();
        assert_eq!(
            MerkleTrie::open(Arc::clone(&db), TrieConfig::default())
                .unwrap()
                .checkpoint(),
            None
        );

        trie.clear().unwrap();
        assert!(!trie.needs_rebuild());
        trie.mark_applied(5);
        assert_eq!(trie.applied_event_id(), None);
        trie.insert(&sync_id(100, 1)).unwrap();
        trie.finish_rebuild(Some(4));
        trie.mark_applied(5);
        trie.commit().unwrap();

        let reopened = MerkleTrie::open(db, TrieConfig::default()).unwrap();
        assert_eq!(reopened.checkpoint(), Some(5));
        assert_eq!(reopened.items(), 1);
    }

    #[test]
    fn rejects_malformed_checkpoint() {
        let db: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut batch = WriteBatch::new();
        batch.put(keys::trie_checkpoint_key(), vec![1, 2, 3]);
        db.commit(batch).unwrap();
        assert!(matches!(
            MerkleTrie::open(db, TrieConfig::default()).unwrap_err(),
            TrieError::Codec(_)
        ));
    }

    #[test]
    fn unloading_does_not_change_hashes() {
        let ids: Vec<_> = (0..50).map(|seed| sync_id(500 + u32::from(seed) % 7, seed)).collect();

        let mut loaded = trie();
        let mut unloading = MerkleTrie::open(
            Arc::new(MemoryStore::new()),
            TrieConfig::new().unload_threshold(3),
        )
        .unwrap();
        for id in &ids {
            loaded.insert(id).unwrap();
            unloading.insert(id).unwrap();
        }
        for id in ids.iter().step_by(3) {
            loaded.delete(id).unwrap();
            unloading.delete(id).unwrap();
        }
        assert_eq!(loaded.root_hash(), unloading.root_hash());
        assert_eq!(loaded.items(), unloading.items());
        let prefix = timestamp_to_padded_prefix(503);
        assert_eq!(
            loaded.get_snapshot(&prefix).unwrap(),
            unloading.get_snapshot(&prefix).unwrap()
        );
    }

    #[test]
    fn snapshot_of_missing_prefix_stops_early() {
        let mut trie = trie();
        trie.insert(&sync_id(100, 1)).unwrap();
        let snapshot = trie.get_snapshot(b"0000000200").unwrap();
        assert_eq!(snapshot.prefix, b"0000000".to_vec());
        assert_eq!(snapshot.excluded_hashes.len(), 8);
        assert_eq!(snapshot.num_messages, 1);

        let full = trie.get_snapshot(b"0000000100").unwrap();
        assert_eq!(full.prefix, b"0000000100".to_vec());
        assert_eq!(full.excluded_hashes.len(), 11);
        assert_eq!(full.num_messages, 1);
    }

    #[test]
    fn divergence_is_first_differing_depth() {
        let mut ours = trie();
        let mut theirs = trie();
        for seed in 0..5 {
            ours.insert(&sync_id(100, seed)).unwrap();
            theirs.insert(&sync_id(100, seed)).unwrap();
        }
        theirs.insert(&sync_id(150, 9)).unwrap();

        let prefix = timestamp_to_padded_prefix(160);
        let snapshot = theirs.get_snapshot(&prefix).unwrap();
        let divergence = ours
            .get_divergence_prefix(&prefix, &snapshot.excluded_hashes)
            .unwrap();
        assert_eq!(snapshot.prefix, b"00000001".to_vec());
        assert_eq!(divergence, b"00000001".to_vec());

        let same = theirs
            .get_divergence_prefix(&prefix, &snapshot.excluded_hashes)
            .unwrap();
        assert_eq!(same, prefix);
    }

    #[test]
    fn divergence_prefix_handles_short_snapshots() {
        let a = vec![vec![1], vec![2]];
        let b = vec![vec![1]];
        assert_eq!(divergence_prefix(b"abc", &a, &b), b"a".to_vec());
        assert_eq!(divergence_prefix(b"ab", &a, &a), b"ab".to_vec());
        assert_eq!(divergence_prefix(b"", &a, &b), Vec::<u8>::new());
    }

    #[test]
    fn node_metadata_lists_children() {
        let mut trie = trie();
        trie.insert(&sync_id(100, 1)).unwrap();
        trie.insert(&sync_id(109, 2)).unwrap();
        trie.insert(&sync_id(109, 3)).unwrap();

        let metadata = trie.get_node_metadata(b"000000010").unwrap().unwrap();
        assert_eq!(metadata.num_messages, 3);
        assert_eq!(metadata.children.len(), 2);
        assert_eq!(metadata.children[&b'0'].num_messages, 1);
        assert_eq!(metadata.children[&b'9'].num_messages, 2);
        assert_eq!(metadata.children[&b'9'].prefix, b"0000000109".to_vec());

        assert!(trie.get_node_metadata(b"9").unwrap().is_none());
    }

    #[test]
    fn get_all_values_under_prefix() {
        let mut trie = trie();
        let a = sync_id(100, 1);
        let b = sync_id(100, 2);
        let c = sync_id(200, 3);
        for id in [&a, &b, &c] {
            trie.insert(id).unwrap();
        }
        let mut values = trie.get_all_values(b"0000000100").unwrap();
        values.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(values, expected);
        assert_eq!(trie.get_all_values(b"").unwrap().len(), 3);
    }

    #[test]
    fn clear_removes_persisted_nodes() {
        let db: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut trie = MerkleTrie::open(Arc::clone(&db), TrieConfig::default()).unwrap();
        trie.insert(&sync_id(100, 1)).unwrap();
        trie.commit().unwrap();
        assert!(db.count_prefix(&[RootPrefix::SyncMerkleTrieNode.as_byte()]).unwrap() > 0);

        trie.clear().unwrap();
        assert_eq!(trie.items(), 0);
        assert_eq!(db.count_prefix(&[RootPrefix::SyncMerkleTrieNode.as_byte()]).unwrap(), 0);
    }

    proptest! {
        #[test]
        fn hash_is_independent_of_insert_order(
            entries in proptest::collection::btree_set((0u32..40, any::<u8>()), 1..60)
        ) {
            let ids: Vec<_> = entries.iter().map(|&(ts, seed)| sync_id(ts, seed)).collect();
            let mut forward = trie();
            let mut backward = trie();
            for id in &ids {
                forward.insert(id).unwrap();
            }
            for id in ids.iter().rev() {
                backward.insert(id).unwrap();
            }
            prop_assert_eq!(forward.root_hash(), backward.root_hash());
            prop_assert_eq!(forward.items(), ids.len() as u64);
        }

        #[test]
        fn deleting_restores_previous_hash(
            kept in proptest::collection::btree_set((0u32..20, any::<u8>()), 0..30),
            extra in proptest::collection::btree_set((0u32..20, any::<u8>()), 1..30),
        ) {
            let kept: Vec<_> = kept.iter().map(|&(ts, seed)| sync_id(ts, seed)).collect();
            let extra: Vec<_> = extra
                .iter()
                .map(|&(ts, seed)| sync_id(ts, seed))
                .filter(|id| !kept.contains(id))
                .collect();

            let mut baseline = trie();
            for id in &kept {
                baseline.insert(id).unwrap();
            }
            let mut full = trie();
            for id in kept.iter().chain(&extra) {
                full.insert(id).unwrap();
            }
            for id in &extra {
                prop_assert!(full.delete(id).unwrap());
            }
            prop_assert_eq!(full.root_hash(), baseline.root_hash());
            prop_assert_eq!(full.items(), baseline.items());
        }
    }
}
