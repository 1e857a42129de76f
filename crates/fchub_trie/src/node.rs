//! Trie nodes.
//!
//! Levels 1 to [`TIMESTAMP_LENGTH`] of the trie spell the decimal timestamp
//! of a sync id and are never compacted, so that snapshots can compare
//! whole seconds. Below that level a key is stored in the first node whose
//! subtree holds no other key, and deletions collapse single-key chains
//! back into one leaf. The shape of the trie, and therefore every hash, is
//! a function of the key set alone.

use crate::error::{TrieError, TrieResult};
use fchub_core::keys;
use fchub_storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use fchub_core::TIMESTAMP_LENGTH;

/// Upper bound on values returned by one [`TrieNode::get_all_values`] call.
pub const MAX_VALUES_RETURNED_PER_CALL: usize = 1024;

/// Length of a node hash.
pub const TRIE_HASH_LENGTH: usize = 20;

/// blake3 truncated to 20 bytes.
#[must_use]
pub fn blake3_20(bytes: &[u8]) -> Vec<u8> {
    blake3::hash(bytes).as_bytes()[..TRIE_HASH_LENGTH].to_vec()
}

/// Persisted form of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbTrieNode {
    /// Key stored in a leaf.
    pub key: Option<Vec<u8>>,
    /// Bytes of the children, ascending.
    pub child_chars: Vec<u8>,
    /// Keys in the subtree.
    pub items: u64,
    /// Merkle hash.
    pub hash: Vec<u8>,
}

impl DbTrieNode {
    pub(crate) fn encode(&self) -> TrieResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes).map_err(|e| TrieError::codec(e.to_string()))?;
        Ok(bytes)
    }

    pub(crate) fn decode(bytes: &[u8]) -> TrieResult<Self> {
        ciborium::from_reader(bytes).map_err(|e| TrieError::codec(e.to_string()))
    }
}

/// Node reads and buffered node writes of one trie.
///
/// Writes are keyed by store key; `None` marks a deletion.
pub(crate) struct NodeStore<'a> {
    pub(crate) db: &'a dyn KeyValueStore,
    pub(crate) pending: &'a mut BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl NodeStore<'_> {
    fn load(&self, prefix: &[u8]) -> TrieResult<TrieNode> {
        let key = keys::trie_node_key(prefix);
        let bytes = match self.pending.get(&key) {
            Some(Some(bytes)) => bytes.clone(),
            Some(None) => return Err(TrieError::missing_node(prefix)),
            None => self
                .db
                .get(&key)?
                .ok_or_else(|| TrieError::missing_node(prefix))?,
        };
        Ok(TrieNode::from_db(DbTrieNode::decode(&bytes)?))
    }

    fn save(&mut self, prefix: &[u8], node: &TrieNode) -> TrieResult<()> {
        let bytes = node.to_db().encode()?;
        self.pending.insert(keys::trie_node_key(prefix), Some(bytes));
        Ok(())
    }

    fn remove(&mut self, prefix: &[u8]) {
        self.pending.insert(keys::trie_node_key(prefix), None);
    }
}

fn child_prefix(prefix: &[u8], char: u8) -> Vec<u8> {
    let mut child = Vec::with_capacity(prefix.len() + 1);
    child.extend_from_slice(prefix);
    child.push(char);
    child
}

/// A node of the sync trie.
///
/// Children are loaded from the keyed store on first access; a `None`
/// child is persisted but not in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieNode {
    hash: Vec<u8>,
    items: u64,
    children: BTreeMap<u8, Option<Box<TrieNode>>>,
    key: Option<Vec<u8>>,
}

impl Default for TrieNode {
    fn default() -> Self {
        Self {
            hash: blake3_20(&[]),
            items: 0,
            children: BTreeMap::new(),
            key: None,
        }
    }
}

impl TrieNode {
    /// Creates an empty node.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_db(db: DbTrieNode) -> Self {
        Self {
            hash: db.hash,
            items: db.items,
            children: db.child_chars.into_iter().map(|c| (c, None)).collect(),
            key: db.key,
        }
    }

    pub(crate) fn to_db(&self) -> DbTrieNode {
        DbTrieNode {
            key: self.key.clone(),
            child_chars: self.children.keys().copied().collect(),
            items: self.items,
            hash: self.hash.clone(),
        }
    }

    /// Merkle hash of the subtree.
    #[must_use]
    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    /// Number of keys in the subtree.
    #[must_use]
    pub fn items(&self) -> u64 {
        self.items
    }

    /// Returns true if the node has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Key stored in a leaf.
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        if self.is_leaf() {
            self.key.as_deref()
        } else {
            None
        }
    }

    /// Bytes of the children, ascending.
    pub fn child_chars(&self) -> impl Iterator<Item = u8> + '_ {
        self.children.keys().copied()
    }

    pub(crate) fn get_or_load_child(
        &mut self,
        prefix: &[u8],
        char: u8,
        store: &NodeStore<'_>,
    ) -> TrieResult<&mut TrieNode> {
        let slot = self
            .children
            .get_mut(&char)
            .ok_or_else(|| TrieError::missing_node(&child_prefix(prefix, char)))?;
        if slot.is_none() {
            *slot = Some(Box::new(store.load(&child_prefix(prefix, char))?));
        }
        slot.as_deref_mut()
            .ok_or_else(|| TrieError::missing_node(&child_prefix(prefix, char)))
    }

    fn update_hash(&mut self, prefix: &[u8], store: &NodeStore<'_>) -> TrieResult<()> {
        if self.is_leaf() {
            self.hash = blake3_20(self.key.as_deref().unwrap_or_default());
            return Ok(());
        }
        let mut hasher = blake3::Hasher::new();
        let chars: Vec<u8> = self.children.keys().copied().collect();
        for char in chars {
            hasher.update(&self.get_or_load_child(prefix, char, store)?.hash);
        }
        self.hash = hasher.finalize().as_bytes()[..TRIE_HASH_LENGTH].to_vec();
        Ok(())
    }

    /// Inserts `key`. Returns false if it was already present.
    pub(crate) fn insert(
        &mut self,
        key: &[u8],
        store: &mut NodeStore<'_>,
        index: usize,
    ) -> TrieResult<bool> {
        if index >= key.len() {
            return Err(TrieError::KeyLengthExceeded {
                index,
                len: key.len(),
            });
        }
        let prefix = &key[..index];

        if index >= TIMESTAMP_LENGTH && self.is_leaf() {
            if self.key.is_none() {
                self.key = Some(key.to_vec());
                self.items += 1;
                self.update_hash(prefix, store)?;
                store.save(prefix, self)?;
                return Ok(true);
            }
            if self.key.as_deref() == Some(key) {
                return Ok(false);
            }
            self.split_leaf(prefix, store, index)?;
        }

        let char = key[index];
        self.children
            .entry(char)
            .or_insert_with(|| Some(Box::new(TrieNode::new())));
        let inserted = self
            .get_or_load_child(prefix, char, store)?
            .insert(key, store, index + 1)?;

        if inserted {
            self.items += 1;
            self.update_hash(prefix, store)?;
            store.save(prefix, self)?;
        }
        Ok(inserted)
    }

    // Moves this leaf's key one level down so a second key can share the prefix.
    fn split_leaf(&mut self, prefix: &[u8], store: &mut NodeStore<'_>, index: usize) -> TrieResult<()> {
        let Some(existing) = self.key.take() else {
            return Ok(());
        };
        let Some(&char) = existing.get(index) else {
            return Err(TrieError::KeyLengthExceeded {
                index,
                len: existing.len(),
            });
        };
        let mut child = TrieNode::new();
        child.insert(&existing, store, index + 1)?;
        self.children.insert(char, Some(Box::new(child)));
        self.update_hash(prefix, store)?;
        store.save(prefix, self)
    }

    /// Deletes `key`. Returns false if it was not present.
    pub(crate) fn delete(
        &mut self,
        key: &[u8],
        store: &mut NodeStore<'_>,
        index: usize,
    ) -> TrieResult<bool> {
        let prefix = &key[..index.min(key.len())];

        if self.is_leaf() {
            if self.key.as_deref() != Some(key) {
                return Ok(false);
            }
            self.items -= 1;
            self.key = None;
            self.update_hash(prefix, store)?;
            store.remove(prefix);
            return Ok(true);
        }

        if index >= key.len() {
            return Err(TrieError::KeyLengthExceeded {
                index,
                len: key.len(),
            });
        }
        let char = key[index];
        if !self.children.contains_key(&char) {
            return Ok(false);
        }
        let child = self.get_or_load_child(prefix, char, store)?;
        if !child.delete(key, store, index + 1)? {
            return Ok(false);
        }
        let child_items = child.items;

        self.items -= 1;
        if child_items == 0 {
            self.children.remove(&char);
            if self.items == 0 {
                self.update_hash(prefix, store)?;
                store.remove(prefix);
                return Ok(true);
            }
        }

        if self.items == 1 && self.children.len() == 1 && index >= TIMESTAMP_LENGTH {
            self.collapse(prefix, store)?;
        }

        self.update_hash(prefix, store)?;
        store.save(prefix, self)?;
        Ok(true)
    }

    // Pulls the key of a single leaf child up into this node.
    fn collapse(&mut self, prefix: &[u8], store: &mut NodeStore<'_>) -> TrieResult<()> {
        let Some(char) = self.children.keys().next().copied() else {
            return Ok(());
        };
        let child = self.get_or_load_child(prefix, char, store)?;
        if !child.is_leaf() {
            return Ok(());
        }
        let Some(key) = child.key.take() else {
            return Ok(());
        };
        self.key = Some(key);
        self.children.remove(&char);
        store.remove(&child_prefix(prefix, char));
        Ok(())
    }

    /// Returns true if `key` is stored in this subtree.
    pub(crate) fn exists(&mut self, key: &[u8], store: &NodeStore<'_>, index: usize) -> TrieResult<bool> {
        if self.is_leaf() {
            return Ok(self.key.as_deref() == Some(key));
        }
        if index >= key.len() {
            return Err(TrieError::KeyLengthExceeded {
                index,
                len: key.len(),
            });
        }
        let char = key[index];
        if !self.children.contains_key(&char) {
            return Ok(false);
        }
        self.get_or_load_child(&key[..index], char, store)?
            .exists(key, store, index + 1)
    }

    /// Finds the node at `prefix`, loading nodes along the way.
    pub(crate) fn get_node(
        &mut self,
        prefix: &[u8],
        store: &NodeStore<'_>,
        index: usize,
    ) -> TrieResult<Option<&mut TrieNode>> {
        if index >= prefix.len() {
            return Ok(Some(self));
        }
        let char = prefix[index];
        if !self.children.contains_key(&char) {
            return Ok(None);
        }
        self.get_or_load_child(&prefix[..index], char, store)?
            .get_node(prefix, store, index + 1)
    }

    /// Hash and item count of every child except `excluded`.
    pub(crate) fn excluded_hash(
        &mut self,
        prefix: &[u8],
        excluded: u8,
        store: &NodeStore<'_>,
    ) -> TrieResult<(Vec<u8>, u64)> {
        let mut hasher = blake3::Hasher::new();
        let mut items = 0;
        let chars: Vec<u8> = self.children.keys().copied().collect();
        for char in chars {
            if char == excluded {
                continue;
            }
            let child = self.get_or_load_child(prefix, char, store)?;
            hasher.update(&child.hash);
            items += child.items;
        }
        Ok((hasher.finalize().as_bytes()[..TRIE_HASH_LENGTH].to_vec(), items))
    }

    /// Collects the keys of this subtree, at most
    /// [`MAX_VALUES_RETURNED_PER_CALL`] of them.
    pub(crate) fn get_all_values(
        &mut self,
        prefix: &[u8],
        store: &NodeStore<'_>,
        values: &mut Vec<Vec<u8>>,
    ) -> TrieResult<()> {
        if self.is_leaf() {
            if let Some(key) = &self.key {
                values.push(key.clone());
            }
            return Ok(());
        }
        let chars: Vec<u8> = self.children.keys().copied().collect();
        for char in chars {
            if values.len() >= MAX_VALUES_RETURNED_PER_CALL {
                break;
            }
            let child_prefix = child_prefix(prefix, char);
            self.get_or_load_child(prefix, char, store)?
                .get_all_values(&child_prefix, store, values)?;
        }
        values.truncate(MAX_VALUES_RETURNED_PER_CALL);
        Ok(())
    }

    /// Drops every in-memory child. They must already be persisted.
    pub(crate) fn unload_children(&mut self) {
        for slot in self.children.values_mut() {
            *slot = None;
        }
    }
}
