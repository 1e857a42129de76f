//! Per-account message counts for quota checks.
//!
//! The cache answers "how many messages does this account have in this
//! family" and "what is its oldest one" without scanning the store on every
//! merge. Entries are filled lazily from the keyed store and kept current by
//! applying each committed event.
//!
//! Commits run through [`StorageCache::commit_with`], which holds the cache
//! lock across the store write and the event application. A lazy fill can
//! therefore never observe a write whose event has not been applied yet,
//! and no event is ever counted twice.

use crate::error::HubResult;
use crate::event::{HubEvent, HubEventBody};
use crate::keys::{self, RootPrefix};
use crate::message::{Message, MessageFamily};
use crate::types::{Fid, TsHash};
use fchub_storage::{KeyValueStore, ScanControl};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

type CacheKey = (Fid, MessageFamily);

#[derive(Debug, Default)]
struct CacheState {
    counts: HashMap<CacheKey, u64>,
    // A present `None` means the family is known to be empty.
    earliest: HashMap<CacheKey, Option<TsHash>>,
}

impl CacheState {
    fn add(&mut self, message: &Message) {
        let Ok(ts_hash) = message.ts_hash() else {
            return;
        };
        let key = (message.fid(), message.family());
        if let Some(count) = self.counts.get_mut(&key) {
            *count += 1;
        }
        if let Some(earliest) = self.earliest.get_mut(&key) {
            match earliest {
                Some(current) if ts_hash >= *current => {}
                _ => *earliest = Some(ts_hash),
            }
        }
    }

    fn remove(&mut self, message: &Message) {
        let Ok(ts_hash) = message.ts_hash() else {
            return;
        };
        let key = (message.fid(), message.family());
        if let Some(count) = self.counts.get_mut(&key) {
            *count = count.saturating_sub(1);
        }
        if let Some(Some(current)) = self.earliest.get(&key) {
            if ts_hash <= *current {
                self.earliest.remove(&key);
            }
        }
    }

    fn apply(&mut self, event: &HubEvent) {
        match &event.body {
            HubEventBody::MergeMessage {
                message,
                deleted_messages,
            } => {
                for deleted in deleted_messages {
                    self.remove(deleted);
                }
                self.add(message);
            }
            HubEventBody::PruneMessage { message } | HubEventBody::RevokeMessage { message } => {
                self.remove(message);
            }
            HubEventBody::MergeOnChainEvent { .. } | HubEventBody::MergeUsernameProof { .. } => {}
        }
    }
}

/// Cached message counts and earliest ts-hashes per `(fid, family)`.
#[derive(Debug, Default)]
pub struct StorageCache {
    state: Mutex<CacheState>,
}

impl StorageCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the counts from every primary record in the store.
    ///
    /// Earliest ts-hashes are also seeded, since primary keys of one
    /// `(fid, family)` are visited in ascending ts-hash order.
    ///
    /// # Errors
    ///
    /// Propagates keyed store errors.
    pub fn sync_from_db(&self, db: &dyn KeyValueStore) -> HubResult<()> {
        let mut fresh = CacheState::default();
        db.scan_prefix(&[RootPrefix::User.as_byte()], &mut |key, _| {
            if let Some((fid, family, ts_hash)) = keys::parse_primary_key(key) {
                *fresh.counts.entry((fid, family)).or_insert(0) += 1;
                fresh.earliest.entry((fid, family)).or_insert(Some(ts_hash));
            }
            ScanControl::Continue
        })?;
        debug!(entries = fresh.counts.len(), "storage cache synced");
        *self.state.lock() = fresh;
        Ok(())
    }

    /// Number of stored messages of `family` for `fid`.
    ///
    /// # Errors
    ///
    /// Propagates keyed store errors from a lazy fill.
    pub fn get_message_count(
        &self,
        db: &dyn KeyValueStore,
        fid: Fid,
        family: MessageFamily,
    ) -> HubResult<u64> {
        let mut state = self.state.lock();
        if let Some(count) = state.counts.get(&(fid, family)) {
            return Ok(*count);
        }
        let count = db.count_prefix(&keys::family_prefix(fid, family))?;
        state.counts.insert((fid, family), count);
        Ok(count)
    }

    /// Oldest stored ts-hash of `family` for `fid`.
    ///
    /// # Errors
    ///
    /// Propagates keyed store errors from a lazy fill.
    pub fn get_earliest_ts_hash(
        &self,
        db: &dyn KeyValueStore,
        fid: Fid,
        family: MessageFamily,
    ) -> HubResult<Option<TsHash>> {
        let mut state = self.state.lock();
        if let Some(earliest) = state.earliest.get(&(fid, family)) {
            return Ok(*earliest);
        }
        let earliest = db
            .first_with_prefix(&keys::family_prefix(fid, family))?
            .and_then(|(key, _)| keys::parse_primary_key(&key))
            .map(|(_, _, ts_hash)| ts_hash);
        state.earliest.insert((fid, family), earliest);
        Ok(earliest)
    }

    /// Runs `commit` and applies `event` while holding the cache lock.
    ///
    /// The event is applied only if `commit` succeeds.
    ///
    /// # Errors
    ///
    /// Returns the error of `commit`.
    pub fn commit_with<F>(&self, event: &HubEvent, commit: F) -> HubResult<()>
    where
        F: FnOnce() -> HubResult<()>,
    {
        let mut state = self.state.lock();
        commit()?;
        state.apply(event);
        Ok(())
    }

    /// Applies an already-committed event.
    pub fn process_event(&self, event: &HubEvent) {
        self.state.lock().apply(event);
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        *self.state.lock() = CacheState::default();
    }
}
