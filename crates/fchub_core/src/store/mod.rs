//! CRDT message stores.
//!
//! Each message family lives in one [`Store`], parameterized by a
//! [`StoreFamily`] that names its message types and how a message maps to
//! its conflict key (the *discriminant*). Within one `(fid, discriminant)`
//! at most one message is stored at a time: the last-write-wins winner
//! across the family's add and remove types.
//!
//! Every mutation is a single [`WriteBatch`] committed together with its
//! event through the [`StoreEventHandler`].

mod cast;
mod link;
mod merge_queue;
mod reaction;
mod signer;
mod user_data;
mod verification;

pub use cast::{CastFamily, CastStore};
pub use link::{LinkFamily, LinkStore};
pub use merge_queue::MergeQueue;
pub use reaction::{ReactionFamily, ReactionStore};
pub use signer::{SignerFamily, SignerStore};
pub use user_data::{UserDataFamily, UserDataStore};
pub use verification::{VerificationFamily, VerificationStore};

use crate::config::{HubConfig, PruneLimits};
use crate::error::{HubError, HubResult};
use crate::event::{EventId, HubEventBody};
use crate::event_handler::StoreEventHandler;
use crate::keys;
use crate::message::{Message, MessageFamily, MessageType};
use crate::types::{farcaster_time, Fid, TsHash, TS_HASH_LENGTH};
use async_trait::async_trait;
use fchub_storage::{KeyValueStore, ScanControl, WriteBatch};
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Static description of one message family.
pub trait StoreFamily: Send + Sync + 'static {
    /// Family handled by the store.
    const FAMILY: MessageFamily;
    /// The add type.
    const ADD_TYPE: MessageType;
    /// The remove type, if the family has one.
    const REMOVE_TYPE: Option<MessageType>;
    /// If true a remove beats an add regardless of timestamps.
    const REMOVE_ALWAYS_WINS: bool = false;

    /// Conflict key of a message of this family.
    ///
    /// # Errors
    ///
    /// Returns `bad_request.invalid_param` if the body does not belong to
    /// this family.
    fn discriminant(message: &Message) -> HubResult<Vec<u8>>;
}

/// Object-safe view of a store, used by the engine to iterate families.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Family handled by the store.
    fn family(&self) -> MessageFamily;

    /// Merges a message. See [`Store::merge`].
    async fn merge(&self, message: &Message) -> HubResult<EventId>;

    /// Revokes a message. See [`Store::revoke`].
    async fn revoke(&self, message: &Message) -> HubResult<EventId>;

    /// Revokes every message signed by `signer`.
    async fn revoke_messages_by_signer(&self, fid: Fid, signer: &[u8]) -> HubResult<Vec<EventId>>;

    /// Prunes messages over quota. See [`Store::prune_messages`].
    async fn prune_messages(&self, fid: Fid) -> HubResult<Vec<Message>>;

    /// Reads one message by ts-hash.
    fn get_message(&self, fid: Fid, ts_hash: &TsHash) -> HubResult<Message>;

    /// Every stored message of the family for `fid`, oldest first.
    fn get_all_messages_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>>;
}

/// A last-write-wins message store for the family `F`.
pub struct Store<F: StoreFamily> {
    db: Arc<dyn KeyValueStore>,
    events: Arc<StoreEventHandler>,
    limits: PruneLimits,
    merge_queue: MergeQueue,
    family: PhantomData<F>,
}

impl<F: StoreFamily> std::fmt::Debug for Store<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("family", &F::FAMILY)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl<F: StoreFamily> Store<F> {
    /// Creates a store committing through `events`.
    #[must_use]
    pub fn new(events: Arc<StoreEventHandler>, limits: PruneLimits, config: &HubConfig) -> Self {
        Self {
            db: Arc::clone(events.db()),
            events,
            limits,
            merge_queue: MergeQueue::new(config.merge_lock_stripes, config.merge_timeout),
            family: PhantomData,
        }
    }

    /// Quota applied by this store.
    #[must_use]
    pub fn limits(&self) -> PruneLimits {
        self.limits
    }

    fn accepts(message_type: MessageType) -> bool {
        message_type == F::ADD_TYPE || Some(message_type) == F::REMOVE_TYPE
    }

    fn index_postfix(message_type: MessageType) -> u8 {
        if message_type.is_remove() {
            F::FAMILY
                .removes_postfix()
                .unwrap_or_else(|| F::FAMILY.adds_postfix())
        } else {
            F::FAMILY.adds_postfix()
        }
    }

    /// Last-write-wins order between two messages of this family.
    ///
    /// `Greater` means `a` beats `b`.
    #[must_use]
    pub fn message_compare(a: &Message, b: &Message) -> Ordering {
        let a_remove = a.message_type().is_remove();
        let b_remove = b.message_type().is_remove();
        let remove_order = a_remove.cmp(&b_remove);

        if F::REMOVE_ALWAYS_WINS && remove_order != Ordering::Equal {
            return remove_order;
        }
        a.timestamp()
            .cmp(&b.timestamp())
            .then(remove_order)
            .then_with(|| a.hash.cmp(&b.hash))
    }

    /// Reads one message by ts-hash.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if no such message is stored.
    pub fn get_message(&self, fid: Fid, ts_hash: &TsHash) -> HubResult<Message> {
        let key = keys::message_primary_key(fid, F::FAMILY, ts_hash);
        let bytes = self.db.get(&key)?.ok_or_else(|| {
            HubError::not_found(format!("{} message {ts_hash} of {fid} not found", F::FAMILY))
        })?;
        Message::decode(&bytes)
    }

    fn get_by_index(&self, fid: Fid, postfix: u8, discriminant: &[u8]) -> HubResult<Option<Message>> {
        let Some(ts_hash) = self.db.get(&keys::index_key(fid, postfix, discriminant))? else {
            return Ok(None);
        };
        let ts_hash = TsHash::from_slice(&ts_hash)?;
        self.get_message(fid, &ts_hash).map(Some)
    }

    /// Reads the stored add for `discriminant`.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if the add set has no entry for it.
    pub fn get_add(&self, fid: Fid, discriminant: &[u8]) -> HubResult<Message> {
        self.get_by_index(fid, F::FAMILY.adds_postfix(), discriminant)?
            .ok_or_else(|| HubError::not_found(format!("{} add of {fid} not found", F::FAMILY)))
    }

    /// Reads the stored remove for `discriminant`.
    ///
    /// # Errors
    ///
    /// Returns `bad_request.invalid_param` for families without removes and
    /// `not_found` if the remove set has no entry for it.
    pub fn get_remove(&self, fid: Fid, discriminant: &[u8]) -> HubResult<Message> {
        let postfix = F::FAMILY.removes_postfix().ok_or_else(|| {
            HubError::invalid_param(format!("{} store has no removes", F::FAMILY))
        })?;
        self.get_by_index(fid, postfix, discriminant)?
            .ok_or_else(|| HubError::not_found(format!("{} remove of {fid} not found", F::FAMILY)))
    }

    /// Every stored message of the family for `fid`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates keyed store and decoding errors.
    pub fn get_all_messages_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        let records = self.db.entries_with_prefix(&keys::family_prefix(fid, F::FAMILY))?;
        records
            .iter()
            .map(|(_, value)| Message::decode(value))
            .collect()
    }

    /// Stored adds for `fid`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates keyed store and decoding errors.
    pub fn get_adds_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        let mut messages = self.get_all_messages_by_fid(fid)?;
        messages.retain(|m| m.message_type() == F::ADD_TYPE);
        Ok(messages)
    }

    /// Stored removes for `fid`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates keyed store and decoding errors.
    pub fn get_removes_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        let mut messages = self.get_all_messages_by_fid(fid)?;
        messages.retain(|m| Some(m.message_type()) == F::REMOVE_TYPE);
        Ok(messages)
    }

    /// Stored messages of `fid` signed by `signer`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates keyed store and decoding errors.
    pub fn get_messages_by_signer(&self, fid: Fid, signer: &[u8]) -> HubResult<Vec<Message>> {
        let prefix = keys::by_signer_family_prefix(fid, signer, F::FAMILY);
        let mut ts_hashes = Vec::new();
        self.db.scan_prefix(&prefix, &mut |key, _| {
            if key.len() == prefix.len() + TS_HASH_LENGTH {
                ts_hashes.push(key[prefix.len()..].to_vec());
            }
            ScanControl::Continue
        })?;
        ts_hashes
            .iter()
            .map(|bytes| self.get_message(fid, &TsHash::from_slice(bytes)?))
            .collect()
    }

    fn put_message(batch: &mut WriteBatch, message: &Message, discriminant: &[u8]) -> HubResult<()> {
        let fid = message.fid();
        let ts_hash = message.ts_hash()?;
        batch.put(
            keys::message_primary_key(fid, F::FAMILY, &ts_hash),
            message.encode()?,
        );
        batch.put(
            keys::index_key(fid, Self::index_postfix(message.message_type()), discriminant),
            ts_hash.as_bytes(),
        );
        batch.put(
            keys::by_signer_key(fid, &message.signer, F::FAMILY, &ts_hash),
            Vec::new(),
        );
        Ok(())
    }

    fn delete_message(&self, batch: &mut WriteBatch, message: &Message) -> HubResult<()> {
        let fid = message.fid();
        let ts_hash = message.ts_hash()?;
        batch.delete(keys::message_primary_key(fid, F::FAMILY, &ts_hash));

        let index = keys::index_key(
            fid,
            Self::index_postfix(message.message_type()),
            &F::discriminant(message)?,
        );
        // The index may already point at a newer winner.
        if self.db.get(&index)?.as_deref() == Some(ts_hash.as_bytes()) {
            batch.delete(index);
        }
        batch.delete(keys::by_signer_key(fid, &message.signer, F::FAMILY, &ts_hash));
        Ok(())
    }

    fn resolve(&self, message: &Message, existing: Message, conflicts: &mut Vec<Message>) -> HubResult<()> {
        match Self::message_compare(&existing, message) {
            Ordering::Greater => Err(HubError::conflict(format!(
                "message conflicts with a more recent {:?}",
                existing.message_type()
            ))),
            Ordering::Equal => Err(HubError::duplicate("message has already been merged")),
            Ordering::Less => {
                conflicts.push(existing);
                Ok(())
            }
        }
    }

    fn merge_conflicts(&self, message: &Message, discriminant: &[u8]) -> HubResult<Vec<Message>> {
        let fid = message.fid();
        let mut conflicts = Vec::new();
        if let Some(postfix) = F::FAMILY.removes_postfix() {
            if let Some(existing) = self.get_by_index(fid, postfix, discriminant)? {
                self.resolve(message, existing, &mut conflicts)?;
            }
        }
        if let Some(existing) = self.get_by_index(fid, F::FAMILY.adds_postfix(), discriminant)? {
            self.resolve(message, existing, &mut conflicts)?;
        }
        Ok(conflicts)
    }

    /// Merges `message` into the store.
    ///
    /// The message replaces the current winner for its discriminant if it
    /// beats it. The replaced messages travel in the `MergeMessage` event.
    ///
    /// # Errors
    ///
    /// - `bad_request.validation_failure` if the type is not of this family
    /// - `bad_request.prunable` if quota would evict it immediately
    /// - `bad_request.duplicate` if the exact message is already stored
    /// - `bad_request.conflict` if the stored winner beats it
    /// - `unavailable.storage_failure` if the commit fails or times out
    pub async fn merge(&self, message: &Message) -> HubResult<EventId> {
        if !Self::accepts(message.message_type()) {
            return Err(HubError::validation_failure("invalid message type"));
        }
        let fid = message.fid();
        let _guard = self.merge_queue.acquire(fid).await?;

        if self.events.is_prunable(message, self.limits)? {
            return Err(HubError::prunable("message would be pruned"));
        }

        let discriminant = F::discriminant(message)?;
        let conflicts = self.merge_conflicts(message, &discriminant)?;

        let mut batch = WriteBatch::new();
        for conflict in &conflicts {
            self.delete_message(&mut batch, conflict)?;
        }
        Self::put_message(&mut batch, message, &discriminant)?;

        let event = self
            .events
            .commit_transaction(
                batch,
                HubEventBody::MergeMessage {
                    message: message.clone(),
                    deleted_messages: conflicts,
                },
            )
            .await?;
        debug!(fid = fid.as_u64(), family = %F::FAMILY, event_id = event.id, "merged message");
        Ok(event.id)
    }

    async fn revoke_locked(&self, message: &Message) -> HubResult<EventId> {
        let fid = message.fid();
        let ts_hash = message.ts_hash()?;
        let key = keys::message_primary_key(fid, F::FAMILY, &ts_hash);
        if self.db.get(&key)?.is_none() {
            return Err(HubError::not_found(format!(
                "{} message {ts_hash} of {fid} not found",
                F::FAMILY
            )));
        }

        let mut batch = WriteBatch::new();
        self.delete_message(&mut batch, message)?;
        let event = self
            .events
            .commit_transaction(
                batch,
                HubEventBody::RevokeMessage {
                    message: message.clone(),
                },
            )
            .await?;
        debug!(fid = fid.as_u64(), family = %F::FAMILY, event_id = event.id, "revoked message");
        Ok(event.id)
    }

    /// Deletes a stored message regardless of CRDT order.
    ///
    /// # Errors
    ///
    /// - `bad_request.invalid_param` if the type is not of this family
    /// - `not_found` if the message is not stored
    pub async fn revoke(&self, message: &Message) -> HubResult<EventId> {
        if !Self::accepts(message.message_type()) {
            return Err(HubError::invalid_param("invalid message type"));
        }
        let _guard = self.merge_queue.acquire(message.fid()).await?;
        self.revoke_locked(message).await
    }

    /// Revokes every stored message of `fid` signed by `signer`.
    ///
    /// # Errors
    ///
    /// Stops at the first failed revocation and returns its error.
    pub async fn revoke_messages_by_signer(&self, fid: Fid, signer: &[u8]) -> HubResult<Vec<EventId>> {
        let _guard = self.merge_queue.acquire(fid).await?;
        let mut revoked = Vec::new();
        for message in self.get_messages_by_signer(fid, signer)? {
            revoked.push(self.revoke_locked(&message).await?);
        }
        Ok(revoked)
    }

    /// Evicts the oldest messages of `fid` until the family is within its
    /// size limit and holds nothing older than its time limit.
    ///
    /// Returns the pruned messages, oldest first.
    ///
    /// # Errors
    ///
    /// Stops at the first failed deletion and returns its error.
    pub async fn prune_messages(&self, fid: Fid) -> HubResult<Vec<Message>> {
        if self.limits.size_limit.is_none() && self.limits.time_limit.is_none() {
            return Ok(Vec::new());
        }
        let _guard = self.merge_queue.acquire(fid).await?;

        let cutoff = match self.limits.time_limit {
            Some(limit) => Some(farcaster_time()?.saturating_sub(limit)),
            None => None,
        };
        let messages = self.get_all_messages_by_fid(fid)?;
        let mut remaining = messages.len() as u64;
        let mut pruned = Vec::new();

        for message in messages {
            let over_size = self.limits.size_limit.is_some_and(|limit| remaining > limit);
            let too_old = cutoff.is_some_and(|cutoff| message.timestamp() < cutoff);
            if !over_size && !too_old {
                break;
            }

            let mut batch = WriteBatch::new();
            self.delete_message(&mut batch, &message)?;
            self.events
                .commit_transaction(
                    batch,
                    HubEventBody::PruneMessage {
                        message: message.clone(),
                    },
                )
                .await?;
            remaining -= 1;
            pruned.push(message);
        }

        if !pruned.is_empty() {
            debug!(fid = fid.as_u64(), family = %F::FAMILY, count = pruned.len(), "pruned messages");
        }
        Ok(pruned)
    }
}

#[async_trait]
impl<F: StoreFamily> MessageStore for Store<F> {
    fn family(&self) -> MessageFamily {
        F::FAMILY
    }

    async fn merge(&self, message: &Message) -> HubResult<EventId> {
        Store::merge(self, message).await
    }

    async fn revoke(&self, message: &Message) -> HubResult<EventId> {
        Store::revoke(self, message).await
    }

    async fn revoke_messages_by_signer(&self, fid: Fid, signer: &[u8]) -> HubResult<Vec<EventId>> {
        Store::revoke_messages_by_signer(self, fid, signer).await
    }

    async fn prune_messages(&self, fid: Fid) -> HubResult<Vec<Message>> {
        Store::prune_messages(self, fid).await
    }

    fn get_message(&self, fid: Fid, ts_hash: &TsHash) -> HubResult<Message> {
        Store::get_message(self, fid, ts_hash)
    }

    fn get_all_messages_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        Store::get_all_messages_by_fid(self, fid)
    }
}

fn body_mismatch(family: MessageFamily) -> HubError {
    HubError::invalid_param(format!("message body is not a {family} body"))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use fchub_storage::MemoryStore;

    pub(crate) async fn events() -> Arc<StoreEventHandler> {
        let db: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        StoreEventHandler::start(db, &HubConfig::default(), vec![])
            .await
            .unwrap()
    }

    pub(crate) async fn store<F: StoreFamily>(limits: PruneLimits) -> Store<F> {
        Store::new(events().await, limits, &HubConfig::default())
    }
}
