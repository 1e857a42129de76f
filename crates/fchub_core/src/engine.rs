//! Message engine.
//!
//! Validates inbound messages, routes them to the store of their family and
//! applies cross-store rules: removing a signer revokes everything that
//! signer authored. The engine is also the read side used by sync, which
//! addresses messages by [`SyncId`].

use crate::config::{HubConfig, StorageQuota};
use crate::error::{HubError, HubResult};
use crate::event::EventId;
use crate::event_handler::StoreEventHandler;
use crate::keys::{self, RootPrefix};
use crate::message::{Message, MessageBody, MessageFamily, MessageType};
use crate::store::{
    CastStore, LinkStore, MessageStore, ReactionStore, SignerStore, Store, UserDataStore,
    VerificationStore,
};
use crate::sync_id::SyncId;
use crate::types::Fid;
use crate::validation::{MessageValidator, StructuralValidator};
use fchub_storage::ScanControl;
use std::sync::Arc;
use tracing::{debug, info};

const SCAN_PAGE_SIZE: usize = 1024;

/// Routes messages to the six family stores.
pub struct MessageEngine {
    events: Arc<StoreEventHandler>,
    validator: Arc<dyn MessageValidator>,
    cast: CastStore,
    reaction: ReactionStore,
    link: LinkStore,
    verification: VerificationStore,
    user_data: UserDataStore,
    signer: SignerStore,
}

impl std::fmt::Debug for MessageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageEngine")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl MessageEngine {
    /// Creates an engine with the quotas from `config`.
    #[must_use]
    pub fn new(events: Arc<StoreEventHandler>, config: &HubConfig) -> Self {
        Self::with_quota(events, &config.limits, config)
    }

    /// Creates an engine whose per-family limits come from `quota`.
    #[must_use]
    pub fn with_quota(
        events: Arc<StoreEventHandler>,
        quota: &dyn StorageQuota,
        config: &HubConfig,
    ) -> Self {
        let limits = |family| quota.limits(family);
        let cast = Store::new(Arc::clone(&events), limits(MessageFamily::Cast), config);
        let reaction = Store::new(Arc::clone(&events), limits(MessageFamily::Reaction), config);
        let link = Store::new(Arc::clone(&events), limits(MessageFamily::Link), config);
        let verification =
            Store::new(Arc::clone(&events), limits(MessageFamily::Verification), config);
        let user_data = Store::new(Arc::clone(&events), limits(MessageFamily::UserData), config);
        let signer = Store::new(Arc::clone(&events), limits(MessageFamily::Signer), config);

        Self {
            events,
            validator: Arc::new(StructuralValidator::new()),
            cast,
            reaction,
            link,
            verification,
            user_data,
            signer,
        }
    }

    /// Replaces the validation collaborator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn MessageValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// The commit pipeline shared by all stores.
    #[must_use]
    pub fn events(&self) -> &Arc<StoreEventHandler> {
        &self.events
    }

    /// Cast store.
    #[must_use]
    pub fn cast_store(&self) -> &CastStore {
        &self.cast
    }

    /// Reaction store.
    #[must_use]
    pub fn reaction_store(&self) -> &ReactionStore {
        &self.reaction
    }

    /// Link store.
    #[must_use]
    pub fn link_store(&self) -> &LinkStore {
        &self.link
    }

    /// Verification store.
    #[must_use]
    pub fn verification_store(&self) -> &VerificationStore {
        &self.verification
    }

    /// User data store.
    #[must_use]
    pub fn user_data_store(&self) -> &UserDataStore {
        &self.user_data
    }

    /// Signer store.
    #[must_use]
    pub fn signer_store(&self) -> &SignerStore {
        &self.signer
    }

    fn store(&self, family: MessageFamily) -> &dyn MessageStore {
        match family {
            MessageFamily::Cast => &self.cast,
            MessageFamily::Reaction => &self.reaction,
            MessageFamily::Link => &self.link,
            MessageFamily::Verification => &self.verification,
            MessageFamily::UserData => &self.user_data,
            MessageFamily::Signer => &self.signer,
        }
    }

    fn stores(&self) -> [&dyn MessageStore; 6] {
        MessageFamily::ALL.map(|family| self.store(family))
    }

    /// Validates and merges one message.
    ///
    /// A merged `SignerRemove` also revokes every message of the account
    /// signed by the removed key.
    ///
    /// # Errors
    ///
    /// Returns the validation or store error; see [`Store::merge`].
    pub async fn merge_message(&self, message: &Message) -> HubResult<EventId> {
        self.validator.validate(message)?;
        let event_id = self.store(message.family()).merge(message).await?;

        if message.message_type() == MessageType::SignerRemove {
            if let MessageBody::Signer { signer, .. } = &message.data.body {
                let mut revoked = 0usize;
                for store in self.stores() {
                    if store.family() != MessageFamily::Signer {
                        revoked += store
                            .revoke_messages_by_signer(message.fid(), signer)
                            .await?
                            .len();
                    }
                }
                info!(fid = message.fid().as_u64(), revoked, "signer removed");
            }
        }
        Ok(event_id)
    }

    /// Merges messages one at a time, in order.
    pub async fn merge_messages(&self, messages: &[Message]) -> Vec<HubResult<EventId>> {
        let mut results = Vec::with_capacity(messages.len());
        for message in messages {
            results.push(self.merge_message(message).await);
        }
        results
    }

    /// Revokes one stored message.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if the message is not stored.
    pub async fn revoke_message(&self, message: &Message) -> HubResult<EventId> {
        self.store(message.family()).revoke(message).await
    }

    /// Revokes every message of `fid` signed by `signer`, in every store.
    ///
    /// # Errors
    ///
    /// Stops at the first failed revocation.
    pub async fn revoke_messages_by_signer(&self, fid: Fid, signer: &[u8]) -> HubResult<Vec<EventId>> {
        let mut revoked = Vec::new();
        for store in self.stores() {
            revoked.extend(store.revoke_messages_by_signer(fid, signer).await?);
        }
        Ok(revoked)
    }

    /// Prunes every store of `fid` down to its quota.
    ///
    /// # Errors
    ///
    /// Stops at the first failed deletion.
    pub async fn prune_messages(&self, fid: Fid) -> HubResult<Vec<Message>> {
        let mut pruned = Vec::new();
        for store in self.stores() {
            pruned.extend(store.prune_messages(fid).await?);
        }
        if !pruned.is_empty() {
            debug!(fid = fid.as_u64(), count = pruned.len(), "pruned account");
        }
        Ok(pruned)
    }

    /// Reads the message a sync id points at.
    ///
    /// # Errors
    ///
    /// Returns `bad_request.invalid_param` for an unknown family and
    /// `not_found` if the message is not stored.
    pub fn get_message_by_sync_id(&self, sync_id: &SyncId) -> HubResult<Message> {
        self.store(sync_id.family()?)
            .get_message(sync_id.fid(), &sync_id.ts_hash()?)
    }

    /// Reads the messages of `sync_ids`, skipping ids no longer stored.
    ///
    /// # Errors
    ///
    /// Returns any error other than `not_found`.
    pub fn get_all_messages_by_sync_ids(&self, sync_ids: &[SyncId]) -> HubResult<Vec<Message>> {
        let mut messages = Vec::with_capacity(sync_ids.len());
        for sync_id in sync_ids {
            match self.get_message_by_sync_id(sync_id) {
                Ok(message) => messages.push(message),
                Err(HubError::NotFound { .. }) => {}
                Err(error) => return Err(error),
            }
        }
        Ok(messages)
    }

    /// Every stored message of `fid` across all families.
    ///
    /// # Errors
    ///
    /// Propagates keyed store and decoding errors.
    pub fn get_all_messages_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        let mut messages = Vec::new();
        for store in self.stores() {
            messages.extend(store.get_all_messages_by_fid(fid)?);
        }
        Ok(messages)
    }

    /// Visits every stored message in key order.
    ///
    /// # Errors
    ///
    /// Stops at the first keyed store, decoding or visitor error.
    pub fn for_each_message(
        &self,
        visitor: &mut dyn FnMut(&Message) -> HubResult<()>,
    ) -> HubResult<()> {
        let db = self.events.db();
        let prefix = [RootPrefix::User.as_byte()];
        let mut from = prefix.to_vec();

        loop {
            let mut page = Vec::new();
            let mut scanned = 0usize;
            let mut last_key = Vec::new();
            db.scan_prefix_from(&prefix, &from, &mut |key, value| {
                if keys::parse_primary_key(key).is_some() {
                    page.push(value.to_vec());
                }
                scanned += 1;
                last_key = key.to_vec();
                if scanned >= SCAN_PAGE_SIZE {
                    ScanControl::Stop
                } else {
                    ScanControl::Continue
                }
            })?;

            for raw in &page {
                visitor(&Message::decode(raw)?)?;
            }
            if scanned < SCAN_PAGE_SIZE {
                return Ok(());
            }
            last_key.push(0);
            from = last_key;
        }
    }
}
