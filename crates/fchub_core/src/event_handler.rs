//! Serialized commit pipeline and event log.
//!
//! [`StoreEventHandler`] owns the only path by which message stores write to
//! the keyed store. Each [`StoreEventHandler::commit_transaction`] call hands
//! a write batch and an event payload to a single writer task, which:
//!
//! 1. assigns the next event id,
//! 2. appends the encoded event to the batch,
//! 3. commits the batch and updates the storage cache,
//! 4. notifies observers in registration order,
//! 5. broadcasts the event to subscribers.
//!
//! Because one task does all of this, events are durable, applied and
//! delivered in exactly the order of their ids.

use crate::config::{HubConfig, PruneLimits};
use crate::error::{HubError, HubResult};
use crate::event::{EventId, HubEvent, HubEventBody};
use crate::keys;
use crate::message::{Message, MessageFamily};
use crate::storage_cache::StorageCache;
use crate::types::{farcaster_time, unix_time_ms, Fid, TsHash, FARCASTER_EPOCH_MS};
use async_trait::async_trait;
use fchub_storage::{KeyValueStore, ScanControl, WriteBatch};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info};

/// Bits of an event id holding the per-millisecond sequence.
pub const SEQUENCE_BITS: u32 = 12;

/// Bits of an event id holding milliseconds since the protocol epoch.
pub const TIMESTAMP_BITS: u32 = 41;

const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

/// Receives every committed event before it is broadcast.
///
/// Observers run inside the writer task, so a merge call returns only after
/// all observers have seen its event. An observer error is logged and does
/// not undo the commit; an observer keeping derived state must record the
/// failure itself and rebuild from the log.
#[async_trait]
pub trait HubEventObserver: Send + Sync {
    /// Handles one committed event.
    async fn on_event(&self, event: &HubEvent) -> HubResult<()>;
}

/// Generates strictly increasing event ids.
///
/// An id is `(ms since protocol epoch << 12) | sequence`.
#[derive(Debug, Clone, Default)]
pub struct HubEventIdGenerator {
    last_timestamp: u64,
    last_seq: u64,
}

impl HubEventIdGenerator {
    /// Creates a generator that continues after `last_id`.
    #[must_use]
    pub fn new(last_id: Option<EventId>) -> Self {
        match last_id {
            Some(id) => Self {
                last_timestamp: id >> SEQUENCE_BITS,
                last_seq: id & MAX_SEQUENCE,
            },
            None => Self::default(),
        }
    }

    /// Returns the id for an event committed at `unix_ms`.
    ///
    /// # Errors
    ///
    /// Returns `unavailable.storage_failure` if the timestamp no longer fits
    /// the id layout.
    pub fn generate_id(&mut self, unix_ms: u64) -> HubResult<EventId> {
        let now = unix_ms.saturating_sub(FARCASTER_EPOCH_MS);
        if now > self.last_timestamp {
            self.last_timestamp = now;
            self.last_seq = 0;
        } else if self.last_seq >= MAX_SEQUENCE {
            self.last_timestamp += 1;
            self.last_seq = 0;
        } else {
            self.last_seq += 1;
        }

        if self.last_timestamp >= 1 << TIMESTAMP_BITS {
            return Err(HubError::storage_failure(
                "event id timestamp exceeds 41 bits",
            ));
        }
        Ok((self.last_timestamp << SEQUENCE_BITS) | self.last_seq)
    }
}

struct CommitRequest {
    batch: WriteBatch,
    body: HubEventBody,
    reply: oneshot::Sender<HubResult<HubEvent>>,
}

struct Writer {
    db: Arc<dyn KeyValueStore>,
    cache: Arc<StorageCache>,
    observers: Vec<Arc<dyn HubEventObserver>>,
    events: broadcast::Sender<HubEvent>,
    ids: HubEventIdGenerator,
}

impl Writer {
    async fn run(mut self, mut requests: mpsc::Receiver<CommitRequest>) {
        while let Some(request) = requests.recv().await {
            let result = self.commit(request.batch, request.body).await;
            if request.reply.send(result).is_err() {
                debug!("commit caller went away before the reply");
            }
        }
        debug!("event writer stopped");
    }

    async fn commit(&mut self, mut batch: WriteBatch, body: HubEventBody) -> HubResult<HubEvent> {
        let id = self.ids.generate_id(unix_time_ms()?)?;
        let event = HubEvent { id, body };
        batch.put(keys::event_key(id), event.encode()?);

        let db = &self.db;
        self.cache
            .commit_with(&event, || db.commit(batch).map_err(HubError::from))?;

        for observer in &self.observers {
            if let Err(error) = observer.on_event(&event).await {
                error!(event_id = id, %error, "event observer failed");
            }
        }

        // No subscribers is not an error.
        let _ = self.events.send(event.clone());
        Ok(event)
    }
}

/// Commit pipeline, event log and storage cache of a hub.
pub struct StoreEventHandler {
    db: Arc<dyn KeyValueStore>,
    cache: Arc<StorageCache>,
    requests: mpsc::Sender<CommitRequest>,
    events: broadcast::Sender<HubEvent>,
}

impl std::fmt::Debug for StoreEventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEventHandler")
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

impl StoreEventHandler {
    /// Loads the storage cache, resumes the event id sequence and spawns the
    /// writer task on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Propagates keyed store errors while loading.
    pub async fn start(
        db: Arc<dyn KeyValueStore>,
        config: &HubConfig,
        observers: Vec<Arc<dyn HubEventObserver>>,
    ) -> HubResult<Arc<Self>> {
        let cache = Arc::new(StorageCache::new());
        cache.sync_from_db(db.as_ref())?;

        let last_id = db
            .last_with_prefix(&keys::event_prefix())?
            .and_then(|(key, _)| keys::parse_event_key(&key));
        info!(last_event_id = ?last_id, observers = observers.len(), "starting event handler");

        let (requests, receiver) = mpsc::channel(config.commit_queue_capacity.max(1));
        let (events, _) = broadcast::channel(config.event_broadcast_capacity.max(1));

        let writer = Writer {
            db: Arc::clone(&db),
            cache: Arc::clone(&cache),
            observers,
            events: events.clone(),
            ids: HubEventIdGenerator::new(last_id),
        };
        tokio::spawn(writer.run(receiver));

        Ok(Arc::new(Self {
            db,
            cache,
            requests,
            events,
        }))
    }

    /// The keyed store this handler commits to.
    #[must_use]
    pub fn db(&self) -> &Arc<dyn KeyValueStore> {
        &self.db
    }

    /// Atomically commits `batch` together with an event built from `body`.
    ///
    /// Returns the committed event once it is durable, applied to the
    /// storage cache and seen by every observer.
    ///
    /// # Errors
    ///
    /// Returns `unavailable.storage_failure` if the commit fails or the
    /// writer task has stopped. Nothing is written in either case.
    pub async fn commit_transaction(
        &self,
        batch: WriteBatch,
        body: HubEventBody,
    ) -> HubResult<HubEvent> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(CommitRequest { batch, body, reply })
            .await
            .map_err(|_| HubError::storage_failure("event handler stopped"))?;
        response
            .await
            .map_err(|_| HubError::storage_failure("event handler dropped the commit"))?
    }

    /// Commits an event with no accompanying writes.
    ///
    /// # Errors
    ///
    /// See [`StoreEventHandler::commit_transaction`].
    pub async fn commit_event(&self, body: HubEventBody) -> HubResult<HubEvent> {
        self.commit_transaction(WriteBatch::new(), body).await
    }

    /// Id of the newest event in the log.
    ///
    /// # Errors
    ///
    /// Propagates keyed store errors.
    pub fn last_event_id(&self) -> HubResult<Option<EventId>> {
        Ok(self
            .db
            .last_with_prefix(&keys::event_prefix())?
            .and_then(|(key, _)| keys::parse_event_key(&key)))
    }

    /// Reads one event from the log.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if no event has this id.
    pub fn get_event(&self, id: EventId) -> HubResult<HubEvent> {
        let bytes = self
            .db
            .get(&keys::event_key(id))?
            .ok_or_else(|| HubError::not_found(format!("event {id} not found")))?;
        HubEvent::decode(&bytes)
    }

    /// Reads up to `limit` events with id `>= from_id`, in id order.
    ///
    /// # Errors
    ///
    /// Propagates keyed store and decoding errors.
    pub fn get_events(&self, from_id: Option<EventId>, limit: usize) -> HubResult<Vec<HubEvent>> {
        let mut raw = Vec::new();
        if limit > 0 {
            let from = keys::event_key(from_id.unwrap_or(0));
            self.db
                .scan_prefix_from(&keys::event_prefix(), &from, &mut |_, value| {
                    raw.push(value.to_vec());
                    if raw.len() >= limit {
                        ScanControl::Stop
                    } else {
                        ScanControl::Continue
                    }
                })?;
        }
        raw.iter().map(|bytes| HubEvent::decode(bytes)).collect()
    }

    /// Subscribes to events committed from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    /// The storage cache.
    #[must_use]
    pub fn cache(&self) -> &StorageCache {
        &self.cache
    }

    /// Cached message count of `family` for `fid`.
    ///
    /// # Errors
    ///
    /// Propagates keyed store errors from a lazy fill.
    pub fn get_cache_message_count(&self, fid: Fid, family: MessageFamily) -> HubResult<u64> {
        self.cache.get_message_count(self.db.as_ref(), fid, family)
    }

    /// Oldest stored ts-hash of `family` for `fid`.
    ///
    /// # Errors
    ///
    /// Propagates keyed store errors from a lazy fill.
    pub fn get_earliest_ts_hash(&self, fid: Fid, family: MessageFamily) -> HubResult<Option<TsHash>> {
        self.cache.get_earliest_ts_hash(self.db.as_ref(), fid, family)
    }

    /// Returns true if `message` would be evicted as soon as it is stored.
    ///
    /// A message is prunable when it is older than the time limit, or when
    /// the family is at its size limit and the message sorts before the
    /// oldest stored one.
    ///
    /// # Errors
    ///
    /// Propagates clock and keyed store errors.
    pub fn is_prunable(&self, message: &Message, limits: PruneLimits) -> HubResult<bool> {
        if let Some(time_limit) = limits.time_limit {
            let cutoff = farcaster_time()?.saturating_sub(time_limit);
            if message.timestamp() < cutoff {
                return Ok(true);
            }
        }

        let Some(size_limit) = limits.size_limit else {
            return Ok(false);
        };
        let count = self.get_cache_message_count(message.fid(), message.family())?;
        if count < size_limit {
            return Ok(false);
        }
        let Some(earliest) = self.get_earliest_ts_hash(message.fid(), message.family())? else {
            return Ok(false);
        };
        Ok(message.ts_hash()? < earliest)
    }
}
