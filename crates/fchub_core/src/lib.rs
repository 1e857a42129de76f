//! # fchub core
//!
//! Message storage and event pipeline of the hub.
//!
//! This crate provides:
//! - The signed [`Message`] model, [`MessageBuilder`] and [`SyncId`]
//! - Last-write-wins message stores, one per family ([`store`])
//! - [`StoreEventHandler`]: serialized commits, the event log and fan-out
//! - [`StorageCache`]: per-account counts behind quota checks
//! - [`MessageEngine`]: validation, routing and signer revocation
//!
//! ## Example
//!
//! ```rust,ignore
//! use fchub_core::{Fid, HubConfig, MessageBuilder, MessageEngine, StoreEventHandler};
//! use fchub_storage::MemoryStore;
//! use std::sync::Arc;
//!
//! let config = HubConfig::default();
//! let events = StoreEventHandler::start(Arc::new(MemoryStore::new()), &config, vec![]).await?;
//! let engine = MessageEngine::new(events, &config);
//!
//! let follow = MessageBuilder::link_add(Fid::new(1), "follow", Fid::new(2)).build()?;
//! engine.merge_message(&follow).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod event;
mod event_handler;
pub mod keys;
mod message;
mod storage_cache;
pub mod store;
mod sync_id;
mod types;
mod validation;

pub use config::{HubConfig, PruneLimits, StorageQuota, StoreLimits};
pub use engine::MessageEngine;
pub use error::{HubError, HubResult};
pub use event::{EventId, HubEvent, HubEventBody, HubEventType, OnChainEvent, UsernameProof};
pub use event_handler::{HubEventIdGenerator, HubEventObserver, StoreEventHandler};
pub use message::{
    compute_hash, default_signer, CastAddBody, CastId, HashScheme, Message, MessageBody,
    MessageBuilder, MessageData, MessageFamily, MessageType, Network, ReactionType,
    SignatureScheme, UserDataType,
};
pub use storage_cache::StorageCache;
pub use sync_id::{timestamp_to_padded_prefix, SyncId, SYNC_ID_LENGTH, TIMESTAMP_LENGTH};
pub use types::{
    farcaster_time, to_farcaster_time, unix_time_ms, Fid, TsHash, FARCASTER_EPOCH_MS,
    HASH_LENGTH, TS_HASH_LENGTH,
};
pub use validation::{
    MessageValidator, NoopValidator, StructuralValidator, ALLOWED_CLOCK_SKEW_SECONDS,
};
