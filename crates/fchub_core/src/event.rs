//! Hub events.
//!
//! Every committed state change produces exactly one [`HubEvent`]. Events
//! are persisted in the same write batch as the change they describe and
//! are then delivered to observers and subscribers in id order.

use crate::error::{HubError, HubResult};
use crate::message::Message;
use crate::types::Fid;
use serde::{Deserialize, Serialize};

/// Monotonic event identifier.
pub type EventId = u64;

/// Kind of an event, for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HubEventType {
    /// A message was merged.
    MergeMessage,
    /// A message was evicted by the storage quota.
    PruneMessage,
    /// A message was removed because its signer was revoked.
    RevokeMessage,
    /// An on-chain event was recorded.
    MergeOnChainEvent,
    /// A username proof was recorded.
    MergeUsernameProof,
}

/// An event observed on chain and relayed into the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainEvent {
    /// Account the event concerns.
    pub fid: Fid,
    /// Chain-specific event kind.
    pub kind: String,
    /// Block number.
    pub block_number: u64,
    /// Transaction hash.
    pub transaction_hash: Vec<u8>,
    /// Opaque payload.
    pub body: Vec<u8>,
}

/// A proof binding a username to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameProof {
    /// Account claiming the name.
    pub fid: Fid,
    /// Claimed name.
    pub name: String,
    /// Owner address.
    pub owner: Vec<u8>,
    /// Proof timestamp.
    pub timestamp: u64,
    /// Signature of the name registry.
    pub signature: Vec<u8>,
}

/// Payload of a [`HubEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HubEventBody {
    /// A message entered its store, displacing `deleted_messages`.
    MergeMessage {
        /// Merged message.
        message: Message,
        /// Messages removed by last-write-wins.
        deleted_messages: Vec<Message>,
    },
    /// A message was evicted by the storage quota.
    PruneMessage {
        /// Pruned message.
        message: Message,
    },
    /// A message was removed because its signer was revoked.
    RevokeMessage {
        /// Revoked message.
        message: Message,
    },
    /// An on-chain event was recorded.
    MergeOnChainEvent {
        /// Recorded event.
        event: OnChainEvent,
    },
    /// A username proof was recorded.
    MergeUsernameProof {
        /// New proof, if any.
        proof: Option<UsernameProof>,
        /// Displaced proof, if any.
        deleted: Option<UsernameProof>,
    },
}

impl HubEventBody {
    /// Kind of this payload.
    #[must_use]
    pub fn event_type(&self) -> HubEventType {
        match self {
            HubEventBody::MergeMessage { .. } => HubEventType::MergeMessage,
            HubEventBody::PruneMessage { .. } => HubEventType::PruneMessage,
            HubEventBody::RevokeMessage { .. } => HubEventType::RevokeMessage,
            HubEventBody::MergeOnChainEvent { .. } => HubEventType::MergeOnChainEvent,
            HubEventBody::MergeUsernameProof { .. } => HubEventType::MergeUsernameProof,
        }
    }
}

/// A committed, numbered event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubEvent {
    /// Event id, strictly increasing in commit order.
    pub id: EventId,
    /// Payload.
    pub body: HubEventBody,
}

impl HubEvent {
    /// Kind of this event.
    #[must_use]
    pub fn event_type(&self) -> HubEventType {
        self.body.event_type()
    }

    /// Encodes the event for the event log.
    ///
    /// # Errors
    ///
    /// Returns `unavailable.storage_failure` if encoding fails.
    pub fn encode(&self) -> HubResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| HubError::storage_failure(format!("failed to encode event: {e}")))?;
        Ok(bytes)
    }

    /// Decodes an event log record.
    ///
    /// # Errors
    ///
    /// Returns `unavailable.storage_failure` if the record is malformed.
    pub fn decode(bytes: &[u8]) -> HubResult<Self> {
        ciborium::from_reader(bytes)
            .map_err(|e| HubError::storage_failure(format!("failed to decode event: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageBuilder;

    #[test]
    fn event_type_follows_body() {
        let message = MessageBuilder::cast_add(Fid::new(1), "x").timestamp(1).build().unwrap();
        let event = HubEvent {
            id: 3,
            body: HubEventBody::PruneMessage { message },
        };
        assert_eq!(event.event_type(), HubEventType::PruneMessage);

        let decoded = HubEvent::decode(&event.encode().unwrap()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(HubEvent::decode(b"not cbor at all").is_err());
    }
}
