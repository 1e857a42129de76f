//! Cast store.
//!
//! Casts are keyed by their own hash. A `CastRemove` names the hash it
//! removes and beats the add no matter which is newer, so a removed cast can
//! never be resurrected by a late-arriving add.

use super::{body_mismatch, Store, StoreFamily};
use crate::error::HubResult;
use crate::message::{Message, MessageBody, MessageFamily, MessageType};
use crate::types::Fid;

/// Cast family marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct CastFamily;

impl StoreFamily for CastFamily {
    const FAMILY: MessageFamily = MessageFamily::Cast;
    const ADD_TYPE: MessageType = MessageType::CastAdd;
    const REMOVE_TYPE: Option<MessageType> = Some(MessageType::CastRemove);
    const REMOVE_ALWAYS_WINS: bool = true;

    fn discriminant(message: &Message) -> HubResult<Vec<u8>> {
        match &message.data.body {
            MessageBody::CastAdd(_) => Ok(message.hash.clone()),
            MessageBody::CastRemove { target_hash } => Ok(target_hash.clone()),
            _ => Err(body_mismatch(Self::FAMILY)),
        }
    }
}

/// Store of casts.
pub type CastStore = Store<CastFamily>;

impl Store<CastFamily> {
    /// Reads a stored cast by hash.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if the cast is not stored.
    pub fn get_cast_add(&self, fid: Fid, hash: &[u8]) -> HubResult<Message> {
        self.get_add(fid, hash)
    }

    /// Reads the remove of a cast by the removed hash.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if no remove is stored.
    pub fn get_cast_remove(&self, fid: Fid, target_hash: &[u8]) -> HubResult<Message> {
        self.get_remove(fid, target_hash)
    }

    /// Stored casts of `fid`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates keyed store and decoding errors.
    pub fn get_cast_adds_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        self.get_adds_by_fid(fid)
    }

    /// Stored cast removes of `fid`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates keyed store and decoding errors.
    pub fn get_cast_removes_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        self.get_removes_by_fid(fid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PruneLimits;
    use crate::event::HubEventBody;
    use crate::message::MessageBuilder;
    use crate::store::test_support;
    use crate::types::farcaster_time;

    const FID: Fid = Fid::new(10);

    fn cast(text: &str, ts: u32) -> Message {
        MessageBuilder::cast_add(FID, text).timestamp(ts).build().unwrap()
    }

    fn remove(target: &Message, ts: u32) -> Message {
        MessageBuilder::cast_remove(FID, &target.hash)
            .timestamp(ts)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn merge_and_read_back() {
        let store = test_support::store::<CastFamily>(PruneLimits::unlimited()).await;
        let add = cast("gm", 100);
        store.merge(&add).await.unwrap();

        assert_eq!(store.get_cast_add(FID, &add.hash).unwrap(), add);
        assert_eq!(store.get_cast_adds_by_fid(FID).unwrap(), vec![add.clone()]);
        assert!(store.get_cast_removes_by_fid(FID).unwrap().is_empty());
        assert_eq!(
            store.merge(&add).await.unwrap_err().code(),
            "bad_request.duplicate"
        );
    }

    #[tokio::test]
    async fn remove_wins_even_when_older() {
        let store = test_support::store::<CastFamily>(PruneLimits::unlimited()).await;
        let add = cast("gm", 200);
        let old_remove = remove(&add, 100);
        let mut events = store.events.subscribe();

        store.merge(&add).await.unwrap();
        store.merge(&old_remove).await.unwrap();

        assert!(store.get_cast_add(FID, &add.hash).is_err());
        assert_eq!(store.get_cast_remove(FID, &add.hash).unwrap(), old_remove);

        let _ = events.recv().await.unwrap();
        match events.recv().await.unwrap().body {
            HubEventBody::MergeMessage {
                message,
                deleted_messages,
            } => {
                assert_eq!(message, old_remove);
                assert_eq!(deleted_messages, vec![add]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn add_after_remove_conflicts() {
        let store = test_support::store::<CastFamily>(PruneLimits::unlimited()).await;
        let add = cast("gm", 300);
        store.merge(&remove(&add, 100)).await.unwrap();

        let error = store.merge(&add).await.unwrap_err();
        assert_eq!(error.code(), "bad_request.conflict");
        assert!(store.get_cast_add(FID, &add.hash).is_err());
    }

    #[tokio::test]
    async fn rejects_other_families() {
        let store = test_support::store::<CastFamily>(PruneLimits::unlimited()).await;
        let link = MessageBuilder::link_add(FID, "follow", Fid::new(2))
            .timestamp(1)
            .build()
            .unwrap();
        let error = store.merge(&link).await.unwrap_err();
        assert_eq!(error.to_string(), "bad_request.validation_failure: invalid message type");
        assert_eq!(store.revoke(&link).await.unwrap_err().code(), "bad_request.invalid_param");
    }

    #[tokio::test]
    async fn old_casts_are_prunable() {
        let store = test_support::store::<CastFamily>(PruneLimits::unlimited().time_limit(60)).await;
        let now = farcaster_time().unwrap();

        let error = store.merge(&cast("stale", now - 3_600)).await.unwrap_err();
        assert_eq!(error.code(), "bad_request.prunable");
        store.merge(&cast("fresh", now)).await.unwrap();
    }
}
