//! Link store.

use super::{body_mismatch, Store, StoreFamily};
use crate::error::{HubError, HubResult};
use crate::message::{Message, MessageBody, MessageFamily, MessageType};
use crate::types::Fid;
use crate::validation::MAX_LINK_TYPE_BYTES;

/// Link family marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkFamily;

// Link type zero-padded to 8 bytes, then the target fid.
fn link_discriminant(link_type: &str, target_fid: Fid) -> HubResult<Vec<u8>> {
    let bytes = link_type.as_bytes();
    if bytes.len() > MAX_LINK_TYPE_BYTES {
        return Err(HubError::invalid_param("link type longer than 8 bytes"));
    }
    let mut key = vec![0u8; MAX_LINK_TYPE_BYTES];
    key[..bytes.len()].copy_from_slice(bytes);
    key.extend_from_slice(&target_fid.to_be_bytes());
    Ok(key)
}

impl StoreFamily for LinkFamily {
    const FAMILY: MessageFamily = MessageFamily::Link;
    const ADD_TYPE: MessageType = MessageType::LinkAdd;
    const REMOVE_TYPE: Option<MessageType> = Some(MessageType::LinkRemove);

    fn discriminant(message: &Message) -> HubResult<Vec<u8>> {
        match &message.data.body {
            MessageBody::Link {
                link_type,
                target_fid,
            } => link_discriminant(link_type, *target_fid),
            _ => Err(body_mismatch(Self::FAMILY)),
        }
    }
}

/// Store of links.
pub type LinkStore = Store<LinkFamily>;

impl Store<LinkFamily> {
    /// Reads the stored link of `fid` to `target_fid`.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if there is none.
    pub fn get_link_add(&self, fid: Fid, link_type: &str, target_fid: Fid) -> HubResult<Message> {
        self.get_add(fid, &link_discriminant(link_type, target_fid)?)
    }

    /// Reads the stored link remove of `fid` for `target_fid`.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if there is none.
    pub fn get_link_remove(&self, fid: Fid, link_type: &str, target_fid: Fid) -> HubResult<Message> {
        self.get_remove(fid, &link_discriminant(link_type, target_fid)?)
    }

    /// Stored links of `fid`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates keyed store and decoding errors.
    pub fn get_link_adds_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        self.get_adds_by_fid(fid)
    }

    /// Stored link removes of `fid`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates keyed store and decoding errors.
    pub fn get_link_removes_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        self.get_removes_by_fid(fid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PruneLimits;
    use crate::message::MessageBuilder;
    use crate::store::test_support;
    use crate::types::HASH_LENGTH;

    const FID: Fid = Fid::new(1);
    const TARGET: Fid = Fid::new(2);

    fn follow(ts: u32) -> Message {
        MessageBuilder::link_add(FID, "follow", TARGET)
            .timestamp(ts)
            .build()
            .unwrap()
    }

    fn unfollow(ts: u32) -> Message {
        MessageBuilder::link_remove(FID, "follow", TARGET)
            .timestamp(ts)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn newer_timestamp_wins() {
        let store = test_support::store::<LinkFamily>(PruneLimits::unlimited()).await;
        store.merge(&follow(100)).await.unwrap();
        store.merge(&unfollow(200)).await.unwrap();

        assert!(store.get_link_add(FID, "follow", TARGET).is_err());
        assert_eq!(store.get_link_remove(FID, "follow", TARGET).unwrap(), unfollow(200));

        let error = store.merge(&follow(150)).await.unwrap_err();
        assert_eq!(error.code(), "bad_request.conflict");

        store.merge(&follow(300)).await.unwrap();
        assert_eq!(store.get_link_add(FID, "follow", TARGET).unwrap(), follow(300));
        assert!(store.get_link_removes_by_fid(FID).unwrap().is_empty());
    }

    #[tokio::test]
    async fn higher_hash_wins_timestamp_tie() {
        let store = test_support::store::<LinkFamily>(PruneLimits::unlimited()).await;
        let low = MessageBuilder::link_add(FID, "follow", TARGET)
            .timestamp(100)
            .hash(&[0x01; HASH_LENGTH])
            .build()
            .unwrap();
        let high = MessageBuilder::link_add(FID, "follow", TARGET)
            .timestamp(100)
            .hash(&[0x02; HASH_LENGTH])
            .build()
            .unwrap();

        store.merge(&low).await.unwrap();
        store.merge(&high).await.unwrap();
        assert_eq!(store.get_link_add(FID, "follow", TARGET).unwrap(), high);
        assert_eq!(store.merge(&low).await.unwrap_err().code(), "bad_request.conflict");
        assert_eq!(store.get_all_messages_by_fid(FID).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn prune_keeps_newest_within_size_limit() {
        let store = test_support::store::<LinkFamily>(PruneLimits::unlimited()).await;
        for target in 0..5u64 {
            let message = MessageBuilder::link_add(FID, "follow", Fid::new(100 + target))
                .timestamp(10 + u32::try_from(target).unwrap())
                .build()
                .unwrap();
            store.merge(&message).await.unwrap();
        }

        let limited = Store::<LinkFamily>::new(
            std::sync::Arc::clone(&store.events),
            PruneLimits::unlimited().size_limit(3),
            &crate::config::HubConfig::default(),
        );
        let pruned = limited.prune_messages(FID).await.unwrap();
        let pruned_ts: Vec<u32> = pruned.iter().map(Message::timestamp).collect();
        assert_eq!(pruned_ts, vec![10, 11]);

        let remaining: Vec<u32> = limited
            .get_link_adds_by_fid(FID)
            .unwrap()
            .iter()
            .map(Message::timestamp)
            .collect();
        assert_eq!(remaining, vec![12, 13, 14]);
        assert!(limited.prune_messages(FID).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn prune_drops_messages_older_than_time_limit() {
        let now = crate::types::farcaster_time().unwrap();
        let store = test_support::store::<LinkFamily>(PruneLimits::unlimited()).await;
        for (target, ts) in [(100, now - 3_600), (101, now - 3_599), (102, now - 10), (103, now)] {
            let message = MessageBuilder::link_add(FID, "follow", Fid::new(target))
                .timestamp(ts)
                .build()
                .unwrap();
            store.merge(&message).await.unwrap();
        }

        let limited = Store::<LinkFamily>::new(
            std::sync::Arc::clone(&store.events),
            PruneLimits::unlimited().time_limit(60),
            &crate::config::HubConfig::default(),
        );
        let mut events = store.events.subscribe();
        let pruned = limited.prune_messages(FID).await.unwrap();
        let pruned_ts: Vec<u32> = pruned.iter().map(Message::timestamp).collect();
        assert_eq!(pruned_ts, vec![now - 3_600, now - 3_599]);

        for expected in &pruned {
            match events.try_recv().unwrap().body {
                crate::event::HubEventBody::PruneMessage { message } => assert_eq!(&message, expected),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(events.try_recv().is_err());

        let remaining: Vec<u32> = limited
            .get_link_adds_by_fid(FID)
            .unwrap()
            .iter()
            .map(Message::timestamp)
            .collect();
        assert_eq!(remaining, vec![now - 10, now]);
        assert!(limited.prune_messages(FID).await.unwrap().is_empty());
    }

    #[test]
    fn long_link_types_have_no_discriminant() {
        let message = MessageBuilder::link_add(FID, "much-too-long", TARGET)
            .timestamp(1)
            .build()
            .unwrap();
        assert!(LinkFamily::discriminant(&message).is_err());
    }
}
