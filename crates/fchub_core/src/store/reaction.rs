//! Reaction store.

use super::{body_mismatch, Store, StoreFamily};
use crate::error::HubResult;
use crate::message::{CastId, Message, MessageBody, MessageFamily, MessageType, ReactionType};
use crate::types::Fid;

/// Reaction family marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReactionFamily;

fn reaction_discriminant(reaction_type: ReactionType, target: &CastId) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8 + target.hash.len());
    key.push(reaction_type.as_u8());
    key.extend_from_slice(&target.fid.to_be_bytes());
    key.extend_from_slice(&target.hash);
    key
}

impl StoreFamily for ReactionFamily {
    const FAMILY: MessageFamily = MessageFamily::Reaction;
    const ADD_TYPE: MessageType = MessageType::ReactionAdd;
    const REMOVE_TYPE: Option<MessageType> = Some(MessageType::ReactionRemove);

    fn discriminant(message: &Message) -> HubResult<Vec<u8>> {
        match &message.data.body {
            MessageBody::Reaction {
                reaction_type,
                target,
            } => Ok(reaction_discriminant(*reaction_type, target)),
            _ => Err(body_mismatch(Self::FAMILY)),
        }
    }
}

/// Store of reactions.
pub type ReactionStore = Store<ReactionFamily>;

impl Store<ReactionFamily> {
    /// Reads the stored reaction of `fid` to `target`.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if there is none.
    pub fn get_reaction_add(
        &self,
        fid: Fid,
        reaction_type: ReactionType,
        target: &CastId,
    ) -> HubResult<Message> {
        self.get_add(fid, &reaction_discriminant(reaction_type, target))
    }

    /// Reads the stored reaction remove of `fid` for `target`.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if there is none.
    pub fn get_reaction_remove(
        &self,
        fid: Fid,
        reaction_type: ReactionType,
        target: &CastId,
    ) -> HubResult<Message> {
        self.get_remove(fid, &reaction_discriminant(reaction_type, target))
    }

    /// Stored reactions of `fid`, optionally of one type, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates keyed store and decoding errors.
    pub fn get_reaction_adds_by_fid(
        &self,
        fid: Fid,
        reaction_type: Option<ReactionType>,
    ) -> HubResult<Vec<Message>> {
        let mut adds = self.get_adds_by_fid(fid)?;
        if let Some(wanted) = reaction_type {
            adds.retain(|m| {
                matches!(&m.data.body, MessageBody::Reaction { reaction_type, .. } if *reaction_type == wanted)
            });
        }
        Ok(adds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PruneLimits;
    use crate::message::MessageBuilder;
    use crate::store::test_support;

    const FID: Fid = Fid::new(3);

    fn target() -> CastId {
        CastId {
            fid: Fid::new(99),
            hash: vec![5; 20],
        }
    }

    #[tokio::test]
    async fn later_remove_replaces_add() {
        let store = test_support::store::<ReactionFamily>(PruneLimits::unlimited()).await;
        let like = MessageBuilder::reaction_add(FID, ReactionType::Like, target())
            .timestamp(10)
            .build()
            .unwrap();
        let unlike = MessageBuilder::reaction_remove(FID, ReactionType::Like, target())
            .timestamp(11)
            .build()
            .unwrap();

        store.merge(&like).await.unwrap();
        store.merge(&unlike).await.unwrap();

        assert!(store.get_reaction_add(FID, ReactionType::Like, &target()).is_err());
        assert_eq!(
            store.get_reaction_remove(FID, ReactionType::Like, &target()).unwrap(),
            unlike
        );
        assert_eq!(store.get_all_messages_by_fid(FID).unwrap(), vec![unlike]);
    }

    #[tokio::test]
    async fn remove_wins_timestamp_tie() {
        let store = test_support::store::<ReactionFamily>(PruneLimits::unlimited()).await;
        let like = MessageBuilder::reaction_add(FID, ReactionType::Like, target())
            .timestamp(10)
            .build()
            .unwrap();
        let unlike = MessageBuilder::reaction_remove(FID, ReactionType::Like, target())
            .timestamp(10)
            .build()
            .unwrap();

        store.merge(&unlike).await.unwrap();
        assert_eq!(store.merge(&like).await.unwrap_err().code(), "bad_request.conflict");
    }

    #[tokio::test]
    async fn like_and_recast_are_independent() {
        let store = test_support::store::<ReactionFamily>(PruneLimits::unlimited()).await;
        for reaction_type in [ReactionType::Like, ReactionType::Recast] {
            let message = MessageBuilder::reaction_add(FID, reaction_type, target())
                .timestamp(10)
                .build()
                .unwrap();
            store.merge(&message).await.unwrap();
        }
        assert_eq!(store.get_reaction_adds_by_fid(FID, None).unwrap().len(), 2);
        assert_eq!(
            store
                .get_reaction_adds_by_fid(FID, Some(ReactionType::Recast))
                .unwrap()
                .len(),
            1
        );
    }
}
