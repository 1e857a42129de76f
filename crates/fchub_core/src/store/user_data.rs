//! User data store.
//!
//! One value per profile field. There is no remove type; a field is changed
//! by merging a newer add.

use super::{body_mismatch, Store, StoreFamily};
use crate::error::HubResult;
use crate::message::{Message, MessageBody, MessageFamily, MessageType, UserDataType};
use crate::types::Fid;

/// User data family marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserDataFamily;

impl StoreFamily for UserDataFamily {
    const FAMILY: MessageFamily = MessageFamily::UserData;
    const ADD_TYPE: MessageType = MessageType::UserDataAdd;
    const REMOVE_TYPE: Option<MessageType> = None;

    fn discriminant(message: &Message) -> HubResult<Vec<u8>> {
        match &message.data.body {
            MessageBody::UserData { data_type, .. } => Ok(vec![data_type.as_u8()]),
            _ => Err(body_mismatch(Self::FAMILY)),
        }
    }
}

/// Store of profile data.
pub type UserDataStore = Store<UserDataFamily>;

impl Store<UserDataFamily> {
    /// Reads the current value of one profile field.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if the field was never set.
    pub fn get_user_data(&self, fid: Fid, data_type: UserDataType) -> HubResult<Message> {
        self.get_add(fid, &[data_type.as_u8()])
    }

    /// Every profile field of `fid`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates keyed store and decoding errors.
    pub fn get_user_data_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        self.get_adds_by_fid(fid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PruneLimits;
    use crate::message::MessageBuilder;
    use crate::store::test_support;

    const FID: Fid = Fid::new(77);

    fn bio(value: &str, ts: u32) -> Message {
        MessageBuilder::user_data_add(FID, UserDataType::Bio, value)
            .timestamp(ts)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn newer_value_replaces_older() {
        let store = test_support::store::<UserDataFamily>(PruneLimits::unlimited()).await;
        store.merge(&bio("old", 100)).await.unwrap();
        store.merge(&bio("new", 200)).await.unwrap();

        assert_eq!(store.get_user_data(FID, UserDataType::Bio).unwrap(), bio("new", 200));
        assert_eq!(store.merge(&bio("older", 50)).await.unwrap_err().code(), "bad_request.conflict");
        assert_eq!(store.get_user_data_by_fid(FID).unwrap().len(), 1);
        assert!(store.get_user_data(FID, UserDataType::Url).is_err());
    }

    #[tokio::test]
    async fn merging_twice_changes_nothing() {
        let store = test_support::store::<UserDataFamily>(PruneLimits::unlimited()).await;
        let message = bio("same", 100);
        store.merge(&message).await.unwrap();
        let before = store.get_all_messages_by_fid(FID).unwrap();

        assert_eq!(store.merge(&message).await.unwrap_err().code(), "bad_request.duplicate");
        assert_eq!(store.get_all_messages_by_fid(FID).unwrap(), before);
    }

    #[tokio::test]
    async fn removes_are_not_supported() {
        let store = test_support::store::<UserDataFamily>(PruneLimits::unlimited()).await;
        let error = store.get_remove(FID, &[UserDataType::Bio.as_u8()]).unwrap_err();
        assert_eq!(error.code(), "bad_request.invalid_param");
        assert!(store.get_removes_by_fid(FID).unwrap().is_empty());
    }

    #[tokio::test]
    async fn full_store_rejects_older_message() {
        let store = test_support::store::<UserDataFamily>(PruneLimits::unlimited().size_limit(1)).await;
        store.merge(&bio("current", 100)).await.unwrap();

        let display = MessageBuilder::user_data_add(FID, UserDataType::Display, "name")
            .timestamp(50)
            .build()
            .unwrap();
        assert_eq!(store.merge(&display).await.unwrap_err().code(), "bad_request.prunable");
    }
}
