//! Verification store.

use super::{body_mismatch, Store, StoreFamily};
use crate::error::HubResult;
use crate::message::{Message, MessageBody, MessageFamily, MessageType};
use crate::types::Fid;

/// Verification family marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerificationFamily;

impl StoreFamily for VerificationFamily {
    const FAMILY: MessageFamily = MessageFamily::Verification;
    const ADD_TYPE: MessageType = MessageType::VerificationAddEthAddress;
    const REMOVE_TYPE: Option<MessageType> = Some(MessageType::VerificationRemove);

    fn discriminant(message: &Message) -> HubResult<Vec<u8>> {
        match &message.data.body {
            MessageBody::VerificationAdd { address, .. }
            | MessageBody::VerificationRemove { address } => Ok(address.clone()),
            _ => Err(body_mismatch(Self::FAMILY)),
        }
    }
}

/// Store of address verifications.
pub type VerificationStore = Store<VerificationFamily>;

impl Store<VerificationFamily> {
    /// Reads the stored verification of `address`.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if there is none.
    pub fn get_verification_add(&self, fid: Fid, address: &[u8]) -> HubResult<Message> {
        self.get_add(fid, address)
    }

    /// Reads the stored verification remove of `address`.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if there is none.
    pub fn get_verification_remove(&self, fid: Fid, address: &[u8]) -> HubResult<Message> {
        self.get_remove(fid, address)
    }

    /// Stored verifications of `fid`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates keyed store and decoding errors.
    pub fn get_verification_adds_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        self.get_adds_by_fid(fid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PruneLimits;
    use crate::message::MessageBuilder;
    use crate::store::test_support;

    const FID: Fid = Fid::new(8);

    #[tokio::test]
    async fn remove_then_readd() {
        let store = test_support::store::<VerificationFamily>(PruneLimits::unlimited()).await;
        let address = [0xaa; 20];
        let add = MessageBuilder::verification_add(FID, &address).timestamp(1).build().unwrap();
        let remove = MessageBuilder::verification_remove(FID, &address)
            .timestamp(2)
            .build()
            .unwrap();
        let readd = MessageBuilder::verification_add(FID, &address).timestamp(3).build().unwrap();

        store.merge(&add).await.unwrap();
        store.merge(&remove).await.unwrap();
        assert!(store.get_verification_add(FID, &address).is_err());
        assert_eq!(store.get_verification_remove(FID, &address).unwrap(), remove);

        store.merge(&readd).await.unwrap();
        assert_eq!(store.get_verification_adds_by_fid(FID).unwrap(), vec![readd]);
        assert!(store.get_verification_remove(FID, &address).is_err());
    }
}
