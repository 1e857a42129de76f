//! Signer store.
//!
//! Tracks which delegate keys an account has authorized. Removing a signer
//! here only records the removal; the engine revokes the messages the key
//! signed in the other stores.

use super::{body_mismatch, Store, StoreFamily};
use crate::error::HubResult;
use crate::message::{Message, MessageBody, MessageFamily, MessageType};
use crate::types::Fid;

/// Signer family marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignerFamily;

impl StoreFamily for SignerFamily {
    const FAMILY: MessageFamily = MessageFamily::Signer;
    const ADD_TYPE: MessageType = MessageType::SignerAdd;
    const REMOVE_TYPE: Option<MessageType> = Some(MessageType::SignerRemove);

    fn discriminant(message: &Message) -> HubResult<Vec<u8>> {
        match &message.data.body {
            MessageBody::Signer { signer, .. } => Ok(signer.clone()),
            _ => Err(body_mismatch(Self::FAMILY)),
        }
    }
}

/// Store of signer grants.
pub type SignerStore = Store<SignerFamily>;

impl Store<SignerFamily> {
    /// Reads the grant of `signer_key`.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if the key is not authorized.
    pub fn get_signer_add(&self, fid: Fid, signer_key: &[u8]) -> HubResult<Message> {
        self.get_add(fid, signer_key)
    }

    /// Reads the removal of `signer_key`.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if the key was never removed.
    pub fn get_signer_remove(&self, fid: Fid, signer_key: &[u8]) -> HubResult<Message> {
        self.get_remove(fid, signer_key)
    }

    /// Authorized signer grants of `fid`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates keyed store and decoding errors.
    pub fn get_signer_adds_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        self.get_adds_by_fid(fid)
    }

    /// Signer removals of `fid`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates keyed store and decoding errors.
    pub fn get_signer_removes_by_fid(&self, fid: Fid) -> HubResult<Vec<Message>> {
        self.get_removes_by_fid(fid)
    }
}
