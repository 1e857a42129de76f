//! Message fixtures.
//!
//! Every fixture takes an explicit timestamp so tests do not depend on the
//! clock.

use fchub_core::{
    CastId, Fid, HubResult, Message, MessageBuilder, ReactionType, UserDataType,
};

/// A 20-byte address derived from `seed`.
pub fn address(seed: u8) -> Vec<u8> {
    vec![seed; 20]
}

/// A 32-byte signer key derived from `seed`.
pub fn signer_key(seed: u8) -> Vec<u8> {
    vec![seed; 32]
}

/// A cast add.
pub fn cast_add(fid: u64, text: &str, timestamp: u32) -> HubResult<Message> {
    MessageBuilder::cast_add(Fid::new(fid), text)
        .timestamp(timestamp)
        .build()
}

/// A cast remove targeting `target`.
pub fn cast_remove(fid: u64, target: &Message, timestamp: u32) -> HubResult<Message> {
    MessageBuilder::cast_remove(Fid::new(fid), &target.hash)
        .timestamp(timestamp)
        .build()
}

/// A like on `target`.
pub fn like(fid: u64, target: &Message, timestamp: u32) -> HubResult<Message> {
    let cast = CastId {
        fid: target.fid(),
        hash: target.hash.clone(),
    };
    MessageBuilder::reaction_add(Fid::new(fid), ReactionType::Like, cast)
        .timestamp(timestamp)
        .build()
}

/// A follow of `target`.
pub fn link_add(fid: u64, target: u64, timestamp: u32) -> HubResult<Message> {
    MessageBuilder::link_add(Fid::new(fid), "follow", Fid::new(target))
        .timestamp(timestamp)
        .build()
}

/// An unfollow of `target`.
pub fn link_remove(fid: u64, target: u64, timestamp: u32) -> HubResult<Message> {
    MessageBuilder::link_remove(Fid::new(fid), "follow", Fid::new(target))
        .timestamp(timestamp)
        .build()
}

/// A display name update.
pub fn display_name(fid: u64, name: &str, timestamp: u32) -> HubResult<Message> {
    MessageBuilder::user_data_add(Fid::new(fid), UserDataType::Display, name)
        .timestamp(timestamp)
        .build()
}

/// A signer add for `key`, signed by `custody`.
pub fn signer_add(fid: u64, key: &[u8], custody: &[u8], timestamp: u32) -> HubResult<Message> {
    MessageBuilder::signer_add(Fid::new(fid), key)
        .signer(custody)
        .timestamp(timestamp)
        .build()
}

/// A signer remove for `key`, signed by `custody`.
pub fn signer_remove(fid: u64, key: &[u8], custody: &[u8], timestamp: u32) -> HubResult<Message> {
    MessageBuilder::signer_remove(Fid::new(fid), key)
        .signer(custody)
        .timestamp(timestamp)
        .build()
}

/// A verification add for `address`.
pub fn verification_add(fid: u64, address: &[u8], timestamp: u32) -> HubResult<Message> {
    MessageBuilder::verification_add(Fid::new(fid), address)
        .timestamp(timestamp)
        .build()
}
