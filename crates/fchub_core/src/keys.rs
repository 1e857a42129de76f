//! Key layout of the keyed store.
//!
//! ```text
//! primary   [User] fid(8) family_postfix ts_hash(24)            -> Message
//! index     [User] fid(8) index_postfix discriminant             -> ts_hash
//! by signer [User] fid(8) BY_SIGNER len(1) signer family ts_hash -> ()
//! event     [HubEvents] id(8)                                    -> HubEvent
//! trie node [SyncMerkleTrieNode] prefix                          -> DbTrieNode
//! trie mark [SyncTrieCheckpoint]                                 -> event id(8)
//! ```
//!
//! All integers are big-endian so byte order matches numeric order.

use crate::message::MessageFamily;
use crate::types::{Fid, TsHash, TS_HASH_LENGTH};

/// Number of bytes of an fid inside a key.
pub const FID_BYTES: usize = 8;

/// Length of a primary message key.
pub const PRIMARY_KEY_LENGTH: usize = 1 + FID_BYTES + 1 + TS_HASH_LENGTH;

/// Postfix of the per-signer index.
pub const BY_SIGNER_POSTFIX: u8 = 90;

/// First byte of every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RootPrefix {
    /// Per-account message records and indexes.
    User = 1,
    /// Event log.
    HubEvents = 2,
    /// Persisted sync trie nodes.
    SyncMerkleTrieNode = 3,
    /// Last event whose trie changes are persisted.
    SyncTrieCheckpoint = 4,
}

impl RootPrefix {
    /// Byte value.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Prefix of every key owned by `fid`.
#[must_use]
pub fn fid_prefix(fid: Fid) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + FID_BYTES);
    key.push(RootPrefix::User.as_byte());
    key.extend_from_slice(&fid.to_be_bytes());
    key
}

/// Prefix of the primary records of one family for `fid`.
#[must_use]
pub fn family_prefix(fid: Fid, family: MessageFamily) -> Vec<u8> {
    let mut key = fid_prefix(fid);
    key.push(family.postfix());
    key
}

/// Primary key of a message.
#[must_use]
pub fn message_primary_key(fid: Fid, family: MessageFamily, ts_hash: &TsHash) -> Vec<u8> {
    let mut key = family_prefix(fid, family);
    key.extend_from_slice(ts_hash.as_bytes());
    key
}

/// Splits a primary key into its parts. Returns `None` for any other key.
#[must_use]
pub fn parse_primary_key(key: &[u8]) -> Option<(Fid, MessageFamily, TsHash)> {
    if key.len() != PRIMARY_KEY_LENGTH || key[0] != RootPrefix::User.as_byte() {
        return None;
    }
    let mut fid = [0u8; FID_BYTES];
    fid.copy_from_slice(&key[1..=FID_BYTES]);
    let family = MessageFamily::from_postfix(key[1 + FID_BYTES]).ok()?;
    let ts_hash = TsHash::from_slice(&key[2 + FID_BYTES..]).ok()?;
    Some((Fid::new(u64::from_be_bytes(fid)), family, ts_hash))
}

/// Key of an adds or removes index entry.
#[must_use]
pub fn index_key(fid: Fid, index_postfix: u8, discriminant: &[u8]) -> Vec<u8> {
    let mut key = fid_prefix(fid);
    key.push(index_postfix);
    key.extend_from_slice(discriminant);
    key
}

/// Prefix of every by-signer entry of `signer` for `fid`.
#[must_use]
pub fn by_signer_prefix(fid: Fid, signer: &[u8]) -> Vec<u8> {
    let mut key = fid_prefix(fid);
    key.push(BY_SIGNER_POSTFIX);
    // Signer keys are 32 bytes for Ed25519 and 20 for custody addresses.
    key.push(u8::try_from(signer.len()).unwrap_or(u8::MAX));
    key.extend_from_slice(signer);
    key
}

/// Prefix of the by-signer entries of `signer` within one family.
#[must_use]
pub fn by_signer_family_prefix(fid: Fid, signer: &[u8], family: MessageFamily) -> Vec<u8> {
    let mut key = by_signer_prefix(fid, signer);
    key.push(family.postfix());
    key
}

/// Key of one by-signer entry.
#[must_use]
pub fn by_signer_key(fid: Fid, signer: &[u8], family: MessageFamily, ts_hash: &TsHash) -> Vec<u8> {
    let mut key = by_signer_family_prefix(fid, signer, family);
    key.extend_from_slice(ts_hash.as_bytes());
    key
}

/// Prefix of the event log.
#[must_use]
pub fn event_prefix() -> Vec<u8> {
    vec![RootPrefix::HubEvents.as_byte()]
}

/// Key of an event record.
#[must_use]
pub fn event_key(id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(RootPrefix::HubEvents.as_byte());
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Parses the id out of an event key.
#[must_use]
pub fn parse_event_key(key: &[u8]) -> Option<u64> {
    if key.len() != 9 || key[0] != RootPrefix::HubEvents.as_byte() {
        return None;
    }
    let mut id = [0u8; 8];
    id.copy_from_slice(&key[1..]);
    Some(u64::from_be_bytes(id))
}

/// Key of a persisted trie node.
#[must_use]
pub fn trie_node_key(prefix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + prefix.len());
    key.push(RootPrefix::SyncMerkleTrieNode.as_byte());
    key.extend_from_slice(prefix);
    key
}

/// Key of the trie checkpoint.
#[must_use]
pub fn trie_checkpoint_key() -> Vec<u8> {
    vec![RootPrefix::SyncTrieCheckpoint.as_byte()]
}
