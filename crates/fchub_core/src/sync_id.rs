//! Sync identifiers.
//!
//! A [`SyncId`] is the key a message occupies in the sync trie:
//!
//! ```text
//! timestamp (10 ASCII digits) | hash (20) | fid (8, BE) | family postfix (1)
//! ```
//!
//! The decimal timestamp prefix makes the first ten trie levels a time
//! index, so peers can compare "everything before second T" by prefix.

use crate::error::{HubError, HubResult};
use crate::keys;
use crate::message::{Message, MessageFamily};
use crate::types::{Fid, TsHash, HASH_LENGTH};
use std::fmt;

/// Number of ASCII digits in the timestamp prefix.
pub const TIMESTAMP_LENGTH: usize = 10;

/// Total length of an encoded sync id.
pub const SYNC_ID_LENGTH: usize = TIMESTAMP_LENGTH + HASH_LENGTH + 8 + 1;

const HASH_OFFSET: usize = TIMESTAMP_LENGTH;
const FID_OFFSET: usize = HASH_OFFSET + HASH_LENGTH;
const POSTFIX_OFFSET: usize = FID_OFFSET + 8;

/// Zero-padded decimal timestamp used as a trie prefix.
#[must_use]
pub fn timestamp_to_padded_prefix(timestamp: u32) -> Vec<u8> {
    format!("{timestamp:0width$}", width = TIMESTAMP_LENGTH).into_bytes()
}

/// Trie key identifying one stored message.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncId(Vec<u8>);

impl SyncId {
    /// Derives the sync id of a message.
    ///
    /// # Errors
    ///
    /// Returns `bad_request.invalid_param` if the message hash has the wrong
    /// length.
    pub fn from_message(message: &Message) -> HubResult<Self> {
        Self::from_parts(
            message.timestamp(),
            &message.hash,
            message.fid(),
            message.family(),
        )
    }

    /// Assembles a sync id from its components.
    ///
    /// # Errors
    ///
    /// Returns `bad_request.invalid_param` if `hash` is not 20 bytes.
    pub fn from_parts(
        timestamp: u32,
        hash: &[u8],
        fid: Fid,
        family: MessageFamily,
    ) -> HubResult<Self> {
        if hash.len() != HASH_LENGTH {
            return Err(HubError::invalid_param(format!(
                "sync id hash must be {HASH_LENGTH} bytes, got {}",
                hash.len()
            )));
        }
        let mut bytes = Vec::with_capacity(SYNC_ID_LENGTH);
        bytes.extend_from_slice(&timestamp_to_padded_prefix(timestamp));
        bytes.extend_from_slice(hash);
        bytes.extend_from_slice(&fid.to_be_bytes());
        bytes.push(family.postfix());
        Ok(Self(bytes))
    }

    /// Parses and validates raw sync id bytes.
    ///
    /// # Errors
    ///
    /// Returns `bad_request.invalid_param` for a wrong length, a non-decimal
    /// timestamp or an unknown family postfix.
    pub fn from_bytes(bytes: &[u8]) -> HubResult<Self> {
        if bytes.len() != SYNC_ID_LENGTH {
            return Err(HubError::invalid_param(format!(
                "sync id must be {SYNC_ID_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        let id = Self(bytes.to_vec());
        id.parse_timestamp()?;
        MessageFamily::from_postfix(bytes[POSTFIX_OFFSET])?;
        Ok(id)
    }

    fn parse_timestamp(&self) -> HubResult<u32> {
        let digits = &self.0[..TIMESTAMP_LENGTH];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(HubError::invalid_param("sync id timestamp is not decimal"));
        }
        digits
            .iter()
            .try_fold(0u32, |acc, d| {
                acc.checked_mul(10)?.checked_add(u32::from(d - b'0'))
            })
            .ok_or_else(|| HubError::invalid_param("sync id timestamp out of range"))
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the id and returns its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Protocol timestamp.
    #[must_use]
    pub fn timestamp(&self) -> u32 {
        // Validated at construction.
        self.parse_timestamp().unwrap_or_default()
    }

    /// Message hash.
    #[must_use]
    pub fn hash(&self) -> &[u8] {
        &self.0[HASH_OFFSET..FID_OFFSET]
    }

    /// Author.
    #[must_use]
    pub fn fid(&self) -> Fid {
        let mut fid = [0u8; 8];
        fid.copy_from_slice(&self.0[FID_OFFSET..POSTFIX_OFFSET]);
        Fid::new(u64::from_be_bytes(fid))
    }

    /// Store family.
    ///
    /// # Errors
    ///
    /// Returns `bad_request.invalid_param` if the postfix names no family.
    pub fn family(&self) -> HubResult<MessageFamily> {
        MessageFamily::from_postfix(self.0[POSTFIX_OFFSET])
    }

    /// Ordering key of the referenced message.
    ///
    /// # Errors
    ///
    /// Propagates hash length errors.
    pub fn ts_hash(&self) -> HubResult<TsHash> {
        TsHash::new(self.timestamp(), self.hash())
    }

    /// Primary key of the referenced message in the keyed store.
    ///
    /// # Errors
    ///
    /// Returns `bad_request.invalid_param` for an unknown family postfix.
    pub fn primary_key(&self) -> HubResult<Vec<u8>> {
        Ok(keys::message_primary_key(
            self.fid(),
            self.family()?,
            &self.ts_hash()?,
        ))
    }
}

impl AsRef<[u8]> for SyncId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            String::from_utf8_lossy(&self.0[..TIMESTAMP_LENGTH]),
            hex::encode(self.hash()),
            self.fid()
        )
    }
}
