//! Core type definitions for the hub.

use crate::error::{HubError, HubResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of a message hash (truncated blake3).
pub const HASH_LENGTH: usize = 20;

/// Length of a [`TsHash`]: 4 timestamp bytes followed by the hash.
pub const TS_HASH_LENGTH: usize = 4 + HASH_LENGTH;

/// Protocol epoch (2021-01-01T00:00:00Z) in milliseconds since the Unix epoch.
pub const FARCASTER_EPOCH_MS: u64 = 1_609_459_200_000;

/// Account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fid(pub u64);

impl Fid {
    /// Creates a new fid.
    #[must_use]
    pub const fn new(fid: u64) -> Self {
        Self(fid)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Big-endian key encoding.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for Fid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fid:{}", self.0)
    }
}

impl From<u64> for Fid {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Timestamp-then-hash ordering key of a message.
///
/// Byte order equals `(timestamp, hash)` order, which is the order every
/// last-write-wins decision and every per-fid iteration uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TsHash([u8; TS_HASH_LENGTH]);

impl TsHash {
    /// Builds a ts-hash from a protocol timestamp and a 20-byte hash.
    ///
    /// # Errors
    ///
    /// Returns `bad_request.invalid_param` if the hash has the wrong length.
    pub fn new(timestamp: u32, hash: &[u8]) -> HubResult<Self> {
        if hash.len() != HASH_LENGTH {
            return Err(HubError::invalid_param(format!(
                "hash must be {HASH_LENGTH} bytes, got {}",
                hash.len()
            )));
        }
        let mut bytes = [0u8; TS_HASH_LENGTH];
        bytes[..4].copy_from_slice(&timestamp.to_be_bytes());
        bytes[4..].copy_from_slice(hash);
        Ok(Self(bytes))
    }

    /// Parses a ts-hash from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns `bad_request.invalid_param` if the slice has the wrong length.
    pub fn from_slice(bytes: &[u8]) -> HubResult<Self> {
        let array: [u8; TS_HASH_LENGTH] = bytes.try_into().map_err(|_| {
            HubError::invalid_param(format!(
                "ts-hash must be {TS_HASH_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Protocol timestamp part.
    #[must_use]
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Hash part.
    #[must_use]
    pub fn hash(&self) -> &[u8] {
        &self.0[4..]
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for TsHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.timestamp(), hex::encode(self.hash()))
    }
}

/// Converts Unix milliseconds to protocol seconds.
///
/// # Errors
///
/// Returns `bad_request.invalid_param` for times before the protocol epoch
/// or beyond the 32-bit range.
pub fn to_farcaster_time(unix_ms: u64) -> HubResult<u32> {
    let since_epoch = unix_ms
        .checked_sub(FARCASTER_EPOCH_MS)
        .ok_or_else(|| HubError::invalid_param("time is before the protocol epoch"))?;
    u32::try_from(since_epoch / 1000)
        .map_err(|_| HubError::invalid_param("time does not fit in 32 bits"))
}

/// Current Unix time in milliseconds.
///
/// # Errors
///
/// Returns `bad_request.invalid_param` if the system clock is before 1970.
pub fn unix_time_ms() -> HubResult<u64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| HubError::invalid_param("system clock is before the Unix epoch"))?;
    u64::try_from(elapsed.as_millis())
        .map_err(|_| HubError::invalid_param("system clock out of range"))
}

/// Current protocol time in seconds.
///
/// # Errors
///
/// Returns `bad_request.invalid_param` if the clock is outside the protocol range.
pub fn farcaster_time() -> HubResult<u32> {
    to_farcaster_time(unix_time_ms()?)
}
