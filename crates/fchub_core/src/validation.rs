//! Message validation collaborator.
//!
//! Stores never validate messages themselves. The engine runs a
//! [`MessageValidator`] before routing a message to its store; the default
//! [`StructuralValidator`] checks everything that can be checked without
//! on-chain state or signature cryptography.

use crate::error::{HubError, HubResult};
use crate::message::{compute_hash, CastId, Message, MessageBody, Network, UserDataType};
use crate::types::{farcaster_time, HASH_LENGTH};

/// How far in the future a message timestamp may be, in seconds.
pub const ALLOWED_CLOCK_SKEW_SECONDS: u32 = 10 * 60;

/// Longest link type, in bytes.
pub const MAX_LINK_TYPE_BYTES: usize = 8;

const MAX_CAST_TEXT_CHARS: usize = 320;
const MAX_EMBEDS: usize = 2;
const MAX_MENTIONS: usize = 5;
const ETH_ADDRESS_LENGTH: usize = 20;
const BLOCK_HASH_LENGTH: usize = 32;
const ED25519_KEY_LENGTH: usize = 32;

/// Decides whether a message may enter a store.
pub trait MessageValidator: Send + Sync {
    /// Returns `Ok(())` if the message is acceptable.
    ///
    /// # Errors
    ///
    /// Returns `bad_request.validation_failure` describing the first problem.
    fn validate(&self, message: &Message) -> HubResult<()>;
}

/// Accepts every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl MessageValidator for NoopValidator {
    fn validate(&self, _message: &Message) -> HubResult<()> {
        Ok(())
    }
}

/// Schema, hash and clock checks.
#[derive(Debug, Clone, Default)]
pub struct StructuralValidator {
    network: Option<Network>,
}

impl StructuralValidator {
    /// Creates a validator that accepts any network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept messages for `network`.
    #[must_use]
    pub fn network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }
}

fn fail(message: impl Into<String>) -> HubError {
    HubError::validation_failure(message)
}

fn check_len(name: &str, bytes: &[u8], expected: usize) -> HubResult<()> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(fail(format!("{name} must be {expected} bytes")))
    }
}

fn check_cast_id(cast_id: &CastId) -> HubResult<()> {
    check_len("cast id hash", &cast_id.hash, HASH_LENGTH)
}

fn check_body(body: &MessageBody) -> HubResult<()> {
    match body {
        MessageBody::CastAdd(cast) => {
            if cast.text.is_empty() {
                return Err(fail("text is missing"));
            }
            if cast.text.chars().count() > MAX_CAST_TEXT_CHARS {
                return Err(fail("text > 320 chars"));
            }
            if cast.embeds.len() > MAX_EMBEDS {
                return Err(fail("embeds > 2"));
            }
            if cast.mentions.len() > MAX_MENTIONS {
                return Err(fail("mentions > 5"));
            }
            cast.parent.as_ref().map_or(Ok(()), check_cast_id)
        }
        MessageBody::CastRemove { target_hash } => check_len("target hash", target_hash, HASH_LENGTH),
        MessageBody::Reaction { target, .. } => check_cast_id(target),
        MessageBody::Link { link_type, .. } => {
            if link_type.is_empty() || link_type.len() > MAX_LINK_TYPE_BYTES {
                return Err(fail("link type must be 1 to 8 bytes"));
            }
            Ok(())
        }
        MessageBody::VerificationAdd {
            address,
            block_hash,
            claim_signature,
        } => {
            check_len("address", address, ETH_ADDRESS_LENGTH)?;
            check_len("block hash", block_hash, BLOCK_HASH_LENGTH)?;
            if claim_signature.is_empty() {
                return Err(fail("claim signature is missing"));
            }
            Ok(())
        }
        MessageBody::VerificationRemove { address } => {
            check_len("address", address, ETH_ADDRESS_LENGTH)
        }
        MessageBody::Signer { signer, .. } => check_len("signer key", signer, ED25519_KEY_LENGTH),
        MessageBody::UserData { data_type, value } => {
            let max = match data_type {
                UserDataType::Pfp | UserDataType::Bio | UserDataType::Url => 256,
                UserDataType::Display | UserDataType::Username => 32,
            };
            if value.chars().count() > max {
                return Err(fail(format!("{data_type:?} value > {max}")));
            }
            Ok(())
        }
    }
}

impl MessageValidator for StructuralValidator {
    fn validate(&self, message: &Message) -> HubResult<()> {
        let data = &message.data;
        if !data.body.matches(data.message_type) {
            return Err(fail("body does not match message type"));
        }

        check_len("hash", &message.hash, HASH_LENGTH)?;
        if message.raw != data.encode()? {
            return Err(fail("raw bytes do not match message data"));
        }
        if message.hash != compute_hash(&message.raw) {
            return Err(fail("invalid hash"));
        }

        if message.signature.is_empty() {
            return Err(fail("signature is missing"));
        }
        if message.signer.is_empty() {
            return Err(fail("signer is missing"));
        }

        if let Some(network) = self.network {
            if data.network != network {
                return Err(fail("incorrect network"));
            }
        }

        let now = farcaster_time()?;
        if data.timestamp > now.saturating_add(ALLOWED_CLOCK_SKEW_SECONDS) {
            return Err(fail("timestamp more than 10 mins in the future"));
        }

        check_body(&data.body)
    }
}
