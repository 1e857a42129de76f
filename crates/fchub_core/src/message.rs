//! Message model.
//!
//! A [`Message`] is an immutable, signed record authored by an account. Its
//! `raw` bytes are the CBOR encoding of [`MessageData`] and its `hash` is the
//! truncated blake3 digest of those bytes, so two messages with equal
//! `(fid, type, hash)` are the same logical message.

use crate::error::{HubError, HubResult};
use crate::types::{farcaster_time, Fid, TsHash, HASH_LENGTH};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// New cast.
    CastAdd,
    /// Removes a cast by hash.
    CastRemove,
    /// Like or recast of a cast.
    ReactionAdd,
    /// Undoes a reaction.
    ReactionRemove,
    /// Follow-style link to another account.
    LinkAdd,
    /// Undoes a link.
    LinkRemove,
    /// Proof of ownership of an Ethereum address.
    VerificationAddEthAddress,
    /// Removes a verification.
    VerificationRemove,
    /// Authorizes a signer key.
    SignerAdd,
    /// Deauthorizes a signer key.
    SignerRemove,
    /// Sets a profile field.
    UserDataAdd,
}

impl MessageType {
    /// Every message type, in tag order.
    pub const ALL: [MessageType; 11] = [
        MessageType::CastAdd,
        MessageType::CastRemove,
        MessageType::ReactionAdd,
        MessageType::ReactionRemove,
        MessageType::LinkAdd,
        MessageType::LinkRemove,
        MessageType::VerificationAddEthAddress,
        MessageType::VerificationRemove,
        MessageType::SignerAdd,
        MessageType::SignerRemove,
        MessageType::UserDataAdd,
    ];

    /// Numeric wire tag.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            MessageType::CastAdd => 1,
            MessageType::CastRemove => 2,
            MessageType::ReactionAdd => 3,
            MessageType::ReactionRemove => 4,
            MessageType::LinkAdd => 5,
            MessageType::LinkRemove => 6,
            MessageType::VerificationAddEthAddress => 7,
            MessageType::VerificationRemove => 8,
            MessageType::SignerAdd => 9,
            MessageType::SignerRemove => 10,
            MessageType::UserDataAdd => 11,
        }
    }

    /// Parses a numeric wire tag.
    #[must_use]
    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_u8() == tag)
    }

    /// The store family responsible for this type.
    #[must_use]
    pub const fn family(self) -> MessageFamily {
        match self {
            MessageType::CastAdd | MessageType::CastRemove => MessageFamily::Cast,
            MessageType::ReactionAdd | MessageType::ReactionRemove => MessageFamily::Reaction,
            MessageType::LinkAdd | MessageType::LinkRemove => MessageFamily::Link,
            MessageType::VerificationAddEthAddress | MessageType::VerificationRemove => {
                MessageFamily::Verification
            }
            MessageType::SignerAdd | MessageType::SignerRemove => MessageFamily::Signer,
            MessageType::UserDataAdd => MessageFamily::UserData,
        }
    }

    /// Returns true for remove variants.
    #[must_use]
    pub const fn is_remove(self) -> bool {
        matches!(
            self,
            MessageType::CastRemove
                | MessageType::ReactionRemove
                | MessageType::LinkRemove
                | MessageType::VerificationRemove
                | MessageType::SignerRemove
        )
    }
}

/// Message families, one store each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessageFamily {
    /// Casts and cast removes.
    Cast,
    /// Links.
    Link,
    /// Reactions.
    Reaction,
    /// Address verifications.
    Verification,
    /// Signer grants.
    Signer,
    /// Profile data.
    UserData,
}

impl MessageFamily {
    /// Every family.
    pub const ALL: [MessageFamily; 6] = [
        MessageFamily::Cast,
        MessageFamily::Link,
        MessageFamily::Reaction,
        MessageFamily::Verification,
        MessageFamily::Signer,
        MessageFamily::UserData,
    ];

    /// Key postfix of the family's primary message records.
    #[must_use]
    pub const fn postfix(self) -> u8 {
        match self {
            MessageFamily::Cast => 1,
            MessageFamily::Link => 2,
            MessageFamily::Reaction => 3,
            MessageFamily::Verification => 4,
            MessageFamily::Signer => 5,
            MessageFamily::UserData => 6,
        }
    }

    /// Parses a primary record postfix.
    ///
    /// # Errors
    ///
    /// Returns `bad_request.invalid_param` for postfixes that name no family.
    pub fn from_postfix(postfix: u8) -> HubResult<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.postfix() == postfix)
            .ok_or_else(|| HubError::invalid_param(format!("unknown store postfix {postfix}")))
    }

    /// Key postfix of the adds-set index.
    #[must_use]
    pub const fn adds_postfix(self) -> u8 {
        match self {
            MessageFamily::Cast => 64,
            MessageFamily::Link => 66,
            MessageFamily::Reaction => 68,
            MessageFamily::Verification => 70,
            MessageFamily::Signer => 72,
            MessageFamily::UserData => 74,
        }
    }

    /// Key postfix of the removes-set index, if the family has removes.
    #[must_use]
    pub const fn removes_postfix(self) -> Option<u8> {
        match self {
            MessageFamily::Cast => Some(65),
            MessageFamily::Link => Some(67),
            MessageFamily::Reaction => Some(69),
            MessageFamily::Verification => Some(71),
            MessageFamily::Signer => Some(73),
            MessageFamily::UserData => None,
        }
    }

    /// Short lowercase name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            MessageFamily::Cast => "cast",
            MessageFamily::Link => "link",
            MessageFamily::Reaction => "reaction",
            MessageFamily::Verification => "verification",
            MessageFamily::Signer => "signer",
            MessageFamily::UserData => "user_data",
        }
    }
}

impl fmt::Display for MessageFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Network a message was authored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    /// Production network.
    Mainnet,
    /// Public test network.
    Testnet,
    /// Local development network.
    Devnet,
}

/// Hash algorithm used for `Message::hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashScheme {
    /// blake3 truncated to 20 bytes.
    Blake3,
}

/// Signature algorithm used for `Message::signature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureScheme {
    /// Ed25519 signer keys.
    Ed25519,
    /// EIP-712 signatures from a custody address.
    Eip712,
}

/// Reference to a cast by author and hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CastId {
    /// Author of the cast.
    pub fid: Fid,
    /// Hash of the cast.
    pub hash: Vec<u8>,
}

/// Reaction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReactionType {
    /// Like.
    Like,
    /// Recast.
    Recast,
}

impl ReactionType {
    /// Numeric tag used in index keys.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            ReactionType::Like => 1,
            ReactionType::Recast => 2,
        }
    }
}

/// Profile fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserDataType {
    /// Profile picture URL.
    Pfp,
    /// Display name.
    Display,
    /// Bio.
    Bio,
    /// Homepage URL.
    Url,
    /// Username.
    Username,
}

impl UserDataType {
    /// Numeric tag used in index keys.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            UserDataType::Pfp => 1,
            UserDataType::Display => 2,
            UserDataType::Bio => 3,
            UserDataType::Url => 5,
            UserDataType::Username => 6,
        }
    }
}

/// Body of a cast add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastAddBody {
    /// Text content.
    pub text: String,
    /// Mentioned accounts.
    pub mentions: Vec<Fid>,
    /// Cast being replied to.
    pub parent: Option<CastId>,
    /// Embedded URLs.
    pub embeds: Vec<String>,
}

/// Family-specific message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    /// Payload of `CastAdd`.
    CastAdd(CastAddBody),
    /// Payload of `CastRemove`.
    CastRemove {
        /// Hash of the removed cast.
        target_hash: Vec<u8>,
    },
    /// Payload of `ReactionAdd` and `ReactionRemove`.
    Reaction {
        /// Kind of reaction.
        reaction_type: ReactionType,
        /// Cast reacted to.
        target: CastId,
    },
    /// Payload of `LinkAdd` and `LinkRemove`.
    Link {
        /// Link kind, e.g. `follow`.
        link_type: String,
        /// Linked account.
        target_fid: Fid,
    },
    /// Payload of `VerificationAddEthAddress`.
    VerificationAdd {
        /// Verified address.
        address: Vec<u8>,
        /// Signature of the address owner over the claim.
        claim_signature: Vec<u8>,
        /// Block hash the claim refers to.
        block_hash: Vec<u8>,
    },
    /// Payload of `VerificationRemove`.
    VerificationRemove {
        /// Address whose verification is removed.
        address: Vec<u8>,
    },
    /// Payload of `SignerAdd` and `SignerRemove`.
    Signer {
        /// Signer public key.
        signer: Vec<u8>,
        /// Optional human-readable name.
        name: Option<String>,
    },
    /// Payload of `UserDataAdd`.
    UserData {
        /// Profile field.
        data_type: UserDataType,
        /// Field value.
        value: String,
    },
}

impl MessageBody {
    /// Returns true if this body is the payload shape for `message_type`.
    #[must_use]
    pub fn matches(&self, message_type: MessageType) -> bool {
        matches!(
            (self, message_type),
            (MessageBody::CastAdd(_), MessageType::CastAdd)
                | (MessageBody::CastRemove { .. }, MessageType::CastRemove)
                | (
                    MessageBody::Reaction { .. },
                    MessageType::ReactionAdd | MessageType::ReactionRemove
                )
                | (MessageBody::Link { .. }, MessageType::LinkAdd | MessageType::LinkRemove)
                | (
                    MessageBody::VerificationAdd { .. },
                    MessageType::VerificationAddEthAddress
                )
                | (
                    MessageBody::VerificationRemove { .. },
                    MessageType::VerificationRemove
                )
                | (
                    MessageBody::Signer { .. },
                    MessageType::SignerAdd | MessageType::SignerRemove
                )
                | (MessageBody::UserData { .. }, MessageType::UserDataAdd)
        )
    }
}

/// The signed portion of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageData {
    /// Type tag.
    pub message_type: MessageType,
    /// Author.
    pub fid: Fid,
    /// Protocol timestamp (seconds since the protocol epoch).
    pub timestamp: u32,
    /// Target network.
    pub network: Network,
    /// Family-specific payload.
    pub body: MessageBody,
}

impl MessageData {
    /// Canonical encoding hashed into `Message::hash`.
    ///
    /// # Errors
    ///
    /// Returns `unavailable.storage_failure` if encoding fails.
    pub fn encode(&self) -> HubResult<Vec<u8>> {
        let mut raw = Vec::new();
        ciborium::into_writer(self, &mut raw)
            .map_err(|e| HubError::storage_failure(format!("failed to encode message data: {e}")))?;
        Ok(raw)
    }
}

/// A signed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Signed fields.
    pub data: MessageData,
    /// Content hash of `raw`.
    pub hash: Vec<u8>,
    /// Algorithm of `hash`.
    pub hash_scheme: HashScheme,
    /// Signature over `hash`.
    pub signature: Vec<u8>,
    /// Algorithm of `signature`.
    pub signature_scheme: SignatureScheme,
    /// Public key of the signer.
    pub signer: Vec<u8>,
    /// Encoded `data` as received, kept for re-serialization.
    pub raw: Vec<u8>,
}

impl Message {
    /// Author.
    #[must_use]
    pub fn fid(&self) -> Fid {
        self.data.fid
    }

    /// Type tag.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.data.message_type
    }

    /// Protocol timestamp.
    #[must_use]
    pub fn timestamp(&self) -> u32 {
        self.data.timestamp
    }

    /// Store family this message belongs to.
    #[must_use]
    pub fn family(&self) -> MessageFamily {
        self.data.message_type.family()
    }

    /// Ordering key for last-write-wins.
    ///
    /// # Errors
    ///
    /// Returns `bad_request.invalid_param` if the hash has the wrong length.
    pub fn ts_hash(&self) -> HubResult<TsHash> {
        TsHash::new(self.data.timestamp, &self.hash)
    }

    /// Encodes the full message for storage or transport.
    ///
    /// # Errors
    ///
    /// Returns `unavailable.storage_failure` if encoding fails.
    pub fn encode(&self) -> HubResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| HubError::storage_failure(format!("failed to encode message: {e}")))?;
        Ok(bytes)
    }

    /// Decodes a message produced by [`Message::encode`].
    ///
    /// # Errors
    ///
    /// Returns `unavailable.storage_failure` if the bytes are not a message.
    pub fn decode(bytes: &[u8]) -> HubResult<Self> {
        ciborium::from_reader(bytes)
            .map_err(|e| HubError::storage_failure(format!("failed to decode message: {e}")))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}({}, {}, {})",
            self.data.message_type,
            self.data.fid,
            self.data.timestamp,
            hex::encode(&self.hash)
        )
    }
}

/// Computes the 20-byte content hash of encoded message data.
#[must_use]
pub fn compute_hash(raw: &[u8]) -> Vec<u8> {
    blake3::hash(raw).as_bytes()[..HASH_LENGTH].to_vec()
}

/// Deterministic stand-in signer key for an account.
#[must_use]
pub fn default_signer(fid: Fid) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"signer");
    hasher.update(&fid.to_be_bytes());
    hasher.finalize().as_bytes().to_vec()
}

/// Builds well-formed messages.
///
/// The builder encodes [`MessageData`], hashes it and fills a signature
/// digest. Producing real Ed25519 signatures is the caller's concern; the
/// overrides exist to construct conflicting or invalid messages directly.
///
/// # Example
///
/// ```rust
/// use fchub_core::{Fid, MessageBuilder, UserDataType};
///
/// let message = MessageBuilder::user_data_add(Fid::new(1), UserDataType::Bio, "hello")
///     .timestamp(100)
///     .build()
///     .unwrap();
/// assert_eq!(message.hash.len(), 20);
/// ```
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    message_type: MessageType,
    fid: Fid,
    body: MessageBody,
    timestamp: Option<u32>,
    network: Network,
    signer: Option<Vec<u8>>,
    hash: Option<Vec<u8>>,
    signature: Option<Vec<u8>>,
}

impl MessageBuilder {
    /// Starts a message of any type.
    #[must_use]
    pub fn new(message_type: MessageType, fid: Fid, body: MessageBody) -> Self {
        Self {
            message_type,
            fid,
            body,
            timestamp: None,
            network: Network::Devnet,
            signer: None,
            hash: None,
            signature: None,
        }
    }

    /// Starts a `CastAdd`.
    #[must_use]
    pub fn cast_add(fid: Fid, text: impl Into<String>) -> Self {
        Self::new(
            MessageType::CastAdd,
            fid,
            MessageBody::CastAdd(CastAddBody {
                text: text.into(),
                mentions: Vec::new(),
                parent: None,
                embeds: Vec::new(),
            }),
        )
    }

    /// Starts a `CastRemove`.
    #[must_use]
    pub fn cast_remove(fid: Fid, target_hash: &[u8]) -> Self {
        Self::new(
            MessageType::CastRemove,
            fid,
            MessageBody::CastRemove {
                target_hash: target_hash.to_vec(),
            },
        )
    }

    /// Starts a `ReactionAdd`.
    #[must_use]
    pub fn reaction_add(fid: Fid, reaction_type: ReactionType, target: CastId) -> Self {
        Self::new(
            MessageType::ReactionAdd,
            fid,
            MessageBody::Reaction {
                reaction_type,
                target,
            },
        )
    }

    /// Starts a `ReactionRemove`.
    #[must_use]
    pub fn reaction_remove(fid: Fid, reaction_type: ReactionType, target: CastId) -> Self {
        Self::new(
            MessageType::ReactionRemove,
            fid,
            MessageBody::Reaction {
                reaction_type,
                target,
            },
        )
    }

    /// Starts a `LinkAdd`.
    #[must_use]
    pub fn link_add(fid: Fid, link_type: impl Into<String>, target_fid: Fid) -> Self {
        Self::new(
            MessageType::LinkAdd,
            fid,
            MessageBody::Link {
                link_type: link_type.into(),
                target_fid,
            },
        )
    }

    /// Starts a `LinkRemove`.
    #[must_use]
    pub fn link_remove(fid: Fid, link_type: impl Into<String>, target_fid: Fid) -> Self {
        Self::new(
            MessageType::LinkRemove,
            fid,
            MessageBody::Link {
                link_type: link_type.into(),
                target_fid,
            },
        )
    }

    /// Starts a `VerificationAddEthAddress`.
    #[must_use]
    pub fn verification_add(fid: Fid, address: &[u8]) -> Self {
        Self::new(
            MessageType::VerificationAddEthAddress,
            fid,
            MessageBody::VerificationAdd {
                address: address.to_vec(),
                claim_signature: vec![0u8; 65],
                block_hash: vec![0u8; 32],
            },
        )
    }

    /// Starts a `VerificationRemove`.
    #[must_use]
    pub fn verification_remove(fid: Fid, address: &[u8]) -> Self {
        Self::new(
            MessageType::VerificationRemove,
            fid,
            MessageBody::VerificationRemove {
                address: address.to_vec(),
            },
        )
    }

    /// Starts a `SignerAdd`.
    #[must_use]
    pub fn signer_add(fid: Fid, signer_key: &[u8]) -> Self {
        Self::new(
            MessageType::SignerAdd,
            fid,
            MessageBody::Signer {
                signer: signer_key.to_vec(),
                name: None,
            },
        )
    }

    /// Starts a `SignerRemove`.
    #[must_use]
    pub fn signer_remove(fid: Fid, signer_key: &[u8]) -> Self {
        Self::new(
            MessageType::SignerRemove,
            fid,
            MessageBody::Signer {
                signer: signer_key.to_vec(),
                name: None,
            },
        )
    }

    /// Starts a `UserDataAdd`.
    #[must_use]
    pub fn user_data_add(fid: Fid, data_type: UserDataType, value: impl Into<String>) -> Self {
        Self::new(
            MessageType::UserDataAdd,
            fid,
            MessageBody::UserData {
                data_type,
                value: value.into(),
            },
        )
    }

    /// Sets the protocol timestamp. Defaults to the current protocol time.
    #[must_use]
    pub fn timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the network. Defaults to [`Network::Devnet`].
    #[must_use]
    pub fn network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Sets the signer key. Defaults to [`default_signer`] of the author.
    #[must_use]
    pub fn signer(mut self, signer: &[u8]) -> Self {
        self.signer = Some(signer.to_vec());
        self
    }

    /// Forces the hash instead of computing it from the encoded data.
    #[must_use]
    pub fn hash(mut self, hash: &[u8]) -> Self {
        self.hash = Some(hash.to_vec());
        self
    }

    /// Forces the signature bytes.
    #[must_use]
    pub fn signature(mut self, signature: &[u8]) -> Self {
        self.signature = Some(signature.to_vec());
        self
    }

    /// Forces the type tag without changing the body.
    #[must_use]
    pub fn message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    /// Encodes, hashes and assembles the message.
    ///
    /// # Errors
    ///
    /// Returns an error if no timestamp was set and the clock is unusable, or
    /// if encoding fails.
    pub fn build(self) -> HubResult<Message> {
        let timestamp = match self.timestamp {
            Some(timestamp) => timestamp,
            None => farcaster_time()?,
        };
        let data = MessageData {
            message_type: self.message_type,
            fid: self.fid,
            timestamp,
            network: self.network,
            body: self.body,
        };
        let raw = data.encode()?;
        let hash = self.hash.unwrap_or_else(|| compute_hash(&raw));
        let signer = self.signer.unwrap_or_else(|| default_signer(self.fid));
        let signature = self.signature.unwrap_or_else(|| {
            let mut hasher = blake3::Hasher::new();
            hasher.update(&signer);
            hasher.update(&hash);
            hasher.finalize().as_bytes().to_vec()
        });

        Ok(Message {
            data,
            hash,
            hash_scheme: HashScheme::Blake3,
            signature,
            signature_scheme: SignatureScheme::Ed25519,
            signer,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_tags_round_trip() {
        for message_type in MessageType::ALL {
            assert_eq!(MessageType::from_u8(message_type.as_u8()), Some(message_type));
        }
        assert_eq!(MessageType::from_u8(0), None);
        assert_eq!(MessageType::from_u8(12), None);
    }

    #[test]
    fn families_have_distinct_postfixes() {
        let mut postfixes: Vec<u8> = MessageFamily::ALL.iter().map(|f| f.postfix()).collect();
        postfixes.extend(MessageFamily::ALL.iter().map(|f| f.adds_postfix()));
        postfixes.extend(MessageFamily::ALL.iter().filter_map(|f| f.removes_postfix()));
        let count = postfixes.len();
        postfixes.sort_unstable();
        postfixes.dedup();
        assert_eq!(postfixes.len(), count);
        assert!(MessageFamily::from_postfix(64).is_err());
    }

    #[test]
    fn builder_hash_is_content_hash() {
        let a = MessageBuilder::cast_add(Fid::new(1), "gm").timestamp(10).build().unwrap();
        let b = MessageBuilder::cast_add(Fid::new(1), "gm").timestamp(10).build().unwrap();
        let c = MessageBuilder::cast_add(Fid::new(1), "gn").timestamp(10).build().unwrap();

        assert_eq!(a.hash, compute_hash(&a.raw));
        assert_eq!(a.hash, b.hash);
        assert_ne!(a.hash, c.hash);
        assert_eq!(a.family(), MessageFamily::Cast);
    }

    #[test]
    fn builder_overrides() {
        let message = MessageBuilder::link_add(Fid::new(3), "follow", Fid::new(4))
            .timestamp(5)
            .hash(&[0x02; HASH_LENGTH])
            .message_type(MessageType::CastAdd)
            .build()
            .unwrap();
        assert_eq!(message.hash, vec![0x02; HASH_LENGTH]);
        assert_eq!(message.message_type(), MessageType::CastAdd);
        assert!(!message.data.body.matches(message.message_type()));
    }

    #[test]
    fn encode_decode_preserves_message() {
        let message = MessageBuilder::signer_add(Fid::new(9), &[7u8; 32])
            .timestamp(77)
            .build()
            .unwrap();
        let decoded = Message::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
        assert!(Message::decode(&[0xff]).is_err());
    }
}
