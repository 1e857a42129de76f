//! Error types for the sync trie.

use fchub_core::HubError;
use fchub_storage::StorageError;
use thiserror::Error;

/// Result type for trie operations.
pub type TrieResult<T> = Result<T, TrieError>;

/// Errors that can occur in trie operations.
#[derive(Debug, Error)]
pub enum TrieError {
    /// The keyed store failed.
    #[error("trie storage error: {0}")]
    Storage(#[from] StorageError),

    /// A persisted node could not be encoded or decoded.
    #[error("trie node codec error: {0}")]
    Codec(String),

    /// A key ran out of bytes before reaching a leaf.
    #[error("key length exceeded at index {index} of a {len}-byte key")]
    KeyLengthExceeded {
        /// Depth that was reached.
        index: usize,
        /// Length of the key.
        len: usize,
    },

    /// A child listed by its parent has no persisted record.
    #[error("missing trie node at prefix {0}")]
    MissingNode(String),

    /// The trie actor thread is gone.
    #[error("trie actor stopped")]
    ActorStopped,

    /// The trie actor thread could not be started.
    #[error("failed to spawn trie actor: {0}")]
    Spawn(String),
}

impl TrieError {
    /// Creates a missing node error for `prefix`.
    pub fn missing_node(prefix: &[u8]) -> Self {
        Self::MissingNode(hex::encode(prefix))
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }
}

impl From<TrieError> for HubError {
    fn from(error: TrieError) -> Self {
        match error {
            TrieError::Storage(e) => HubError::Storage(e),
            other => HubError::storage_failure(other.to_string()),
        }
    }
}
