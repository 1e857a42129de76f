//! Error types for the sync engine.

use fchub_core::HubError;
use fchub_trie::TrieError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The peer could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The peer answered with data that makes no sense.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A local hub operation failed.
    #[error("hub error: {0}")]
    Hub(#[from] HubError),

    /// The local trie failed.
    #[error("trie error: {0}")]
    Trie(#[from] TrieError),

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// A peer call did not finish in time.
    #[error("peer call timed out")]
    Timeout,
}

impl SyncError {
    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Returns the dotted error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::Network(_) | SyncError::Timeout => "unavailable.network_failure",
            SyncError::Protocol(_) => "bad_request.validation_failure",
            SyncError::Hub(e) => e.code(),
            SyncError::Trie(_) => "unavailable.storage_failure",
            SyncError::Cancelled => "unavailable",
        }
    }

    /// Returns true if a later sync attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network(_) | SyncError::Timeout => true,
            SyncError::Hub(e) => e.is_retryable(),
            SyncError::Protocol(_) | SyncError::Trie(_) | SyncError::Cancelled => false,
        }
    }
}

impl From<SyncError> for HubError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::Hub(e) => e,
            SyncError::Trie(e) => e.into(),
            SyncError::Network(message) => HubError::network_failure(message),
            SyncError::Timeout => HubError::network_failure("peer call timed out"),
            SyncError::Protocol(message) => HubError::validation_failure(message),
            SyncError::Cancelled => HubError::storage_failure("sync cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::network("connection reset").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::Hub(HubError::storage_failure("busy")).is_retryable());
        assert!(!SyncError::Hub(HubError::conflict("older")).is_retryable());
        assert!(!SyncError::protocol("bad id").is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
    }

    #[test]
    fn codes_follow_hub_taxonomy() {
        assert_eq!(SyncError::Timeout.code(), "unavailable.network_failure");
        assert_eq!(
            SyncError::Hub(HubError::not_found("x")).code(),
            "not_found"
        );
        let hub: HubError = SyncError::network("down").into();
        assert_eq!(hub.code(), "unavailable.network_failure");
    }
}
