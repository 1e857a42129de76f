//! Error types for the hub core.
//!
//! Every error carries a dotted code (`bad_request.conflict`,
//! `unavailable.storage_failure`, ...) so RPC and gossip handlers can map
//! failures to responses without matching on variants.

use fchub_storage::StorageError;
use thiserror::Error;

/// Result type for hub operations.
pub type HubResult<T> = Result<T, HubError>;

/// Errors that can occur in hub core operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// The message failed schema, hash, signature or network checks.
    #[error("bad_request.validation_failure: {message}")]
    ValidationFailure {
        /// Description of the failure.
        message: String,
    },

    /// The exact message has already been merged.
    #[error("bad_request.duplicate: {message}")]
    Duplicate {
        /// Description of the duplicate.
        message: String,
    },

    /// The message loses the last-write-wins ordering against a stored message.
    #[error("bad_request.conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// The message would be evicted by the account's storage quota immediately.
    #[error("bad_request.prunable: {message}")]
    Prunable {
        /// Description of why the message is prunable.
        message: String,
    },

    /// A parameter (message type, family, key layout) is not acceptable here.
    #[error("bad_request.invalid_param: {message}")]
    InvalidParam {
        /// Description of the invalid parameter.
        message: String,
    },

    /// The requested record does not exist.
    #[error("not_found: {message}")]
    NotFound {
        /// Description of what was missing.
        message: String,
    },

    /// A keyed-store or commit pipeline failure.
    #[error("unavailable.storage_failure: {message}")]
    StorageFailure {
        /// Description of the failure.
        message: String,
    },

    /// The keyed store rejected an operation.
    #[error("unavailable.storage_failure: {0}")]
    Storage(#[from] StorageError),

    /// A peer could not be reached.
    #[error("unavailable.network_failure: {message}")]
    NetworkFailure {
        /// Description of the failure.
        message: String,
    },
}

impl HubError {
    /// Creates a validation failure error.
    pub fn validation_failure(message: impl Into<String>) -> Self {
        Self::ValidationFailure {
            message: message.into(),
        }
    }

    /// Creates a duplicate error.
    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::Duplicate {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a prunable error.
    pub fn prunable(message: impl Into<String>) -> Self {
        Self::Prunable {
            message: message.into(),
        }
    }

    /// Creates an invalid parameter error.
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidParam {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a storage failure error.
    pub fn storage_failure(message: impl Into<String>) -> Self {
        Self::StorageFailure {
            message: message.into(),
        }
    }

    /// Creates a network failure error.
    pub fn network_failure(message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            message: message.into(),
        }
    }

    /// Returns the dotted error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailure { .. } => "bad_request.validation_failure",
            Self::Duplicate { .. } => "bad_request.duplicate",
            Self::Conflict { .. } => "bad_request.conflict",
            Self::Prunable { .. } => "bad_request.prunable",
            Self::InvalidParam { .. } => "bad_request.invalid_param",
            Self::NotFound { .. } => "not_found",
            Self::StorageFailure { .. } | Self::Storage(_) => "unavailable.storage_failure",
            Self::NetworkFailure { .. } => "unavailable.network_failure",
        }
    }

    /// Returns true for errors caused by the request itself.
    #[must_use]
    pub fn is_bad_request(&self) -> bool {
        self.code().starts_with("bad_request")
    }

    /// Returns true if retrying later could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.code().starts_with("unavailable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_taxonomy() {
        assert_eq!(HubError::duplicate("x").code(), "bad_request.duplicate");
        assert_eq!(HubError::not_found("x").code(), "not_found");
        assert_eq!(
            HubError::from(StorageError::Closed).code(),
            "unavailable.storage_failure"
        );
    }

    #[test]
    fn display_includes_code() {
        let err = HubError::conflict("message conflicts with a more recent add");
        assert_eq!(
            err.to_string(),
            "bad_request.conflict: message conflicts with a more recent add"
        );
    }

    #[test]
    fn retryable_only_for_unavailable() {
        assert!(HubError::storage_failure("merge timed out").is_retryable());
        assert!(HubError::network_failure("peer gone").is_retryable());
        assert!(!HubError::prunable("old").is_retryable());
        assert!(HubError::prunable("old").is_bad_request());
    }
}
