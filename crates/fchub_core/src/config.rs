//! Hub configuration.
//!
//! [`StoreLimits`] holds the per-account quota of each message family and
//! [`HubConfig`] the sizing and timing of the commit pipeline.

use crate::message::MessageFamily;
use std::time::Duration;

const DAY_SECS: u32 = 24 * 60 * 60;

/// Quota of one family for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PruneLimits {
    /// Maximum number of messages kept (None = unlimited).
    pub size_limit: Option<u64>,
    /// Maximum age in protocol seconds (None = unlimited).
    pub time_limit: Option<u32>,
}

impl PruneLimits {
    /// Limits with neither a size nor a time bound.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            size_limit: None,
            time_limit: None,
        }
    }

    /// Sets the size limit.
    #[must_use]
    pub const fn size_limit(mut self, limit: u64) -> Self {
        self.size_limit = Some(limit);
        self
    }

    /// Sets the time limit in protocol seconds.
    #[must_use]
    pub const fn time_limit(mut self, secs: u32) -> Self {
        self.time_limit = Some(secs);
        self
    }
}

/// Source of per-family quotas.
///
/// Quotas come from configuration today; a deployment that derives them
/// from on-chain storage rent implements this trait instead.
pub trait StorageQuota: Send + Sync {
    /// Limits for `family`.
    fn limits(&self, family: MessageFamily) -> PruneLimits;
}

/// Static per-family quotas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLimits {
    /// Casts.
    pub cast: PruneLimits,
    /// Reactions.
    pub reaction: PruneLimits,
    /// Links.
    pub link: PruneLimits,
    /// Verifications.
    pub verification: PruneLimits,
    /// Profile data.
    pub user_data: PruneLimits,
    /// Signer grants.
    pub signer: PruneLimits,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            cast: PruneLimits::unlimited()
                .size_limit(10_000)
                .time_limit(365 * DAY_SECS),
            reaction: PruneLimits::unlimited()
                .size_limit(5_000)
                .time_limit(90 * DAY_SECS),
            link: PruneLimits::unlimited().size_limit(2_500),
            verification: PruneLimits::unlimited().size_limit(50),
            user_data: PruneLimits::unlimited().size_limit(100),
            signer: PruneLimits::unlimited().size_limit(100),
        }
    }
}

impl StoreLimits {
    /// Limits with no bound on any family.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            cast: PruneLimits::unlimited(),
            reaction: PruneLimits::unlimited(),
            link: PruneLimits::unlimited(),
            verification: PruneLimits::unlimited(),
            user_data: PruneLimits::unlimited(),
            signer: PruneLimits::unlimited(),
        }
    }

    /// Replaces the limits of one family.
    #[must_use]
    pub fn with(mut self, family: MessageFamily, limits: PruneLimits) -> Self {
        match family {
            MessageFamily::Cast => self.cast = limits,
            MessageFamily::Reaction => self.reaction = limits,
            MessageFamily::Link => self.link = limits,
            MessageFamily::Verification => self.verification = limits,
            MessageFamily::UserData => self.user_data = limits,
            MessageFamily::Signer => self.signer = limits,
        }
        self
    }
}

impl StorageQuota for StoreLimits {
    fn limits(&self, family: MessageFamily) -> PruneLimits {
        match family {
            MessageFamily::Cast => self.cast,
            MessageFamily::Reaction => self.reaction,
            MessageFamily::Link => self.link,
            MessageFamily::Verification => self.verification,
            MessageFamily::UserData => self.user_data,
            MessageFamily::Signer => self.signer,
        }
    }
}

/// Configuration of the commit pipeline and message stores.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Pending commits the writer task buffers before callers wait.
    pub commit_queue_capacity: usize,
    /// Events a lagging subscriber may fall behind before it loses some.
    pub event_broadcast_capacity: usize,
    /// How long a merge waits for its account's merge lock.
    pub merge_timeout: Duration,
    /// Number of merge lock stripes shared by all accounts.
    pub merge_lock_stripes: usize,
    /// Per-family quotas.
    pub limits: StoreLimits,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            commit_queue_capacity: 1024,
            event_broadcast_capacity: 4096,
            merge_timeout: Duration::from_secs(10),
            merge_lock_stripes: 64,
            limits: StoreLimits::default(),
        }
    }
}

impl HubConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the commit queue capacity.
    #[must_use]
    pub const fn commit_queue_capacity(mut self, capacity: usize) -> Self {
        self.commit_queue_capacity = capacity;
        self
    }

    /// Sets the broadcast capacity.
    #[must_use]
    pub const fn event_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.event_broadcast_capacity = capacity;
        self
    }

    /// Sets the merge lock timeout.
    #[must_use]
    pub const fn merge_timeout(mut self, timeout: Duration) -> Self {
        self.merge_timeout = timeout;
        self
    }

    /// Sets the number of merge lock stripes.
    #[must_use]
    pub const fn merge_lock_stripes(mut self, stripes: usize) -> Self {
        self.merge_lock_stripes = stripes;
        self
    }

    /// Sets the per-family quotas.
    #[must_use]
    pub fn limits(mut self, limits: StoreLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let limits = StoreLimits::default();
        assert_eq!(limits.limits(MessageFamily::Cast).size_limit, Some(10_000));
        assert_eq!(
            limits.limits(MessageFamily::Reaction).time_limit,
            Some(90 * DAY_SECS)
        );
        assert_eq!(limits.limits(MessageFamily::Link).time_limit, None);
        assert_eq!(limits.limits(MessageFamily::Signer).size_limit, Some(100));
    }

    #[test]
    fn override_one_family() {
        let limits = StoreLimits::default()
            .with(MessageFamily::UserData, PruneLimits::unlimited().size_limit(2));
        assert_eq!(limits.limits(MessageFamily::UserData).size_limit, Some(2));
        assert_eq!(limits.limits(MessageFamily::Verification).size_limit, Some(50));
    }

    #[test]
    fn builder_pattern() {
        let config = HubConfig::new()
            .commit_queue_capacity(8)
            .merge_timeout(Duration::from_millis(50))
            .limits(StoreLimits::unlimited());

        assert_eq!(config.commit_queue_capacity, 8);
        assert_eq!(config.merge_timeout, Duration::from_millis(50));
        assert_eq!(config.limits.limits(MessageFamily::Cast), PruneLimits::unlimited());
        assert_eq!(config.merge_lock_stripes, 64);
    }
}
