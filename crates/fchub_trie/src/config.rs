//! Trie configuration.

/// Configuration of a [`crate::MerkleTrie`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieConfig {
    /// Mutations after which pending node writes are flushed and the
    /// in-memory children of the root are dropped.
    pub unload_threshold: usize,
    /// Capacity of the actor command queue.
    pub command_queue_capacity: usize,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            unload_threshold: 10_000,
            command_queue_capacity: 256,
        }
    }
}

impl TrieConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the unload threshold.
    #[must_use]
    pub const fn unload_threshold(mut self, mutations: usize) -> Self {
        self.unload_threshold = mutations;
        self
    }

    /// Sets the command queue capacity.
    #[must_use]
    pub const fn command_queue_capacity(mut self, capacity: usize) -> Self {
        self.command_queue_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_pattern() {
        let config = TrieConfig::new().unload_threshold(3);
        assert_eq!(config.unload_threshold, 3);
        assert_eq!(config.command_queue_capacity, 256);
    }
}
