//! Sync service configuration.
//!
//! Provides configuration options for venue synchronization.

use serde::{Deserialize, Serialize};

/// Configuration for venue synchronization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Page size requested from venue feeds.
    pub page_size: usize,

    /// Maximum pages fetched in one sync run.
    pub max_page_depth: usize,

    /// Maximum pages walked by the active-order prober.
    pub probe_max_depth: usize,

    /// Initial lookback window in seconds for a fresh cursor.
    pub lookback_secs: u64,

    /// Poll interval between sync runs in milliseconds.
    pub poll_interval_ms: u64,

    /// Maximum retries for failed venue requests.
    pub max_retries: u32,

    /// Initial retry backoff in milliseconds.
    pub initial_backoff_ms: u64,

    /// Maximum retry backoff in milliseconds.
    pub max_backoff_ms: u64,

    /// Maximum concurrently running sync tasks.
    pub max_concurrent_syncs: usize,

    /// Venue request timeout in milliseconds.
    pub fetch_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_page_depth: 20,
            probe_max_depth: 10,
            lookback_secs: 3600,
            poll_interval_ms: 5000,
            max_retries: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 10_000,
            max_concurrent_syncs: 4,
            fetch_timeout_ms: 15_000,
        }
    }
}

impl SyncConfig {
    /// Sets the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the maximum page depth per run.
    #[must_use]
    pub fn with_max_page_depth(mut self, depth: usize) -> Self {
        self.max_page_depth = depth;
        self
    }

    /// Sets the prober page depth.
    #[must_use]
    pub fn with_probe_depth(mut self, depth: usize) -> Self {
        self.probe_max_depth = depth;
        self
    }

    /// Sets the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Sets the maximum retries.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidPageSize);
        }

        if self.max_page_depth == 0 || self.probe_max_depth == 0 {
            return Err(ConfigError::InvalidPageDepth);
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }

        if self.max_concurrent_syncs == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }

        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::InvalidBackoffRange);
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Page size must be positive.
    #[error("page size must be greater than zero")]
    InvalidPageSize,

    /// Page depth bounds must be positive.
    #[error("page depth must be greater than zero")]
    InvalidPageDepth,

    /// Poll interval must be positive.
    #[error("poll interval must be greater than zero")]
    InvalidPollInterval,

    /// At least one concurrent sync task is required.
    #[error("max concurrent syncs must be greater than zero")]
    InvalidConcurrency,

    /// Backoff range is inverted.
    #[error("initial backoff exceeds maximum backoff")]
    InvalidBackoffRange,
}
