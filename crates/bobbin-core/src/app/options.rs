//! StorageOptions - tunables supplied by the host.

use std::time::Duration;

use crate::adapter::RetryPolicy;
use crate::domain::{Result, StorageError};

/// Runtime configuration. There is no config file; hosts build this in code
/// (the CLI maps its flags onto it).
#[derive(Debug, Clone, PartialEq)]
pub struct StorageOptions {
    /// Delay between fetch polls.
    pub poll_interval: Duration,
    /// A claim older than this is treated as abandoned.
    pub claim_timeout: Duration,
    /// Servers silent for longer than this are reaped.
    pub server_timeout: Duration,
    /// Scroll page size and bulk chunk size. Must fit in one page of the
    /// backing store (`max_result_window` for `InMemoryDocumentStore`).
    pub batch_size: usize,
    pub scroll_keep_alive: Duration,
    pub reaper_interval: Duration,
    pub write_retry: RetryPolicy,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            claim_timeout: Duration::from_secs(30 * 60),
            server_timeout: Duration::from_secs(5 * 60),
            batch_size: 1000,
            scroll_keep_alive: Duration::from_secs(60),
            reaper_interval: Duration::from_secs(60),
            write_retry: RetryPolicy::conflicts(),
        }
    }
}

impl StorageOptions {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_claim_timeout(mut self, claim_timeout: Duration) -> Self {
        self.claim_timeout = claim_timeout;
        self
    }

    pub fn with_server_timeout(mut self, server_timeout: Duration) -> Self {
        self.server_timeout = server_timeout;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_scroll_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.scroll_keep_alive = keep_alive;
        self
    }

    pub fn with_reaper_interval(mut self, reaper_interval: Duration) -> Self {
        self.reaper_interval = reaper_interval;
        self
    }

    pub fn with_write_retry(mut self, write_retry: RetryPolicy) -> Self {
        self.write_retry = write_retry;
        self
    }

    /// Reject options the loops cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("poll_interval", self.poll_interval),
            ("claim_timeout", self.claim_timeout),
            ("server_timeout", self.server_timeout),
            ("scroll_keep_alive", self.scroll_keep_alive),
            ("reaper_interval", self.reaper_interval),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| value.is_zero()) {
            return Err(StorageError::invalid_argument(format!(
                "`{name}` must be greater than zero"
            )));
        }
        if self.batch_size == 0 {
            return Err(StorageError::invalid_argument("`batch_size` must be greater than zero"));
        }
        if self.write_retry.max_attempts == 0 {
            return Err(StorageError::invalid_argument(
                "`write_retry.max_attempts` must be at least 1",
            ));
        }
        if !(self.write_retry.multiplier.is_finite() && self.write_retry.multiplier >= 1.0) {
            return Err(StorageError::invalid_argument("`write_retry.multiplier` must be >= 1.0"));
        }
        chrono_duration("claim_timeout", self.claim_timeout)?;
        chrono_duration("server_timeout", self.server_timeout)?;
        Ok(())
    }
}

/// Convert a std duration for timestamp arithmetic.
pub(crate) fn chrono_duration(name: &str, value: Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(value)
        .map_err(|_| StorageError::invalid_argument(format!("`{name}` is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_are_valid() {
        let options = StorageOptions::default();

        assert!(options.validate().is_ok());
        assert_eq!(options.poll_interval, Duration::from_secs(5));
        assert_eq!(options.batch_size, 1000);
    }

    #[rstest]
    #[case::zero_poll(StorageOptions::default().with_poll_interval(Duration::ZERO))]
    #[case::zero_claim(StorageOptions::default().with_claim_timeout(Duration::ZERO))]
    #[case::zero_batch(StorageOptions::default().with_batch_size(0))]
    #[case::zero_server_timeout(StorageOptions::default().with_server_timeout(Duration::ZERO))]
    #[case::zero_keep_alive(StorageOptions::default().with_scroll_keep_alive(Duration::ZERO))]
    #[case::huge_claim(StorageOptions::default().with_claim_timeout(Duration::MAX))]
    #[case::no_attempts(StorageOptions::default().with_write_retry(RetryPolicy {
        max_attempts: 0,
        ..RetryPolicy::conflicts()
    }))]
    fn invalid_options_are_rejected(#[case] options: StorageOptions) {
        assert!(matches!(options.validate(), Err(StorageError::InvalidArgument(_))));
    }
}
