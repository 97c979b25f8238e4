//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`PluginHost`](crate::lifecycle::PluginHost).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginHostConfig {
    /// Directory watched for plugin artifacts. Created on `start` if
    /// missing. Subdirectories are not scanned.
    pub directory: PathBuf,

    /// Replace a loaded plugin in place when its artifact changes. When
    /// disabled, a changed artifact is unloaded and loaded fresh with no
    /// grace period.
    pub enable_hot_swap: bool,

    /// How long a hot-swapped instance stays alive for in-flight
    /// requests before it is disposed. Requests longer than this are
    /// outside the safe-swap contract.
    pub grace_period_secs: u64,

    /// Filesystem event coalescing window per artifact.
    pub debounce_ms: u64,

    /// Readiness probe attempts before a load is abandoned. Covers
    /// transient write locks while an artifact is still being copied.
    pub load_retry_attempts: u32,

    /// Delay between readiness probe attempts.
    pub load_retry_delay_ms: u64,
}

impl Default for PluginHostConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("plugins"),
            enable_hot_swap: true,
            grace_period_secs: 30,
            debounce_ms: 225,
            load_retry_attempts: 5,
            load_retry_delay_ms: 100,
        }
    }
}

impl PluginHostConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.directory.as_os_str().is_empty() {
            return Err("plugin directory must not be empty".to_string());
        }

        if self.debounce_ms == 0 {
            return Err("debounce window must be greater than 0".to_string());
        }

        if self.load_retry_attempts == 0 {
            return Err("at least one load attempt is required".to_string());
        }

        Ok(())
    }

    /// Grace period as a [`Duration`].
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Debounce window as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Readiness probe spacing as a [`Duration`].
    pub fn load_retry_delay(&self) -> Duration {
        Duration::from_millis(self.load_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PluginHostConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grace_period(), Duration::from_secs(30));
        assert!(config.enable_hot_swap);
    }

    #[test]
    fn zero_debounce_is_rejected() {
        let config = PluginHostConfig {
            debounce_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_attempts_are_rejected() {
        let config = PluginHostConfig {
            load_retry_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
