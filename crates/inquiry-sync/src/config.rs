//! Sync timing configuration
//!
//! The settle delays stand in for a "rendering finished" signal. They are a
//! heuristic and can race on slow devices; hosts that can report completion
//! should call [`crate::SyncCoordinator::rendering_settled`] instead of
//! relying on them.

use crate::echo::RECENT_OPERATION_CAPACITY;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Coordinator timing and capacity settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minimum spacing between outgoing broadcasts
    pub broadcast_throttle_ms: u64,
    /// Quiet period before a drag-release/add/remove save fires
    pub save_debounce_ms: u64,
    /// Period of the unconditional save while hydrated
    pub autosave_interval_secs: u64,
    /// Lock hold after applying the hydrated snapshot
    pub hydration_settle_ms: u64,
    /// Lock hold after applying a remote state
    pub remote_settle_ms: u64,
    /// Recently-sent operation ids remembered for echo suppression
    pub recent_operation_capacity: usize,
}

impl SyncConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML; missing keys keep their defaults
    ///
    /// # Errors
    /// Returns error on malformed TOML or out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject values the coordinator cannot run with
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the offending key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broadcast_throttle_ms == 0 {
            return Err(ConfigError::Invalid(
                "broadcast_throttle_ms must be positive".to_string(),
            ));
        }
        if self.autosave_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "autosave_interval_secs must be positive".to_string(),
            ));
        }
        if self.recent_operation_capacity == 0 {
            return Err(ConfigError::Invalid(
                "recent_operation_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// With broadcast throttle window
    #[inline]
    #[must_use]
    pub fn with_broadcast_throttle(mut self, window: Duration) -> Self {
        self.broadcast_throttle_ms = millis(window);
        self
    }

    /// With save debounce
    #[inline]
    #[must_use]
    pub fn with_save_debounce(mut self, debounce: Duration) -> Self {
        self.save_debounce_ms = millis(debounce);
        self
    }

    /// With autosave period
    #[inline]
    #[must_use]
    pub fn with_autosave_interval(mut self, period: Duration) -> Self {
        self.autosave_interval_secs = period.as_secs().max(1);
        self
    }

    /// With both settle delays
    #[inline]
    #[must_use]
    pub fn with_settle_delays(mut self, hydration: Duration, remote: Duration) -> Self {
        self.hydration_settle_ms = millis(hydration);
        self.remote_settle_ms = millis(remote);
        self
    }

    /// Broadcast throttle window
    #[inline]
    #[must_use]
    pub fn broadcast_throttle(&self) -> Duration {
        Duration::from_millis(self.broadcast_throttle_ms)
    }

    /// Save debounce
    #[inline]
    #[must_use]
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    /// Autosave period
    #[inline]
    #[must_use]
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    /// Hydration settle delay
    #[inline]
    #[must_use]
    pub fn hydration_settle(&self) -> Duration {
        Duration::from_millis(self.hydration_settle_ms)
    }

    /// Remote-apply settle delay
    #[inline]
    #[must_use]
    pub fn remote_settle(&self) -> Duration {
        Duration::from_millis(self.remote_settle_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            broadcast_throttle_ms: 200,
            save_debounce_ms: 100,
            autosave_interval_secs: 10,
            hydration_settle_ms: 300,
            remote_settle_ms: 500,
            recent_operation_capacity: RECENT_OPERATION_CAPACITY,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::new();
        assert_eq!(config.broadcast_throttle(), Duration::from_millis(200));
        assert_eq!(config.save_debounce(), Duration::from_millis(100));
        assert_eq!(config.autosave_interval(), Duration::from_secs(10));
        assert_eq!(config.hydration_settle(), Duration::from_millis(300));
        assert_eq!(config.remote_settle(), Duration::from_millis(500));
        assert_eq!(config.recent_operation_capacity, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SyncConfig::from_toml_str("remote_settle_ms = 50\n").unwrap();
        assert_eq!(config.remote_settle_ms, 50);
        assert_eq!(config.broadcast_throttle_ms, 200);
    }

    #[test]
    fn zero_throttle_is_rejected() {
        let err = SyncConfig::from_toml_str("broadcast_throttle_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let err = SyncConfig::from_toml_str("save_debounce_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn builders() {
        let config = SyncConfig::new()
            .with_broadcast_throttle(Duration::from_millis(50))
            .with_save_debounce(Duration::from_millis(10))
            .with_autosave_interval(Duration::from_secs(3))
            .with_settle_delays(Duration::from_millis(1), Duration::from_millis(2));

        assert_eq!(config.broadcast_throttle_ms, 50);
        assert_eq!(config.save_debounce_ms, 10);
        assert_eq!(config.autosave_interval_secs, 3);
        assert_eq!(config.hydration_settle_ms, 1);
        assert_eq!(config.remote_settle_ms, 2);
    }

    #[test]
    fn load_missing_file_reports_path() {
        let err = SyncConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
