//! Party configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use party_match::domain::PartyConfig;
//! use std::time::Duration;
//!
//! let config = PartyConfig::default()
//!     .with_max_size(4)
//!     .with_invite_duration(Duration::from_secs(300));
//! config.validate()?;
//! ```

use crate::error::ConfigError;
use party_types::MAX_PARTY_CONFIG_BYTES;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ticks a freshly created party waits for its creator before giving up.
pub const DEFAULT_INITIAL_JOIN_TICKS: u32 = 60;

/// Party ticks per second.
pub const DEFAULT_TICK_RATE: u32 = 1;

/// Upper bound on the tick rate.
pub const MAX_TICK_RATE: u32 = 60;

/// Blocked users fetched per social graph page.
pub const DEFAULT_BLOCKED_PAGE_SIZE: usize = 100;

/// Pages fetched per user before the blocked list is considered complete.
pub const DEFAULT_BLOCKED_MAX_PAGES: usize = 10;

/// Per-deployment party settings, shared by every party of a runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyConfig {
    /// Maximum members per party. 0 means unbounded.
    pub max_size: usize,
    /// How long an invitation stays valid. Zero means it never expires.
    pub invite_duration: Duration,
    /// Ticks an unjoined party survives after creation.
    pub initial_join_ticks: u32,
    /// Ticks per second.
    pub tick_rate: u32,
    /// Maximum bytes of the opaque party configuration string.
    pub max_config_bytes: usize,
    pub blocked_page_size: usize,
    pub blocked_max_pages: usize,
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            max_size: 0,
            invite_duration: Duration::ZERO,
            initial_join_ticks: DEFAULT_INITIAL_JOIN_TICKS,
            tick_rate: DEFAULT_TICK_RATE,
            max_config_bytes: MAX_PARTY_CONFIG_BYTES,
            blocked_page_size: DEFAULT_BLOCKED_PAGE_SIZE,
            blocked_max_pages: DEFAULT_BLOCKED_MAX_PAGES,
        }
    }
}

impl PartyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 || self.tick_rate > MAX_TICK_RATE {
            return Err(ConfigError::InvalidTickRate {
                value: self.tick_rate,
                max: MAX_TICK_RATE,
            });
        }

        if self.initial_join_ticks == 0 {
            return Err(ConfigError::ZeroInitialJoinTicks);
        }

        if self.blocked_page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }

        if self.blocked_max_pages == 0 {
            return Err(ConfigError::ZeroPageLimit);
        }

        Ok(())
    }

    /// Interval between two ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.tick_rate.max(1)))
    }

    /// Whether invitations carry an expiry at all.
    pub fn invitations_expire(&self) -> bool {
        !self.invite_duration.is_zero()
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_invite_duration(mut self, duration: Duration) -> Self {
        self.invite_duration = duration;
        self
    }

    pub fn with_initial_join_ticks(mut self, ticks: u32) -> Self {
        self.initial_join_ticks = ticks;
        self
    }

    pub fn with_tick_rate(mut self, tick_rate: u32) -> Self {
        self.tick_rate = tick_rate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PartyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_size, 0);
        assert!(!config.invitations_expire());
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_rejects_zero_tick_rate() {
        let config = PartyConfig::default().with_tick_rate(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTickRate { value: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_excessive_tick_rate() {
        let config = PartyConfig::default().with_tick_rate(MAX_TICK_RATE + 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_join_window() {
        let config = PartyConfig::default().with_initial_join_ticks(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroInitialJoinTicks));
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let config = PartyConfig {
            blocked_page_size: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroPageSize));
    }

    #[test]
    fn test_builder_chaining() {
        let config = PartyConfig::default()
            .with_max_size(2)
            .with_invite_duration(Duration::from_secs(30))
            .with_tick_rate(10);

        assert_eq!(config.max_size, 2);
        assert!(config.invitations_expire());
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
    }
}
