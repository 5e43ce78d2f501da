//! Runtime configuration from environment variables.

use party_match::{ConfigError, PartyConfig, DEFAULT_INBOX_CAPACITY};
use std::str::FromStr;
use std::time::Duration;

/// Node name used when `PARTY_NODE` is unset.
pub const DEFAULT_NODE: &str = "party-node";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Name of this node; becomes the suffix of every party id.
    pub node: String,

    /// Settings applied to every party created here.
    pub party: PartyConfig,

    /// Requests queued per party before callers wait.
    pub inbox_capacity: usize,

    /// Log filter. Falls back to `RUST_LOG`, then `info`.
    pub log_level: Option<String>,

    pub json_logs: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            node: DEFAULT_NODE.to_string(),
            party: PartyConfig::default(),
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            log_level: None,
            json_logs: false,
        }
    }
}

impl RuntimeConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PARTY_NODE`: node name (default: party-node)
    /// - `PARTY_MAX_SIZE`: member limit, 0 for none (default: 0)
    /// - `PARTY_INVITE_TTL_SECS`: invitation lifetime, 0 for none (default: 0)
    /// - `PARTY_TICK_RATE`: ticks per second (default: 1)
    /// - `PARTY_INITIAL_JOIN_TICKS`: ticks a new party waits for its creator (default: 60)
    /// - `PARTY_INBOX_CAPACITY`: queued requests per party (default: 256)
    /// - `PARTY_LOG_LEVEL` or `RUST_LOG`: log filter (default: info)
    /// - `PARTY_JSON_LOGS`: JSON log output (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(node) = lookup("PARTY_NODE").filter(|n| !n.is_empty()) {
            config.node = node;
        }
        if let Some(max_size) = parse(&lookup, "PARTY_MAX_SIZE")? {
            config.party.max_size = max_size;
        }
        if let Some(secs) = parse::<u64>(&lookup, "PARTY_INVITE_TTL_SECS")? {
            config.party.invite_duration = Duration::from_secs(secs);
        }
        if let Some(rate) = parse(&lookup, "PARTY_TICK_RATE")? {
            config.party.tick_rate = rate;
        }
        if let Some(ticks) = parse(&lookup, "PARTY_INITIAL_JOIN_TICKS")? {
            config.party.initial_join_ticks = ticks;
        }
        if let Some(capacity) = parse(&lookup, "PARTY_INBOX_CAPACITY")? {
            if capacity == 0 {
                return Err(invalid("PARTY_INBOX_CAPACITY", "0"));
            }
            config.inbox_capacity = capacity;
        }
        config.log_level = lookup("PARTY_LOG_LEVEL").filter(|l| !l.is_empty());
        config.json_logs = lookup("PARTY_JSON_LOGS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        config.party.validate()?;
        Ok(config)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, &raw)),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
