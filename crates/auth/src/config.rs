//! Session manager configuration.

use std::time::Duration;

use chrono::TimeDelta;
use thiserror::Error;

/// Minimum random bytes per token (128 bits of entropy).
pub const MIN_TOKEN_BYTES: usize = 16;

/// Upper bound on token size, to keep keys and headers reasonable.
pub const MAX_TOKEN_BYTES: usize = 256;

/// Recognized session options.
///
/// Defaults: 12h lifetime, 32-byte tokens (64 hex characters), multi-device
/// tracking on, `session:` / `principal-sessions:` key prefixes, 2s per store
/// call, no periodic index sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Lifetime applied at issue and on every refresh.
    pub session_ttl: Duration,

    /// Number of random bytes per token; the token is their hex encoding.
    pub token_byte_length: usize,

    /// Maintain the principal → tokens reverse index.
    pub multi_device_enabled: bool,

    /// Prefix for `session:{token}` keys.
    pub store_key_prefix: String,

    /// Prefix for `principal-sessions:{role}:{principal_id}` keys.
    pub index_key_prefix: String,

    /// Upper bound for a single store call.
    pub store_timeout: Duration,

    /// When set, a background worker prunes stale reverse-index members at this interval.
    pub index_sweep_interval: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(12 * 60 * 60),
            token_byte_length: 32,
            multi_device_enabled: true,
            store_key_prefix: "session:".to_string(),
            index_key_prefix: "principal-sessions:".to_string(),
            store_timeout: Duration::from_secs(2),
            index_sweep_interval: None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("session_ttl must be positive and representable as a timestamp offset")]
    InvalidTtl,

    #[error("token_byte_length must be between {min} and {max} (got {got})")]
    TokenLength { min: usize, max: usize, got: usize },

    #[error("{0} must not be empty")]
    EmptyPrefix(&'static str),

    #[error("store_key_prefix and index_key_prefix must not be prefixes of each other")]
    OverlappingPrefixes,

    #[error("store_timeout must be positive")]
    InvalidTimeout,

    #[error("index_sweep_interval must be positive when set")]
    InvalidSweepInterval,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ttl_delta()?;

        if !(MIN_TOKEN_BYTES..=MAX_TOKEN_BYTES).contains(&self.token_byte_length) {
            return Err(ConfigError::TokenLength {
                min: MIN_TOKEN_BYTES,
                max: MAX_TOKEN_BYTES,
                got: self.token_byte_length,
            });
        }

        if self.store_key_prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix("store_key_prefix"));
        }
        if self.index_key_prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix("index_key_prefix"));
        }
        // Index scans match on the prefix; they must never see session keys.
        if self.store_key_prefix.starts_with(&self.index_key_prefix)
            || self.index_key_prefix.starts_with(&self.store_key_prefix)
        {
            return Err(ConfigError::OverlappingPrefixes);
        }

        if self.store_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.index_sweep_interval.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::InvalidSweepInterval);
        }

        Ok(())
    }

    pub(crate) fn ttl_delta(&self) -> Result<TimeDelta, ConfigError> {
        if self.session_ttl.is_zero() {
            return Err(ConfigError::InvalidTtl);
        }
        TimeDelta::from_std(self.session_ttl).map_err(|_| ConfigError::InvalidTtl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = SessionConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.session_ttl, Duration::from_secs(43_200));
        assert_eq!(cfg.token_byte_length * 2, 64);
        assert!(cfg.multi_device_enabled);
    }

    #[test]
    fn short_tokens_are_rejected() {
        let cfg = SessionConfig {
            token_byte_length: 8,
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::TokenLength {
                min: 16,
                max: 256,
                got: 8
            })
        );
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let cfg = SessionConfig {
            session_ttl: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidTtl));
    }

    #[test]
    fn overlapping_prefixes_are_rejected() {
        let cfg = SessionConfig {
            store_key_prefix: "s:".to_string(),
            index_key_prefix: "s:idx:".to_string(),
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::OverlappingPrefixes));
    }

    #[test]
    fn empty_prefix_is_rejected() {
        let cfg = SessionConfig {
            index_key_prefix: String::new(),
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyPrefix("index_key_prefix")));
    }
}
