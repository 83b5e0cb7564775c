//! Process configuration from environment variables.
//!
//! | variable                      | default            |
//! |-------------------------------|--------------------|
//! | `BIND_ADDR`                   | `0.0.0.0:8080`     |
//! | `REDIS_URL`                   | unset → in-memory  |
//! | `SESSION_TTL_SECS`            | `43200` (12h)      |
//! | `SESSION_TOKEN_BYTES`         | `32`               |
//! | `SESSION_MULTI_DEVICE`        | `true`             |
//! | `SESSION_KEY_PREFIX`          | `session:`         |
//! | `SESSION_INDEX_PREFIX`        | `principal-sessions:` |
//! | `SESSION_STORE_TIMEOUT_MS`    | `2000`             |
//! | `SESSION_SWEEP_INTERVAL_SECS` | unset → no sweep   |
//! | `DEV_USERS`                   | unset → nobody can log in |
//!
//! `DEV_USERS` is a comma-separated list of `username:secret:principal_id:ROLE`
//! entries for the built-in static credential table (dev only).

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use timetable_auth::{Principal, SessionConfig};
use timetable_core::{PrincipalId, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiConfigError {
    #[error("{var}: {message}")]
    Invalid { var: &'static str, message: String },

    #[error("invalid session configuration: {0}")]
    Session(#[from] timetable_auth::ConfigError),
}

impl ApiConfigError {
    fn invalid(var: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            message: message.into(),
        }
    }
}

/// One entry of the dev credential table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevUser {
    pub username: String,
    pub secret: String,
    pub principal: Principal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub redis_url: Option<String>,
    pub session: SessionConfig,
    pub dev_users: Vec<DevUser>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            redis_url: None,
            session: SessionConfig::default(),
            dev_users: Vec::new(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ApiConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut cfg = ApiConfig::default();

        if let Some(v) = get("BIND_ADDR") {
            cfg.bind_addr = parse("BIND_ADDR", &v)?;
        }

        cfg.redis_url = get("REDIS_URL");
        if cfg.redis_url.is_none() {
            tracing::warn!("REDIS_URL not set; sessions are kept in process memory");
        }

        if let Some(v) = get("SESSION_TTL_SECS") {
            cfg.session.session_ttl = Duration::from_secs(parse("SESSION_TTL_SECS", &v)?);
        }
        if let Some(v) = get("SESSION_TOKEN_BYTES") {
            cfg.session.token_byte_length = parse("SESSION_TOKEN_BYTES", &v)?;
        }
        if let Some(v) = get("SESSION_MULTI_DEVICE") {
            cfg.session.multi_device_enabled = parse_bool("SESSION_MULTI_DEVICE", &v)?;
        }
        if let Some(v) = get("SESSION_KEY_PREFIX") {
            cfg.session.store_key_prefix = v;
        }
        if let Some(v) = get("SESSION_INDEX_PREFIX") {
            cfg.session.index_key_prefix = v;
        }
        if let Some(v) = get("SESSION_STORE_TIMEOUT_MS") {
            cfg.session.store_timeout =
                Duration::from_millis(parse("SESSION_STORE_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = get("SESSION_SWEEP_INTERVAL_SECS") {
            cfg.session.index_sweep_interval =
                Some(Duration::from_secs(parse("SESSION_SWEEP_INTERVAL_SECS", &v)?));
        }
        cfg.session.validate()?;

        if let Some(v) = get("DEV_USERS") {
            cfg.dev_users = parse_dev_users(&v)?;
            tracing::warn!(count = cfg.dev_users.len(), "DEV_USERS set; using static dev credentials");
        }

        Ok(cfg)
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ApiConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ApiConfigError::invalid(var, format!("'{value}': {e}")))
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ApiConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ApiConfigError::invalid(var, format!("'{other}' is not a boolean"))),
    }
}

fn parse_dev_users(value: &str) -> Result<Vec<DevUser>, ApiConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split(':').collect();
            let [username, secret, principal_id, role] = parts[..] else {
                return Err(ApiConfigError::invalid(
                    "DEV_USERS",
                    "entries must look like username:secret:principal_id:ROLE",
                ));
            };
            let principal_id = PrincipalId::new(principal_id)
                .map_err(|e| ApiConfigError::invalid("DEV_USERS", e.to_string()))?;
            let role = Role::from_str(role)
                .map_err(|e| ApiConfigError::invalid("DEV_USERS", e.to_string()))?;
            Ok(DevUser {
                username: username.to_string(),
                secret: secret.to_string(),
                principal: Principal::new(principal_id, role),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from(vars: &[(&str, &str)]) -> Result<ApiConfig, ApiConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = from(&[]).unwrap();
        assert_eq!(cfg, ApiConfig::default());
    }

    #[test]
    fn session_options_are_read() {
        let cfg = from(&[
            ("SESSION_TTL_SECS", "3600"),
            ("SESSION_TOKEN_BYTES", "24"),
            ("SESSION_MULTI_DEVICE", "off"),
            ("SESSION_SWEEP_INTERVAL_SECS", "300"),
            ("REDIS_URL", "redis://cache:6379"),
        ])
        .unwrap();

        assert_eq!(cfg.session.session_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.session.token_byte_length, 24);
        assert!(!cfg.session.multi_device_enabled);
        assert_eq!(cfg.session.index_sweep_interval, Some(Duration::from_secs(300)));
        assert_eq!(cfg.redis_url.as_deref(), Some("redis://cache:6379"));
    }

    #[test]
    fn unparsable_values_fail_loudly() {
        let err = from(&[("SESSION_TTL_SECS", "twelve hours")]).unwrap_err();
        assert!(matches!(err, ApiConfigError::Invalid { var: "SESSION_TTL_SECS", .. }));
    }

    #[test]
    fn invalid_session_values_are_rejected() {
        let err = from(&[("SESSION_TOKEN_BYTES", "4")]).unwrap_err();
        assert!(matches!(err, ApiConfigError::Session(_)));
    }

    #[test]
    fn dev_users_are_parsed() {
        let cfg = from(&[("DEV_USERS", "alice:pw:s-1:STUDENT, carol:pw2:a-1:ACADEMIC_ADMIN")]).unwrap();
        assert_eq!(cfg.dev_users.len(), 2);
        assert_eq!(cfg.dev_users[1].username, "carol");
        assert_eq!(cfg.dev_users[1].principal.role, Role::AcademicAdmin);

        assert!(from(&[("DEV_USERS", "alice:pw:STUDENT")]).is_err());
        assert!(from(&[("DEV_USERS", "alice:pw:s-1:DEAN")]).is_err());
    }
}
