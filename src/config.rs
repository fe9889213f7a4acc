// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the loaded [`SessionConfig`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `USG_API_BASE_URL` | Portal backend base URL | `http://127.0.0.1:5000` |
//! | `USG_HEARTBEAT_INTERVAL_MS` | Token validation interval | `10000` |
//! | `USG_REQUEST_TIMEOUT_SECS` | HTTP client timeout | `15` |
//! | `USG_STATE_PATH` | Persisted key-value file | `./usg-state.json` |
//! | `USG_CHECK_FAILURE` | Existence-check failure policy (`register` or `retry`) | `register` |
//! | `TELEGRAM_INIT_DATA` | Raw host init data (driver binary only) | none |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,usg_portal_session=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const API_BASE_URL_ENV: &str = "USG_API_BASE_URL";
pub const HEARTBEAT_INTERVAL_ENV: &str = "USG_HEARTBEAT_INTERVAL_MS";
pub const REQUEST_TIMEOUT_ENV: &str = "USG_REQUEST_TIMEOUT_SECS";
pub const STATE_PATH_ENV: &str = "USG_STATE_PATH";
pub const CHECK_FAILURE_ENV: &str = "USG_CHECK_FAILURE";
pub const INIT_DATA_ENV: &str = "TELEGRAM_INIT_DATA";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10_000);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_STATE_PATH: &str = "./usg-state.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} has unsupported value '{value}'")]
    InvalidChoice { name: &'static str, value: String },
}

/// What to do when the existence check fails (network error or a
/// non-success envelope).
///
/// `AssumeUnregistered` routes the user to registration. That keeps the
/// portal usable during backend hiccups but can send an already-registered
/// user into a duplicate registration attempt. `Retry` stays in the
/// checking state with a notice so the driver can relaunch instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CheckFailurePolicy {
    #[default]
    AssumeUnregistered,
    Retry,
}

impl FromStr for CheckFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "register" => Ok(Self::AssumeUnregistered),
            "retry" => Ok(Self::Retry),
            _ => Err(ConfigError::InvalidChoice {
                name: CHECK_FAILURE_ENV,
                value: s.to_string(),
            }),
        }
    }
}

/// Backend endpoint URLs derived from one base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub check_user: String,
    pub login_user: String,
    pub register_user: String,
    pub validate_token: String,
}

impl ApiEndpoints {
    /// Endpoints under `base_url`; a trailing slash is ignored.
    pub fn new(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            check_user: format!("{base}/api/user/check"),
            login_user: format!("{base}/api/user/login"),
            register_user: format!("{base}/api/user/register"),
            validate_token: format!("{base}/api/user/validate-token"),
        }
    }
}

/// Loaded configuration for the session subsystem.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub api_base_url: String,
    pub heartbeat_interval: Duration,
    pub request_timeout: Duration,
    pub state_path: PathBuf,
    pub check_failure: CheckFailurePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            check_failure: CheckFailurePolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let api_base_url = match get(API_BASE_URL_ENV) {
            Some(raw) => {
                Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
                    name: API_BASE_URL_ENV,
                    reason: e.to_string(),
                })?;
                raw
            }
            None => defaults.api_base_url,
        };

        let heartbeat_interval = match get(HEARTBEAT_INTERVAL_ENV) {
            Some(raw) => Duration::from_millis(parse_positive(HEARTBEAT_INTERVAL_ENV, &raw)?),
            None => defaults.heartbeat_interval,
        };

        let request_timeout = match get(REQUEST_TIMEOUT_ENV) {
            Some(raw) => Duration::from_secs(parse_positive(REQUEST_TIMEOUT_ENV, &raw)?),
            None => defaults.request_timeout,
        };

        let state_path = get(STATE_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or(defaults.state_path);

        let check_failure = match get(CHECK_FAILURE_ENV) {
            Some(raw) => raw.parse()?,
            None => defaults.check_failure,
        };

        Ok(Self {
            api_base_url,
            heartbeat_interval,
            request_timeout,
            state_path,
            check_failure,
        })
    }

    /// Endpoint URLs for the configured base.
    pub fn endpoints(&self) -> ApiEndpoints {
        ApiEndpoints::new(&self.api_base_url)
    }
}

fn parse_positive(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidNumber {
            name,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = SessionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.check_failure, CheckFailurePolicy::AssumeUnregistered);
    }

    #[test]
    fn reads_overrides() {
        let config = SessionConfig::from_lookup(lookup(&[
            (API_BASE_URL_ENV, "https://portal.example.org/"),
            (HEARTBEAT_INTERVAL_ENV, "2500"),
            (REQUEST_TIMEOUT_ENV, "3"),
            (STATE_PATH_ENV, "/tmp/usg.json"),
            (CHECK_FAILURE_ENV, "Retry"),
        ]))
        .unwrap();

        assert_eq!(config.heartbeat_interval, Duration::from_millis(2500));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.state_path, PathBuf::from("/tmp/usg.json"));
        assert_eq!(config.check_failure, CheckFailurePolicy::Retry);
        assert_eq!(
            config.endpoints().check_user,
            "https://portal.example.org/api/user/check"
        );
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[(HEARTBEAT_INTERVAL_ENV, "  ")])).unwrap();
        assert_eq!(config.heartbeat_interval, DEFAULT_HEARTBEAT_INTERVAL);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            SessionConfig::from_lookup(lookup(&[(HEARTBEAT_INTERVAL_ENV, "0")])),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            SessionConfig::from_lookup(lookup(&[(API_BASE_URL_ENV, "not a url")])),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            SessionConfig::from_lookup(lookup(&[(CHECK_FAILURE_ENV, "guess")])),
            Err(ConfigError::InvalidChoice { .. })
        ));
    }

    #[test]
    fn endpoints_follow_base_url() {
        let endpoints = ApiEndpoints::new("http://127.0.0.1:5000");
        assert_eq!(endpoints.login_user, "http://127.0.0.1:5000/api/user/login");
        assert_eq!(endpoints.register_user, "http://127.0.0.1:5000/api/user/register");
        assert_eq!(
            endpoints.validate_token,
            "http://127.0.0.1:5000/api/user/validate-token"
        );
    }
}
