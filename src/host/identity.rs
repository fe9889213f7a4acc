// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Host identity assertion and its unsigned convenience fields.
//!
//! Telegram hands the mini app an `initData` query string such as
//!
//! ```text
//! query_id=AAH...&user=%7B%22id%22%3A42%2C%22first_name%22%3A%22Asha%22%7D&auth_date=1700000000&hash=ab12...
//! ```
//!
//! The whole string is the signed assertion; only the backend can verify it.
//! The decoded `user` object and `hash` are read here for display, logging,
//! and account-switch comparison. Nothing in this module trusts them.

use serde::Deserialize;
use url::form_urlencoded;

use super::HostError;

/// The `user` object embedded in Telegram init data.
#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    first_name: String,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
}

/// Identity reported by the host for the current launch.
///
/// Immutable once extracted; a new launch produces a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Numeric Telegram user id, kept as a string for comparison with
    /// persisted owner ids.
    pub id: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    /// Unsigned hash field from the init data (logging only).
    pub hash: Option<String>,
    /// The raw signed assertion, forwarded verbatim to the backend.
    pub raw_assertion: String,
}

impl Identity {
    /// Parse the raw init data string into an identity.
    pub fn from_init_data(raw: &str) -> Result<Self, HostError> {
        if raw.trim().is_empty() {
            return Err(HostError::MissingInitData);
        }

        let mut user_json = None;
        let mut hash = None;
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "user" => user_json = Some(value.into_owned()),
                "hash" => hash = Some(value.into_owned()).filter(|h| !h.is_empty()),
                _ => {}
            }
        }

        let user_json = user_json.ok_or(HostError::MissingUser)?;
        let user: TelegramUser = serde_json::from_str(&user_json)
            .map_err(|e| HostError::MalformedUser(e.to_string()))?;

        Ok(Self {
            id: user.id.to_string(),
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            avatar_url: user.photo_url,
            hash,
            raw_assertion: raw.to_string(),
        })
    }

    /// "First Last", trimmed when the last name is absent.
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last).trim().to_string(),
            None => self.first_name.trim().to_string(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::init_data_for;
    use super::*;

    #[test]
    fn parses_user_and_hash() {
        let raw = init_data_for(42, "Asha");
        let identity = Identity::from_init_data(&raw).unwrap();

        assert_eq!(identity.id, "42");
        assert_eq!(identity.first_name, "Asha");
        assert_eq!(identity.last_name.as_deref(), Some("Verma"));
        assert_eq!(identity.username.as_deref(), Some("asha_v"));
        assert_eq!(
            identity.avatar_url.as_deref(),
            Some("https://t.me/i/userpic/320/asha.jpg")
        );
        assert_eq!(
            identity.hash.as_deref(),
            Some("c501b71e775f74ce10e377dea85a7ea2")
        );
        assert_eq!(identity.raw_assertion, raw);
        assert_eq!(identity.display_name(), "Asha Verma");
    }

    #[test]
    fn empty_init_data_is_missing() {
        assert!(matches!(
            Identity::from_init_data("  "),
            Err(HostError::MissingInitData)
        ));
    }

    #[test]
    fn init_data_without_user_is_rejected() {
        assert!(matches!(
            Identity::from_init_data("auth_date=1&hash=abc"),
            Err(HostError::MissingUser)
        ));
    }

    #[test]
    fn malformed_user_json_is_rejected() {
        let raw = "user=%7Bnot-json&hash=abc";
        assert!(matches!(
            Identity::from_init_data(raw),
            Err(HostError::MalformedUser(_))
        ));
    }

    #[test]
    fn missing_optional_fields_default_to_none() {
        let raw = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("user", r#"{"id":7,"first_name":"Ravi"}"#)
            .finish();
        let identity = Identity::from_init_data(&raw).unwrap();

        assert_eq!(identity.id, "7");
        assert!(identity.hash.is_none());
        assert!(identity.username.is_none());
        assert_eq!(identity.display_name(), "Ravi");
    }
}
