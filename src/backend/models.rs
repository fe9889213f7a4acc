// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wire types for the portal backend.
//!
//! Every user endpoint answers with the same envelope:
//!
//! ```json
//! { "STATUS_CODE": 200, "RESPONSE": { ... }, "MESSAGE": "optional text" }
//! ```
//!
//! The token validation endpoint is the exception and returns
//! `{ "isValid": bool }` directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::host::Identity;

/// Application-level success code inside the envelope.
pub const STATUS_OK: u16 = 200;

/// Standard response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "STATUS_CODE")]
    pub status_code: u16,
    #[serde(rename = "RESPONSE")]
    pub response: Option<T>,
    #[serde(rename = "MESSAGE", default)]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Successful envelope carrying `response`.
    pub fn ok(response: T) -> Self {
        Self {
            status_code: STATUS_OK,
            response: Some(response),
            message: None,
        }
    }

    /// Failure envelope with no payload.
    pub fn failure(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            response: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }

    /// The payload on success, otherwise the server message (or
    /// `fallback` when the server gave none).
    pub fn into_result(self, fallback: &str) -> Result<T, String> {
        let message = self.message;
        match (self.status_code, self.response) {
            (STATUS_OK, Some(response)) => Ok(response),
            _ => Err(message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string())),
        }
    }
}

/// Body for the lookup-style endpoints (check, login).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserLookup {
    pub tg_id: String,
}

/// Display-only preview of a registered user, shown before login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePreview {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "photo_url", alias = "avatar")]
    pub photo: Option<String>,
}

impl ProfilePreview {
    /// Preview built from host data when the server sent none.
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            name: Some(identity.display_name()),
            photo: identity.avatar_url.clone(),
        }
    }
}

/// `RESPONSE` of the existence check.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckUserResponse {
    pub is_registered: bool,
    #[serde(default)]
    pub user_data: Option<Value>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub preview: Option<ProfilePreview>,
}

/// `RESPONSE` of login and registration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthGrant {
    pub user_data: Value,
    pub token: String,
}

/// Validation endpoint response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TokenValidity {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
}

/// Registration payload. Field validation belongs to the form, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    #[serde(rename = "tg_id")]
    pub tg_id: String,
    pub username: String,
    pub name: String,
    pub photo: Option<String>,
    pub university_id: String,
    pub university_name: String,
    pub college_code: String,
    pub college_name: String,
    pub course_id: String,
    pub course_name: String,
    pub mobile: String,
    pub email: String,
}

impl RegistrationForm {
    /// A form with the identity-derived fields filled in.
    pub fn prefilled(identity: &Identity) -> Self {
        Self {
            tg_id: identity.id.clone(),
            username: identity.username.clone().unwrap_or_default(),
            name: identity.display_name(),
            photo: identity.avatar_url.clone(),
            ..Self::default()
        }
    }
}
