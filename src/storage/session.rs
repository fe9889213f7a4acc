// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted session record.
//!
//! A session is three keys in the underlying store: the serialized profile,
//! the opaque token, and the identity id it was issued for. [`SessionStore`]
//! only ever writes or removes all three in one batch, and any read that
//! finds a subset treats the record as absent and wipes the leftovers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::kv::{KeyValueStore, WriteBatch};
use super::{StorageError, StorageResult};

/// Serialized user profile.
pub const PROFILE_KEY: &str = "usg_user";
/// Opaque backend session token.
pub const TOKEN_KEY: &str = "usg_token";
/// Host identity id the session was created for.
pub const OWNER_KEY: &str = "last_tg_id";

/// Every key that belongs to the session record.
pub const SESSION_KEYS: [&str; 3] = [PROFILE_KEY, TOKEN_KEY, OWNER_KEY];

/// User profile as returned by the backend (`user_data`).
///
/// Kept as an open JSON object; downstream screens read what they need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(Map<String, Value>);

impl Profile {
    /// Wrap an already-parsed JSON object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// Raw profile field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Display name, if the backend supplied one.
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// A complete session. Cannot be constructed with an empty field.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    profile: Profile,
    token: String,
    owner_identity_id: String,
}

impl Session {
    /// A complete session. Fails with [`StorageError::Incomplete`] when the
    /// token or owner id is empty.
    pub fn new(
        profile: Profile,
        token: impl Into<String>,
        owner_identity_id: impl Into<String>,
    ) -> StorageResult<Self> {
        let token = token.into();
        let owner_identity_id = owner_identity_id.into();
        if token.is_empty() {
            return Err(StorageError::Incomplete("token"));
        }
        if owner_identity_id.is_empty() {
            return Err(StorageError::Incomplete("owner identity id"));
        }
        Ok(Self {
            profile,
            token,
            owner_identity_id,
        })
    }

    /// Profile as returned by the backend.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Opaque bearer token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Identity id the session was issued for.
    pub fn owner_identity_id(&self) -> &str {
        &self.owner_identity_id
    }
}

/// Whole-record access to the persisted session.
///
/// `replace` and `clear` are the only mutators.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    /// Session record over `kv`.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Read the session, or `None` when absent.
    ///
    /// Partial or unparsable records are cleared and reported as absent.
    pub fn read(&self) -> StorageResult<Option<Session>> {
        let values = self.kv.get_many(&SESSION_KEYS)?;
        let non_empty = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        let present = values.iter().filter(|v| non_empty(*v)).count();

        if present == 0 {
            if values.iter().any(Option::is_some) {
                self.clear()?;
            }
            return Ok(None);
        }
        if present < SESSION_KEYS.len() {
            warn!(present, "Partial session record found, clearing");
            self.clear()?;
            return Ok(None);
        }

        let mut fields = values.into_iter();
        let mut next = || fields.next().flatten().unwrap_or_default();
        let (profile, token, owner) = (next(), next(), next());

        let profile = match serde_json::from_str::<Value>(&profile)
            .ok()
            .and_then(Profile::from_value)
        {
            Some(profile) => profile,
            None => {
                warn!("Stored session profile is not a JSON object, clearing");
                self.clear()?;
                return Ok(None);
            }
        };

        Session::new(profile, token, owner).map(Some)
    }

    /// Atomically replace whatever is stored with `session`.
    pub fn replace(&self, session: &Session) -> StorageResult<()> {
        let profile = serde_json::to_string(session.profile())?;
        let batch = WriteBatch::new()
            .set(PROFILE_KEY, profile)
            .set(TOKEN_KEY, session.token())
            .set(OWNER_KEY, session.owner_identity_id());
        self.kv.apply(&batch)?;
        debug!(owner = %session.owner_identity_id(), "Session stored");
        Ok(())
    }

    /// Atomically remove the whole session record.
    pub fn clear(&self) -> StorageResult<()> {
        let batch = SESSION_KEYS
            .iter()
            .fold(WriteBatch::new(), |batch, key| batch.remove(*key));
        self.kv.apply(&batch)?;
        debug!("Session cleared");
        Ok(())
    }
}
