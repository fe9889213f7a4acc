// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account switch guard.
//!
//! On a shared device a second Telegram account can open the same mini app
//! instance. Before anything reads the stored session, the identity it
//! was issued for is compared with the identity the host reports now; on
//! mismatch the whole record is wiped, valid token or not.

use tracing::info;

use crate::host::Identity;
use crate::storage::{Session, SessionStore, StorageResult};

/// Reconcile the stored session with the current host identity.
///
/// Returns the stored session when it belongs to `identity`, otherwise
/// clears the store and returns `None`.
pub fn reconcile(store: &SessionStore, identity: &Identity) -> StorageResult<Option<Session>> {
    match store.read()? {
        Some(session) if session.owner_identity_id() != identity.id => {
            info!(
                stored_owner = %session.owner_identity_id(),
                identity_id = %identity.id,
                "Account mismatch, clearing stored session"
            );
            store.clear()?;
            Ok(None)
        }
        current => Ok(current),
    }
}
