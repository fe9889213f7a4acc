// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Local Storage Module
//!
//! Persistent client-side state, modeled on the mini app's `localStorage`.
//!
//! ## Layout
//!
//! ```text
//! usg_user     # session profile (JSON object)
//! usg_token    # opaque session token
//! last_tg_id   # identity id the session belongs to
//! theme        # theme preference (survives logout)
//! ```
//!
//! The first three keys form one record and are only written or removed
//! together through [`SessionStore`]. Backends implement the field-oriented
//! [`KeyValueStore`] trait; atomicity comes from [`WriteBatch`].

pub mod file_store;
pub mod kv;
pub mod preferences;
pub mod session;

use std::io;

use thiserror::Error;

pub use file_store::FileStore;
pub use kv::{KeyValueStore, MemoryStore, WriteBatch};
pub use preferences::{Preferences, Theme};
pub use session::{Profile, Session, SessionStore};

/// Error type for local storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored data could not be parsed
    #[error("corrupt storage: {0}")]
    Corrupt(String),

    /// Attempt to build a session with a missing field
    #[error("incomplete session: missing {0}")]
    Incomplete(&'static str),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
