// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! USG Portal Session - session and identity verification for the
//! student portal Telegram mini app.
//!
//! The crate decides, at launch, whether the current Telegram account can
//! reach the portal, keeps exactly one valid session per device, and
//! forces logout when the backend stops honoring the token.
//!
//! ## Modules
//!
//! - `host` - host bridge, identity extraction, request signing
//! - `storage` - atomic key-value persistence and the session record
//! - `backend` - portal API client
//! - `auth` - launch state machine and account switch guard
//! - `heartbeat` - periodic token validation

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod feedback;
pub mod heartbeat;
pub mod host;
pub mod storage;

#[cfg(test)]
mod testing;

pub use auth::{AuthOrchestrator, AuthPhase, AuthStatus};
pub use config::SessionConfig;
pub use error::SessionError;
