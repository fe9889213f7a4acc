// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication state machine states.
//!
//! ```text
//!                 not hosted
//!   CHECKING ───────────────────────────────▶ ERROR
//!      │ exists=false / check failed
//!      ├──────────────▶ NEEDS_REGISTRATION ──┐ register / complete_registration
//!      │ exists=true                         │
//!      ├──────────────▶ READY_TO_LOGIN ──────┤ continue_login
//!      │ stored session / grant in check     ▼
//!      └────────────────────────────────▶ AUTHENTICATED
//!                                            │ logout / heartbeat rejection
//!   CHECKING ◀───────────────────────────────┘ (session cleared, reason kept)
//! ```

use std::fmt;

use crate::backend::{ProfilePreview, RegistrationForm};
use crate::heartbeat::HeartbeatTicket;
use crate::storage::Session;

/// Discriminant of the state machine, for comparisons and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthPhase {
    Checking,
    Error,
    NeedsRegistration,
    ReadyToLogin,
    Authenticated,
}

impl fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthPhase::Checking => "CHECKING",
            AuthPhase::Error => "ERROR",
            AuthPhase::NeedsRegistration => "NEEDS_REGISTRATION",
            AuthPhase::ReadyToLogin => "READY_TO_LOGIN",
            AuthPhase::Authenticated => "AUTHENTICATED",
        };
        f.write_str(name)
    }
}

/// Live state, owned by the orchestrator.
///
/// The heartbeat ticket lives inside `Authenticated`, so leaving that
/// state drops (and thereby cancels) the ticket, and entering it again
/// requires a fresh one.
#[derive(Debug)]
pub(crate) enum AuthState {
    Checking {
        reason: Option<String>,
    },
    Error {
        message: String,
    },
    NeedsRegistration {
        prefill: RegistrationForm,
    },
    ReadyToLogin {
        preview: ProfilePreview,
    },
    Authenticated {
        session: Session,
        heartbeat: HeartbeatTicket,
    },
}

impl AuthState {
    pub(crate) fn phase(&self) -> AuthPhase {
        match self {
            AuthState::Checking { .. } => AuthPhase::Checking,
            AuthState::Error { .. } => AuthPhase::Error,
            AuthState::NeedsRegistration { .. } => AuthPhase::NeedsRegistration,
            AuthState::ReadyToLogin { .. } => AuthPhase::ReadyToLogin,
            AuthState::Authenticated { .. } => AuthPhase::Authenticated,
        }
    }

    pub(crate) fn status(&self) -> AuthStatus {
        match self {
            AuthState::Checking { reason } => AuthStatus::Checking {
                reason: reason.clone(),
            },
            AuthState::Error { message } => AuthStatus::Error {
                message: message.clone(),
            },
            AuthState::NeedsRegistration { prefill } => AuthStatus::NeedsRegistration {
                prefill: prefill.clone(),
            },
            AuthState::ReadyToLogin { preview } => AuthStatus::ReadyToLogin {
                preview: preview.clone(),
            },
            AuthState::Authenticated { session, .. } => AuthStatus::Authenticated {
                session: session.clone(),
            },
        }
    }
}

/// Snapshot of the state handed to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStatus {
    Checking { reason: Option<String> },
    Error { message: String },
    NeedsRegistration { prefill: RegistrationForm },
    ReadyToLogin { preview: ProfilePreview },
    Authenticated { session: Session },
}

impl AuthStatus {
    pub fn phase(&self) -> AuthPhase {
        match self {
            AuthStatus::Checking { .. } => AuthPhase::Checking,
            AuthStatus::Error { .. } => AuthPhase::Error,
            AuthStatus::NeedsRegistration { .. } => AuthPhase::NeedsRegistration,
            AuthStatus::ReadyToLogin { .. } => AuthPhase::ReadyToLogin,
            AuthStatus::Authenticated { .. } => AuthPhase::Authenticated,
        }
    }

    /// True only for `Authenticated`.
    pub fn is_logged_in(&self) -> bool {
        matches!(self, AuthStatus::Authenticated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_match_wire_names() {
        assert_eq!(AuthPhase::NeedsRegistration.to_string(), "NEEDS_REGISTRATION");
        assert_eq!(AuthPhase::Authenticated.to_string(), "AUTHENTICATED");
    }

    #[test]
    fn status_mirrors_state() {
        let state = AuthState::Checking {
            reason: Some("Session Expired".into()),
        };
        assert_eq!(state.phase(), AuthPhase::Checking);
        assert_eq!(
            state.status(),
            AuthStatus::Checking {
                reason: Some("Session Expired".into())
            }
        );
        assert!(!state.status().is_logged_in());
    }
}
