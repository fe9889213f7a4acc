// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use thiserror::Error;

use crate::auth::AuthPhase;
use crate::heartbeat::Rejection;
use crate::storage::StorageError;

/// Shown for any transport failure reaching the backend.
pub const NETWORK_FAILURE_MESSAGE: &str = "Network Connection Failed";

/// Errors surfaced by the session subsystem.
///
/// Nothing here escapes to the presentation layer as a panic or an
/// unhandled failure: callers get the variant plus [`user_message`] and the
/// state machine stays where it was unless the variant says otherwise.
///
/// [`user_message`]: SessionError::user_message
#[derive(Debug, Error)]
pub enum SessionError {
    /// Not running inside the host. Fatal for this launch.
    #[error("not running inside the Telegram host")]
    Environment,

    /// Backend could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// Backend answered with a non-success envelope.
    #[error("{message}")]
    Application { message: String },

    /// Heartbeat found the token invalid; the session has been cleared.
    #[error("token invalid: {reason}")]
    TokenInvalid { reason: String },

    /// Operation is not allowed in the current state.
    #[error("operation requires {expected} state, current state is {actual}")]
    InvalidTransition {
        expected: AuthPhase,
        actual: AuthPhase,
    },

    /// Local session storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Non-success envelope carrying the server message.
    pub fn application(message: impl Into<String>) -> Self {
        SessionError::Application {
            message: message.into(),
        }
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::Environment => "environment",
            SessionError::Network(_) => "network",
            SessionError::Application { .. } => "application",
            SessionError::TokenInvalid { .. } => "token_invalid",
            SessionError::InvalidTransition { .. } => "invalid_transition",
            SessionError::Storage(_) => "storage",
        }
    }

    /// Text for the user-visible alert.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Environment => "Please open this app from Telegram.".to_string(),
            SessionError::Network(_) => NETWORK_FAILURE_MESSAGE.to_string(),
            SessionError::Application { message } => message.clone(),
            SessionError::TokenInvalid { reason } => reason.clone(),
            SessionError::InvalidTransition { .. } => "Please try again.".to_string(),
            SessionError::Storage(_) => "Could not save your session on this device.".to_string(),
        }
    }

    /// Whether repeating the same action can succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            SessionError::Network(_) | SessionError::Application { .. } | SessionError::Storage(_)
        )
    }
}

impl From<Rejection> for SessionError {
    fn from(rejection: Rejection) -> Self {
        SessionError::TokenInvalid {
            reason: rejection.reason().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_messages() {
        let env = SessionError::Environment;
        assert_eq!(env.error_code(), "environment");
        assert!(!env.is_retriable());

        let net = SessionError::Network("connection refused".into());
        assert_eq!(net.user_message(), NETWORK_FAILURE_MESSAGE);
        assert!(net.is_retriable());

        let app = SessionError::application("Email already exists");
        assert_eq!(app.error_code(), "application");
        assert_eq!(app.user_message(), "Email already exists");
        assert_eq!(app.to_string(), "Email already exists");
    }

    #[test]
    fn invalid_transition_names_both_phases() {
        let err = SessionError::InvalidTransition {
            expected: AuthPhase::ReadyToLogin,
            actual: AuthPhase::Checking,
        };
        assert_eq!(
            err.to_string(),
            "operation requires READY_TO_LOGIN state, current state is CHECKING"
        );
        assert!(!err.is_retriable());
    }

    #[test]
    fn rejection_becomes_token_invalid() {
        let err = SessionError::from(Rejection::Expired);
        assert_eq!(err.error_code(), "token_invalid");
        assert_eq!(err.user_message(), "Session Expired");
        assert!(!err.is_retriable());
    }

    #[test]
    fn storage_errors_convert() {
        let err: SessionError = StorageError::Incomplete("token").into();
        assert_eq!(err.error_code(), "storage");
    }
}
