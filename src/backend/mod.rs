// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Portal Backend
//!
//! The four calls the session subsystem makes against the portal API.
//! [`Backend`] is the seam: [`HttpBackend`] talks to the real server,
//! tests substitute scripted fakes.
//!
//! Every call takes the header map produced by
//! [`crate::host::RequestSigner`]. An empty map means the host gave no
//! assertion and the call is refused with [`BackendError::Unsigned`]
//! without touching the network.

pub mod http;
pub mod models;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use thiserror::Error;

pub use http::HttpBackend;
pub use models::{
    AuthGrant, CheckUserResponse, Envelope, ProfilePreview, RegistrationForm, TokenValidity,
    UserLookup,
};

/// Transport-level failures talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request refused: no host assertion to sign it with")]
    Unsigned,

    #[error("network error: {0}")]
    Network(String),

    #[error("backend rejected the credentials")]
    Unauthorized,

    #[error("backend response was invalid: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::InvalidResponse(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

/// Portal backend operations used by the session subsystem.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `CHECK_USER`: does this identity have an account?
    async fn check_user(
        &self,
        headers: HeaderMap,
        request: &UserLookup,
    ) -> Result<Envelope<CheckUserResponse>, BackendError>;

    /// `LOGIN_USER`: issue a session token for a registered identity.
    async fn login_user(
        &self,
        headers: HeaderMap,
        request: &UserLookup,
    ) -> Result<Envelope<AuthGrant>, BackendError>;

    /// `REGISTER_USER`: create the account and issue a session token.
    async fn register_user(
        &self,
        headers: HeaderMap,
        form: &RegistrationForm,
    ) -> Result<Envelope<AuthGrant>, BackendError>;

    /// `VALIDATE_TOKEN`: `headers` must carry the bearer token.
    ///
    /// HTTP 401 maps to [`BackendError::Unauthorized`].
    async fn validate_token(&self, headers: HeaderMap) -> Result<TokenValidity, BackendError>;
}
