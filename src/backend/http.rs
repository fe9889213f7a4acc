// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! reqwest implementation of [`Backend`].

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::models::{
    AuthGrant, CheckUserResponse, Envelope, RegistrationForm, TokenValidity, UserLookup,
};
use super::{Backend, BackendError};
use crate::config::{ApiEndpoints, SessionConfig};

/// Portal backend over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    endpoints: ApiEndpoints,
    http: Client,
}

impl HttpBackend {
    /// Build the client with the configured timeout and endpoints.
    pub fn new(config: &SessionConfig) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoints: config.endpoints(),
            http,
        })
    }

    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    /// POST a JSON body and decode the standard envelope.
    ///
    /// The envelope is decoded whatever the HTTP status, since the backend
    /// reports application failures inside it.
    async fn post_envelope<B, T>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &B,
    ) -> Result<Envelope<T>, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        if headers.is_empty() {
            return Err(BackendError::Unsigned);
        }

        let response = self
            .http
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(url, status = status.as_u16(), "Backend responded");

        serde_json::from_slice::<Envelope<T>>(&bytes).map_err(|e| {
            if status == StatusCode::UNAUTHORIZED {
                BackendError::Unauthorized
            } else {
                BackendError::InvalidResponse(format!("HTTP {status}: {e}"))
            }
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn check_user(
        &self,
        headers: HeaderMap,
        request: &UserLookup,
    ) -> Result<Envelope<CheckUserResponse>, BackendError> {
        self.post_envelope(&self.endpoints.check_user, headers, request)
            .await
    }

    async fn login_user(
        &self,
        headers: HeaderMap,
        request: &UserLookup,
    ) -> Result<Envelope<AuthGrant>, BackendError> {
        self.post_envelope(&self.endpoints.login_user, headers, request)
            .await
    }

    async fn register_user(
        &self,
        headers: HeaderMap,
        form: &RegistrationForm,
    ) -> Result<Envelope<AuthGrant>, BackendError> {
        self.post_envelope(&self.endpoints.register_user, headers, form)
            .await
    }

    async fn validate_token(&self, headers: HeaderMap) -> Result<TokenValidity, BackendError> {
        if headers.is_empty() {
            return Err(BackendError::Unsigned);
        }

        let response = self
            .http
            .post(&self.endpoints.validate_token)
            .headers(headers)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(BackendError::Unauthorized);
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}
