// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request signing from the host assertion.
//!
//! Every backend call carries the raw signed init data so the backend can
//! verify the caller independently of anything the client claims. Signing
//! fails closed: without an assertion the header map is empty and callers
//! must abort the request.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::warn;
use uuid::Uuid;

use super::{HostBridge, Identity};

/// Raw signed Telegram init data.
pub const INIT_DATA_HEADER: HeaderName = HeaderName::from_static("x-telegram-init-data");
/// Unsigned init data hash, for backend logging.
pub const HASH_HEADER: HeaderName = HeaderName::from_static("x-telegram-hash");
/// Numeric Telegram user id.
pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");
/// Static marker the backend uses to reject direct browser traffic.
pub const CLIENT_MARKER_HEADER: HeaderName = HeaderName::from_static("x-requested-with");
/// Per-call correlation id.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Value of [`CLIENT_MARKER_HEADER`].
pub const CLIENT_MARKER: &str = "USG-Mini-App";

/// Derives backend headers from the host's current assertion.
#[derive(Clone)]
pub struct RequestSigner {
    host: Arc<dyn HostBridge>,
}

impl RequestSigner {
    /// Signer reading the assertion from `host` on every call.
    pub fn new(host: Arc<dyn HostBridge>) -> Self {
        Self { host }
    }

    /// Build the signed header set. Empty when no assertion is present.
    pub fn sign(&self) -> HeaderMap {
        let Some(raw) = self.host.init_data().filter(|r| !r.trim().is_empty()) else {
            return HeaderMap::new();
        };
        let identity = self.host.identity();

        match build_headers(&raw, identity.as_ref()) {
            Some(headers) => headers,
            None => {
                warn!("Host assertion is not a valid header value, refusing to sign");
                HeaderMap::new()
            }
        }
    }

    /// Signed headers plus `Authorization: Bearer <token>`.
    ///
    /// Still empty when there is no assertion; a bearer token alone never
    /// authorizes a call.
    pub fn sign_with_bearer(&self, token: &str) -> HeaderMap {
        let mut headers = self.sign();
        if headers.is_empty() {
            return headers;
        }
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
                headers
            }
            Err(_) => {
                warn!("Session token is not a valid header value, refusing to sign");
                HeaderMap::new()
            }
        }
    }
}

fn build_headers(raw: &str, identity: Option<&Identity>) -> Option<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(INIT_DATA_HEADER, HeaderValue::from_str(raw).ok()?);

    if let Some(identity) = identity {
        if let Some(hash) = &identity.hash {
            headers.insert(HASH_HEADER, HeaderValue::from_str(hash).ok()?);
        }
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&identity.id).ok()?);
    }

    headers.insert(CLIENT_MARKER_HEADER, HeaderValue::from_static(CLIENT_MARKER));
    headers.insert(
        REQUEST_ID_HEADER,
        HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()?,
    );
    Some(headers)
}
