// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Host Bridge
//!
//! The chat-platform host (Telegram) injects the current user's signed
//! identity assertion into the mini app. This module wraps that bridge
//! behind [`HostBridge`] so the rest of the crate never touches ambient
//! globals, and tests can substitute a fake host.
//!
//! - [`Identity`]: parsed identity for the current launch
//! - [`RequestSigner`]: header set attached to every backend call
//! - [`is_hosted`]: environment guard gating the whole subsystem

pub mod identity;
pub mod signing;

use thiserror::Error;
use tracing::{debug, warn};

pub use identity::Identity;
pub use signing::RequestSigner;

use crate::feedback::Feedback;

/// Errors reading the host bridge.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("host did not provide init data")]
    MissingInitData,

    #[error("host init data has no user")]
    MissingUser,

    #[error("host user payload is malformed: {0}")]
    MalformedUser(String),
}

/// Narrow view of the embedding host.
pub trait HostBridge: Send + Sync {
    /// Raw signed init data, if the host supplied any.
    fn init_data(&self) -> Option<String>;

    /// Identity for the current launch.
    fn identity(&self) -> Option<Identity>;

    /// Haptic/alert feedback. Hosts without feedback support ignore it.
    fn notify(&self, _feedback: Feedback) {}
}

/// Environment guard: true only when the host exposes a non-empty
/// signed assertion.
pub fn is_hosted(host: &dyn HostBridge) -> bool {
    host.init_data().is_some_and(|raw| !raw.trim().is_empty())
}

/// Host bridge backed by a fixed init data string.
///
/// Used by the driver binary (init data passed in through the environment)
/// and by tests.
#[derive(Debug, Clone, Default)]
pub struct StaticHost {
    init_data: Option<String>,
    identity: Option<Identity>,
}

impl StaticHost {
    /// Build from a raw init data string.
    ///
    /// An unparsable user payload still counts as hosted (the assertion is
    /// present) but yields no identity.
    pub fn from_init_data(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let identity = match Identity::from_init_data(&raw) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!(error = %e, "Host init data has no usable identity");
                None
            }
        };
        Self {
            init_data: Some(raw).filter(|r| !r.trim().is_empty()),
            identity,
        }
    }

    /// A bridge for a client opened outside the host.
    pub fn detached() -> Self {
        Self::default()
    }
}

impl HostBridge for StaticHost {
    fn init_data(&self) -> Option<String> {
        self.init_data.clone()
    }

    fn identity(&self) -> Option<Identity> {
        self.identity.clone()
    }

    fn notify(&self, feedback: Feedback) {
        debug!(?feedback, "Host feedback");
    }
}
