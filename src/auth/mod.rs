// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication
//!
//! The launch-time state machine and the guard that keeps one Telegram
//! account from inheriting another's session.
//!
//! ## Flow
//!
//! 1. `launch()` checks the host, extracts the identity, runs the account
//!    switch guard and either resumes a stored session or asks the backend
//!    whether the identity is registered.
//! 2. The presentation layer calls `continue_login()` or `register()`
//!    depending on the published [`AuthStatus`].
//! 3. Once authenticated a heartbeat validates the token; a rejection
//!    clears the session and returns to `Checking` with the reason.

pub mod account_switch;
pub mod orchestrator;
pub mod state;

pub use account_switch::reconcile;
pub use orchestrator::AuthOrchestrator;
pub use state::{AuthPhase, AuthStatus};
