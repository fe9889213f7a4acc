// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The authentication orchestrator.
//!
//! Single writer of [`AuthState`]. Drives the backend handshake, persists
//! the session atomically, owns the heartbeat ticket, and performs logout.
//!
//! Every transition happens under one short-lived lock that is never held
//! across an await. Each launch bumps an epoch; a backend reply that
//! arrives after a newer launch or a logout is dropped instead of applied.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::account_switch::reconcile;
use super::state::{AuthPhase, AuthState, AuthStatus};
use crate::backend::{
    AuthGrant, Backend, BackendError, CheckUserResponse, Envelope, ProfilePreview,
    RegistrationForm, UserLookup,
};
use crate::config::{CheckFailurePolicy, SessionConfig};
use crate::error::{SessionError, NETWORK_FAILURE_MESSAGE};
use crate::feedback::Feedback;
use crate::heartbeat::{HeartbeatMonitor, Rejection};
use crate::host::{is_hosted, HostBridge, Identity, RequestSigner};
use crate::storage::{Profile, Session, SessionStore};

const NOT_HOSTED_MESSAGE: &str = "Please open this app from Telegram.";
const NO_IDENTITY_MESSAGE: &str = "Telegram did not share your account details.";
const LOGIN_FAILED: &str = "Login Failed";
const REGISTRATION_FAILED: &str = "Registration Failed";

/// Everything guarded by the state lock.
struct Machine {
    state: AuthState,
    /// Incremented on every launch, logout and unmount.
    epoch: u64,
    identity: Option<Identity>,
    /// Carried-forward logout reason, cleared on authentication.
    notice: Option<String>,
    /// Set when the backend ended the last session.
    rejection: Option<Rejection>,
    /// Token of an ended session whose record could not be cleared. Never
    /// resumed.
    revoked_token: Option<String>,
}

struct Shared {
    host: Arc<dyn HostBridge>,
    signer: RequestSigner,
    backend: Arc<dyn Backend>,
    store: SessionStore,
    heartbeat: HeartbeatMonitor,
    check_failure: CheckFailurePolicy,
    machine: Mutex<Machine>,
    status_tx: watch::Sender<AuthStatus>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Machine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap in a new state and publish it. The previous state is returned
    /// so the caller decides when its heartbeat ticket goes away.
    fn transition(&self, machine: &mut Machine, next: AuthState) -> AuthState {
        let previous = std::mem::replace(&mut machine.state, next);
        debug!(from = %previous.phase(), to = %machine.state.phase(), "Auth transition");
        self.status_tx.send_replace(machine.state.status());
        previous
    }

    /// Clear the session, stop the heartbeat, return to `Checking`.
    fn end_session(&self, machine: &mut Machine, reason: Option<String>) {
        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to clear session during logout, blocking its resumption");
            if let AuthState::Authenticated { session, .. } = &machine.state {
                machine.revoked_token = Some(session.token().to_string());
            }
        }
        machine.epoch += 1;
        machine.notice = reason.clone();
        machine.rejection = None;

        let previous = std::mem::replace(
            &mut machine.state,
            AuthState::Checking {
                reason: reason.clone(),
            },
        );
        if let AuthState::Authenticated { heartbeat, .. } = previous {
            heartbeat.stop();
        }
        self.status_tx.send_replace(machine.state.status());
        info!(reason = reason.as_deref().unwrap_or(""), "Logged out");
    }

    /// Heartbeat rejection. Ignored unless `ticket_id` is the live ticket.
    fn force_logout(&self, ticket_id: u64, rejection: Rejection) {
        {
            let mut machine = self.lock();
            match &machine.state {
                AuthState::Authenticated { heartbeat, .. } if heartbeat.id() == ticket_id => {}
                _ => {
                    debug!(ticket = ticket_id, "Ignoring rejection from stale heartbeat");
                    return;
                }
            }
            self.end_session(&mut machine, Some(rejection.reason().to_string()));
            machine.rejection = Some(rejection);
        }
        self.host.notify(Feedback::ERROR);
    }
}

/// Drives one mounted client's authentication.
pub struct AuthOrchestrator {
    shared: Arc<Shared>,
}

impl AuthOrchestrator {
    /// Wire the orchestrator to its host, backend and store. Starts in
    /// `Checking`; nothing happens until [`launch`](Self::launch).
    pub fn new(
        host: Arc<dyn HostBridge>,
        backend: Arc<dyn Backend>,
        store: SessionStore,
        config: &SessionConfig,
    ) -> Self {
        let signer = RequestSigner::new(host.clone());
        let heartbeat =
            HeartbeatMonitor::new(backend.clone(), signer.clone(), config.heartbeat_interval);
        let initial = AuthState::Checking { reason: None };
        let (status_tx, _) = watch::channel(initial.status());

        Self {
            shared: Arc::new(Shared {
                host,
                signer,
                backend,
                store,
                heartbeat,
                check_failure: config.check_failure,
                machine: Mutex::new(Machine {
                    state: initial,
                    epoch: 0,
                    identity: None,
                    notice: None,
                    rejection: None,
                    revoked_token: None,
                }),
                status_tx,
            }),
        }
    }

    // ========== Observation ==========

    /// Snapshot of the current state.
    pub fn status(&self) -> AuthStatus {
        self.shared.lock().state.status()
    }

    /// Current state discriminant.
    pub fn phase(&self) -> AuthPhase {
        self.shared.lock().state.phase()
    }

    /// Receive every published status.
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.shared.status_tx.subscribe()
    }

    /// True only in `Authenticated`.
    pub fn is_logged_in(&self) -> bool {
        self.phase() == AuthPhase::Authenticated
    }

    /// The active session, if authenticated.
    pub fn session(&self) -> Option<Session> {
        match &self.shared.lock().state {
            AuthState::Authenticated { session, .. } => Some(session.clone()),
            _ => None,
        }
    }

    /// Token of the active session, if authenticated.
    pub fn token(&self) -> Option<String> {
        self.session().map(|s| s.token().to_string())
    }

    /// Reason for the last logout, until the next authentication.
    pub fn notice(&self) -> Option<String> {
        self.shared.lock().notice.clone()
    }

    /// Identity extracted by the last launch.
    pub fn identity(&self) -> Option<Identity> {
        self.shared.lock().identity.clone()
    }

    /// [`SessionError::TokenInvalid`] when the backend ended the last
    /// session, until the next authentication.
    pub fn revocation(&self) -> Option<SessionError> {
        self.shared.lock().rejection.map(SessionError::from)
    }

    /// Id of the running heartbeat ticket, if authenticated.
    pub fn heartbeat_ticket(&self) -> Option<u64> {
        match &self.shared.lock().state {
            AuthState::Authenticated { heartbeat, .. } => Some(heartbeat.id()),
            _ => None,
        }
    }

    /// Heartbeat tasks still running. At most one.
    pub fn live_heartbeats(&self) -> usize {
        self.shared.heartbeat.live_tickets()
    }

    // ========== Transitions ==========

    /// Run the launch flow from `Checking`.
    ///
    /// Also used to restart after a logout. Returns the phase reached.
    pub async fn launch(&self) -> AuthPhase {
        let shared = &self.shared;

        let (epoch, identity) = {
            let mut machine = shared.lock();
            machine.epoch += 1;
            let reason = machine.notice.clone();
            let previous = shared.transition(&mut machine, AuthState::Checking { reason });
            if let AuthState::Authenticated { heartbeat, .. } = previous {
                heartbeat.stop();
            }

            if !is_hosted(shared.host.as_ref()) {
                error!("Not running inside the Telegram host");
                shared.transition(
                    &mut machine,
                    AuthState::Error {
                        message: NOT_HOSTED_MESSAGE.to_string(),
                    },
                );
                return AuthPhase::Error;
            }

            let Some(identity) = shared.host.identity() else {
                error!("Host assertion carries no usable identity");
                shared.transition(
                    &mut machine,
                    AuthState::Error {
                        message: NO_IDENTITY_MESSAGE.to_string(),
                    },
                );
                return AuthPhase::Error;
            };
            machine.identity = Some(identity.clone());

            // The guard runs before the first read of the store.
            let restored = match reconcile(&shared.store, &identity) {
                Ok(restored) => restored,
                Err(e) => {
                    warn!(error = %e, "Stored session unreadable, treating as absent");
                    None
                }
            };
            let restored = match restored {
                Some(session) if machine.revoked_token.as_deref() == Some(session.token()) => {
                    match shared.store.clear() {
                        Ok(()) => {
                            info!(identity_id = %identity.id, "Cleared leftover revoked session");
                            machine.revoked_token = None;
                        }
                        Err(e) => warn!(error = %e, "Revoked session still stored, ignoring it"),
                    }
                    None
                }
                other => other,
            };

            if let Some(session) = restored {
                info!(identity_id = %identity.id, "Resuming stored session");
                self.enter_authenticated(&mut machine, session);
                return AuthPhase::Authenticated;
            }

            (machine.epoch, identity)
        };

        let headers = shared.signer.sign();
        if headers.is_empty() {
            let mut machine = shared.lock();
            if machine.epoch == epoch {
                shared.transition(
                    &mut machine,
                    AuthState::Error {
                        message: NOT_HOSTED_MESSAGE.to_string(),
                    },
                );
            }
            return machine.state.phase();
        }

        let lookup = UserLookup {
            tg_id: identity.id.clone(),
        };
        let outcome = shared.backend.check_user(headers, &lookup).await;
        self.apply_check(epoch, &identity, outcome)
    }

    fn apply_check(
        &self,
        epoch: u64,
        identity: &Identity,
        outcome: Result<Envelope<CheckUserResponse>, BackendError>,
    ) -> AuthPhase {
        let shared = &self.shared;
        let mut machine = shared.lock();
        if machine.epoch != epoch {
            debug!("Existence check superseded, discarding result");
            return machine.state.phase();
        }

        let response = match outcome {
            Ok(envelope) => envelope.into_result(NETWORK_FAILURE_MESSAGE),
            Err(e) => Err(e.to_string()),
        };

        let next = match response {
            Ok(response) if response.is_registered => {
                if let (Some(user_data), Some(token)) = (response.user_data, response.token) {
                    let grant = AuthGrant { user_data, token };
                    match self.authenticate_locked(&mut machine, identity, grant) {
                        Ok(()) => return AuthPhase::Authenticated,
                        Err(e) => warn!(error = %e, "Grant in existence check unusable, asking for login"),
                    }
                }
                info!(identity_id = %identity.id, "Identity registered, ready to login");
                AuthState::ReadyToLogin {
                    preview: response
                        .preview
                        .unwrap_or_else(|| ProfilePreview::from_identity(identity)),
                }
            }
            Ok(_) => {
                info!(identity_id = %identity.id, "Identity not registered");
                AuthState::NeedsRegistration {
                    prefill: RegistrationForm::prefilled(identity),
                }
            }
            Err(cause) => match shared.check_failure {
                // Known gap: an outage sends registered users to the
                // registration form.
                CheckFailurePolicy::AssumeUnregistered => {
                    warn!(error = %cause, "Existence check failed, assuming unregistered");
                    AuthState::NeedsRegistration {
                        prefill: RegistrationForm::prefilled(identity),
                    }
                }
                CheckFailurePolicy::Retry => {
                    warn!(error = %cause, "Existence check failed, waiting for relaunch");
                    machine.notice = Some(NETWORK_FAILURE_MESSAGE.to_string());
                    AuthState::Checking {
                        reason: Some(NETWORK_FAILURE_MESSAGE.to_string()),
                    }
                }
            },
        };

        shared.transition(&mut machine, next);
        machine.state.phase()
    }

    /// The user's "continue" action from `ReadyToLogin`.
    ///
    /// Failures leave the state unchanged so the action can be retried.
    pub async fn continue_login(&self) -> Result<(), SessionError> {
        let (epoch, identity) = self.expect_phase(AuthPhase::ReadyToLogin)?;
        self.shared.host.notify(Feedback::TAP);

        let headers = self.signed_headers()?;
        let lookup = UserLookup {
            tg_id: identity.id.clone(),
        };
        let outcome = self.shared.backend.login_user(headers, &lookup).await;
        self.finish_grant(epoch, AuthPhase::ReadyToLogin, &identity, outcome, LOGIN_FAILED)
    }

    /// Submit the registration form from `NeedsRegistration`.
    pub async fn register(&self, form: &RegistrationForm) -> Result<(), SessionError> {
        let (epoch, identity) = self.expect_phase(AuthPhase::NeedsRegistration)?;

        let headers = self.signed_headers()?;
        let outcome = self.shared.backend.register_user(headers, form).await;
        self.finish_grant(
            epoch,
            AuthPhase::NeedsRegistration,
            &identity,
            outcome,
            REGISTRATION_FAILED,
        )
    }

    /// Accept a `{profile, token}` produced by an external registration
    /// flow.
    ///
    /// Must be called from within a tokio runtime: success starts the
    /// heartbeat task.
    pub fn complete_registration(&self, grant: AuthGrant) -> Result<(), SessionError> {
        let mut machine = self.shared.lock();
        let actual = machine.state.phase();
        if actual != AuthPhase::NeedsRegistration {
            return Err(SessionError::InvalidTransition {
                expected: AuthPhase::NeedsRegistration,
                actual,
            });
        }
        let identity = machine.identity.clone().ok_or(SessionError::Environment)?;
        self.authenticate_locked(&mut machine, &identity, grant)
    }

    /// Explicit logout. Clears the session and returns to `Checking`.
    pub fn logout(&self, reason: Option<&str>) -> Result<(), SessionError> {
        let mut machine = self.shared.lock();
        let actual = machine.state.phase();
        if actual != AuthPhase::Authenticated {
            return Err(SessionError::InvalidTransition {
                expected: AuthPhase::Authenticated,
                actual,
            });
        }
        self.shared
            .end_session(&mut machine, reason.map(str::to_string));
        Ok(())
    }

    /// Stop the heartbeat without touching the stored session.
    pub fn unmount(self) {
        let mut machine = self.shared.lock();
        machine.epoch += 1;
        let previous = self
            .shared
            .transition(&mut machine, AuthState::Checking { reason: None });
        if let AuthState::Authenticated { heartbeat, .. } = previous {
            heartbeat.stop();
        }
        info!("Session client unmounted");
    }

    // ========== Internals ==========

    fn expect_phase(&self, expected: AuthPhase) -> Result<(u64, Identity), SessionError> {
        let machine = self.shared.lock();
        let actual = machine.state.phase();
        if actual != expected {
            return Err(SessionError::InvalidTransition { expected, actual });
        }
        let identity = machine.identity.clone().ok_or(SessionError::Environment)?;
        Ok((machine.epoch, identity))
    }

    fn signed_headers(&self) -> Result<reqwest::header::HeaderMap, SessionError> {
        let headers = self.shared.signer.sign();
        if headers.is_empty() {
            return Err(SessionError::Environment);
        }
        Ok(headers)
    }

    fn finish_grant(
        &self,
        epoch: u64,
        expected: AuthPhase,
        identity: &Identity,
        outcome: Result<Envelope<AuthGrant>, BackendError>,
        fallback: &str,
    ) -> Result<(), SessionError> {
        let result = match outcome {
            Ok(envelope) => envelope
                .into_result(fallback)
                .map_err(SessionError::application),
            Err(BackendError::Unauthorized) => Err(SessionError::application(fallback)),
            Err(BackendError::Unsigned) => Err(SessionError::Environment),
            Err(e) => Err(SessionError::Network(e.to_string())),
        };

        let result = result.and_then(|grant| {
            let mut machine = self.shared.lock();
            let actual = machine.state.phase();
            if machine.epoch != epoch || actual != expected {
                debug!("Grant arrived after the flow moved on, discarding");
                return Err(SessionError::InvalidTransition { expected, actual });
            }
            self.authenticate_locked(&mut machine, identity, grant)
        });

        if let Err(e) = &result {
            warn!(code = e.error_code(), error = %e, "Authentication attempt failed");
            self.shared.host.notify(Feedback::ERROR);
        }
        result
    }

    /// Persist the grant and enter `Authenticated`. Caller holds the lock
    /// and has checked the phase.
    fn authenticate_locked(
        &self,
        machine: &mut Machine,
        identity: &Identity,
        grant: AuthGrant,
    ) -> Result<(), SessionError> {
        let profile = Profile::from_value(grant.user_data)
            .ok_or_else(|| SessionError::application("Server returned no profile"))?;
        let session = Session::new(profile, grant.token, identity.id.clone())
            .map_err(|_| SessionError::application("Server returned no session token"))?;

        self.shared.store.replace(&session)?;
        self.enter_authenticated(machine, session);
        machine.notice = None;
        machine.rejection = None;
        machine.revoked_token = None;
        self.shared.host.notify(Feedback::SUCCESS);
        info!(identity_id = %identity.id, "Authenticated");
        Ok(())
    }

    /// Start the one heartbeat for `session` and publish `Authenticated`.
    fn enter_authenticated(&self, machine: &mut Machine, session: Session) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let heartbeat = self
            .shared
            .heartbeat
            .start(session.token().to_string(), move |ticket, rejection| {
                if let Some(shared) = weak.upgrade() {
                    shared.force_logout(ticket, rejection);
                }
            });

        let previous = self
            .shared
            .transition(machine, AuthState::Authenticated { session, heartbeat });
        if let AuthState::Authenticated { heartbeat, .. } = previous {
            heartbeat.stop();
        }
    }
}
