// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Heartbeat
//!
//! Background task that re-validates the session token against the backend
//! while the user is authenticated.
//!
//! ## Strategy
//!
//! Every `interval` (default 10 s) the task:
//! 1. Signs a request with the host assertion plus `Authorization: Bearer`.
//! 2. Calls `VALIDATE_TOKEN`.
//! 3. On HTTP 401 or `{"isValid": false}`, reports a [`Rejection`] once and
//!    exits. Network failures and malformed responses are logged and
//!    ignored; losing connectivity never ends a session.
//!
//! ## Shutdown
//!
//! Each running task is owned by exactly one [`HeartbeatTicket`]. Stopping
//! or dropping the ticket cancels its `CancellationToken` and aborts the
//! task. A validation result that lands after cancellation is discarded.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError};
use crate::host::RequestSigner;

/// Why the backend refused the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// HTTP 401 from the validation endpoint.
    Expired,
    /// `{"isValid": false}`: the token was superseded by another login.
    Revoked,
}

impl Rejection {
    /// Reason shown to the user after the forced logout.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::Expired => "Session Expired",
            Rejection::Revoked => "Logged in on another device",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Handle to one running heartbeat task.
#[derive(Debug)]
pub struct HeartbeatTicket {
    id: u64,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    live: Arc<AtomicUsize>,
}

impl HeartbeatTicket {
    /// Unique per monitor; compared against the ticket in the auth state.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// False once stopped.
    pub fn is_live(&self) -> bool {
        self.task.is_some() && !self.cancel.is_cancelled()
    }

    /// Cancel the task. No tick can act after this returns.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        if let Some(task) = self.task.take() {
            self.cancel.cancel();
            task.abort();
            self.live.fetch_sub(1, Ordering::SeqCst);
            debug!(ticket = self.id, "Heartbeat stopped");
        }
    }
}

impl Drop for HeartbeatTicket {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Spawns heartbeat tasks.
pub struct HeartbeatMonitor {
    backend: Arc<dyn Backend>,
    signer: RequestSigner,
    interval: Duration,
    live: Arc<AtomicUsize>,
    next_id: AtomicU64,
}

impl HeartbeatMonitor {
    /// Monitor that signs validation calls with `signer` every `interval`.
    pub fn new(backend: Arc<dyn Backend>, signer: RequestSigner, interval: Duration) -> Self {
        Self {
            backend,
            signer,
            interval,
            live: Arc::new(AtomicUsize::new(0)),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of tickets not yet stopped.
    pub fn live_tickets(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Start polling for `token`. `on_reject` runs at most once, from the
    /// task, with the ticket id and the rejection cause.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&self, token: String, on_reject: F) -> HeartbeatTicket
    where
        F: FnOnce(u64, Rejection) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            id,
            self.backend.clone(),
            self.signer.clone(),
            token,
            self.interval,
            cancel.clone(),
            on_reject,
        ));
        self.live.fetch_add(1, Ordering::SeqCst);

        HeartbeatTicket {
            id,
            cancel,
            task: Some(task),
            live: self.live.clone(),
        }
    }
}

async fn run<F>(
    id: u64,
    backend: Arc<dyn Backend>,
    signer: RequestSigner,
    token: String,
    interval: Duration,
    cancel: CancellationToken,
    on_reject: F,
) where
    F: FnOnce(u64, Rejection) + Send + 'static,
{
    info!(
        ticket = id,
        interval_ms = interval.as_millis() as u64,
        "Heartbeat starting"
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {},
            _ = cancel.cancelled() => return,
        }

        let outcome = check_once(backend.as_ref(), &signer, &token).await;

        if cancel.is_cancelled() {
            debug!(ticket = id, "Heartbeat result discarded after cancellation");
            return;
        }

        if let Some(rejection) = outcome {
            warn!(ticket = id, reason = %rejection, "Heartbeat rejected session token");
            on_reject(id, rejection);
            return;
        }
    }
}

/// One validation round. `None` means keep the session.
async fn check_once(backend: &dyn Backend, signer: &RequestSigner, token: &str) -> Option<Rejection> {
    let headers = signer.sign_with_bearer(token);
    if headers.is_empty() {
        warn!("Heartbeat skipped: no host assertion to sign with");
        return None;
    }

    match backend.validate_token(headers).await {
        Ok(validity) if validity.is_valid => None,
        Ok(_) => Some(Rejection::Revoked),
        Err(BackendError::Unauthorized) => Some(Rejection::Expired),
        Err(e) => {
            debug!(error = %e, "Heartbeat check failed, keeping session");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::identity::fixtures::init_data_for;
    use crate::host::StaticHost;
    use crate::testing::{FakeBackend, ValidateMode};
    use reqwest::header::AUTHORIZATION;
    use std::sync::Mutex;

    const INTERVAL: Duration = Duration::from_secs(10);

    fn monitor(backend: Arc<FakeBackend>) -> HeartbeatMonitor {
        let signer =
            RequestSigner::new(Arc::new(StaticHost::from_init_data(init_data_for(42, "Asha"))));
        HeartbeatMonitor::new(backend, signer, INTERVAL)
    }

    fn recorder() -> (Arc<Mutex<Vec<(u64, Rejection)>>>, impl FnOnce(u64, Rejection) + Send) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |id, rejection| sink.lock().unwrap().push((id, rejection)))
    }

    #[tokio::test(start_paused = true)]
    async fn valid_token_keeps_polling() {
        let backend = Arc::new(FakeBackend::default());
        let monitor = monitor(backend.clone());
        let (seen, on_reject) = recorder();

        let ticket = monitor.start("t1".into(), on_reject);
        tokio::time::sleep(Duration::from_secs(35)).await;

        assert_eq!(backend.validate_calls(), 3);
        assert!(seen.lock().unwrap().is_empty());
        assert!(ticket.is_live());
        let headers = backend.last_validate_headers().unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer t1");
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_reports_expired_once() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_validate(ValidateMode::Unauthorized);
        let monitor = monitor(backend.clone());
        let (seen, on_reject) = recorder();

        let ticket = monitor.start("t1".into(), on_reject);
        tokio::time::sleep(Duration::from_secs(45)).await;

        assert_eq!(*seen.lock().unwrap(), vec![(ticket.id(), Rejection::Expired)]);
        assert_eq!(backend.validate_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_flag_reports_revoked() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_validate(ValidateMode::Invalid);
        let monitor = monitor(backend.clone());
        let (seen, on_reject) = recorder();

        let _ticket = monitor.start("t1".into(), on_reject);
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(seen.lock().unwrap()[0].1, Rejection::Revoked);
        assert_eq!(Rejection::Revoked.to_string(), "Logged in on another device");
    }

    #[tokio::test(start_paused = true)]
    async fn network_failures_never_reject() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_validate(ValidateMode::NetworkDown);
        let monitor = monitor(backend.clone());
        let (seen, on_reject) = recorder();

        let ticket = monitor.start("t1".into(), on_reject);
        tokio::time::sleep(Duration::from_secs(55)).await;

        assert_eq!(backend.validate_calls(), 5);
        assert!(seen.lock().unwrap().is_empty());
        assert!(ticket.is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_ticket_stops_ticking() {
        let backend = Arc::new(FakeBackend::default());
        let monitor = monitor(backend.clone());
        let (_seen, on_reject) = recorder();

        let ticket = monitor.start("t1".into(), on_reject);
        assert_eq!(monitor.live_tickets(), 1);
        tokio::time::sleep(Duration::from_secs(15)).await;
        ticket.stop();
        assert_eq!(monitor.live_tickets(), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(backend.validate_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_result_after_stop_is_discarded() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_validate(ValidateMode::Unauthorized);
        backend.set_validate_delay(Duration::from_secs(5));
        let monitor = monitor(backend.clone());
        let (seen, on_reject) = recorder();

        let ticket = monitor.start("t1".into(), on_reject);
        // Tick fires at 10 s; the response is due at 15 s.
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(backend.validate_calls(), 1);
        ticket.stop();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_ticket_cancels_task() {
        let backend = Arc::new(FakeBackend::default());
        let monitor = monitor(backend.clone());
        let (_seen, on_reject) = recorder();

        drop(monitor.start("t1".into(), on_reject));
        assert_eq!(monitor.live_tickets(), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.validate_calls(), 0);
    }
}
