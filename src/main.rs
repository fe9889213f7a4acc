// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use usg_portal_session::backend::HttpBackend;
use usg_portal_session::config::{INIT_DATA_ENV, LOG_FORMAT_ENV};
use usg_portal_session::host::StaticHost;
use usg_portal_session::storage::{FileStore, SessionStore};
use usg_portal_session::{AuthOrchestrator, AuthPhase, AuthStatus, SessionConfig};

/// Pause before relaunching after a failed existence check.
const RELAUNCH_DELAY: Duration = Duration::from_secs(5);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,usg_portal_session=debug"));

    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let config = SessionConfig::from_env()?;
    info!(
        api = %config.api_base_url,
        state = %config.state_path.display(),
        "Starting USG portal session client"
    );

    let host = match std::env::var(INIT_DATA_ENV) {
        Ok(raw) if !raw.trim().is_empty() => StaticHost::from_init_data(raw),
        _ => {
            warn!("{INIT_DATA_ENV} not set, running outside the host");
            StaticHost::detached()
        }
    };

    let backend = HttpBackend::new(&config)?;
    let store = SessionStore::new(Arc::new(FileStore::new(&config.state_path)));
    let orchestrator =
        AuthOrchestrator::new(Arc::new(host), Arc::new(backend), store, &config);

    tokio::select! {
        result = drive(&orchestrator) => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    orchestrator.unmount();
    Ok(())
}

/// Launch, continue when ready, and relaunch after every logout.
async fn drive(orchestrator: &AuthOrchestrator) -> Result<(), Box<dyn Error>> {
    let mut status = orchestrator.subscribe();

    loop {
        match orchestrator.launch().await {
            AuthPhase::Error => {
                if let AuthStatus::Error { message } = orchestrator.status() {
                    error!(%message, "Cannot start session");
                }
                return Ok(());
            }
            AuthPhase::NeedsRegistration => {
                info!("Identity is not registered; complete registration in the portal");
                return Ok(());
            }
            AuthPhase::Checking => {
                tokio::time::sleep(RELAUNCH_DELAY).await;
                continue;
            }
            AuthPhase::ReadyToLogin => {
                if let Err(e) = orchestrator.continue_login().await {
                    warn!(code = e.error_code(), "{}", e.user_message());
                    tokio::time::sleep(RELAUNCH_DELAY).await;
                    continue;
                }
            }
            AuthPhase::Authenticated => {}
        }

        if let Some(session) = orchestrator.session() {
            info!(
                name = session.profile().name().unwrap_or("unknown"),
                "Session active"
            );
        }

        while status.borrow_and_update().is_logged_in() {
            status.changed().await?;
        }

        match orchestrator.revocation() {
            Some(e) => warn!(code = e.error_code(), "{}, relaunching", e.user_message()),
            None => info!(
                reason = orchestrator.notice().unwrap_or_default(),
                "Session ended, relaunching"
            ),
        }
    }
}
