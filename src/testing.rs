// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scripted fakes shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::json;

use crate::backend::{
    AuthGrant, Backend, BackendError, CheckUserResponse, Envelope, ProfilePreview,
    RegistrationForm, TokenValidity, UserLookup,
};
use crate::feedback::Feedback;
use crate::host::{HostBridge, Identity, StaticHost};
use crate::storage::{KeyValueStore, MemoryStore, StorageError, StorageResult, WriteBatch};

/// Behavior of the fake validation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateMode {
    Valid,
    Invalid,
    Unauthorized,
    NetworkDown,
}

type Reply<T> = Result<Envelope<T>, BackendError>;

/// Backend that replays queued replies.
///
/// Empty check/login/register queues answer with a network error so an
/// unexpected call fails loudly in assertions.
pub struct FakeBackend {
    check: Mutex<VecDeque<Reply<CheckUserResponse>>>,
    login: Mutex<VecDeque<Reply<AuthGrant>>>,
    register: Mutex<VecDeque<Reply<AuthGrant>>>,
    validate: Mutex<ValidateMode>,
    validate_delay: Mutex<Duration>,
    check_calls: AtomicUsize,
    login_calls: AtomicUsize,
    validate_calls: AtomicUsize,
    last_validate_headers: Mutex<Option<HeaderMap>>,
    forms: Mutex<Vec<RegistrationForm>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            check: Mutex::new(VecDeque::new()),
            login: Mutex::new(VecDeque::new()),
            register: Mutex::new(VecDeque::new()),
            validate: Mutex::new(ValidateMode::Valid),
            validate_delay: Mutex::new(Duration::ZERO),
            check_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
            last_validate_headers: Mutex::new(None),
            forms: Mutex::new(Vec::new()),
        }
    }
}

impl FakeBackend {
    pub fn push_check(&self, reply: Reply<CheckUserResponse>) {
        self.check.lock().unwrap().push_back(reply);
    }

    pub fn push_login(&self, reply: Reply<AuthGrant>) {
        self.login.lock().unwrap().push_back(reply);
    }

    pub fn push_register(&self, reply: Reply<AuthGrant>) {
        self.register.lock().unwrap().push_back(reply);
    }

    pub fn registered(&self) {
        self.push_check(Ok(Envelope::ok(CheckUserResponse {
            is_registered: true,
            preview: Some(ProfilePreview {
                name: Some("Asha Verma".into()),
                photo: None,
            }),
            ..CheckUserResponse::default()
        })));
    }

    pub fn unregistered(&self) {
        self.push_check(Ok(Envelope::ok(CheckUserResponse::default())));
    }

    pub fn set_validate(&self, mode: ValidateMode) {
        *self.validate.lock().unwrap() = mode;
    }

    pub fn set_validate_delay(&self, delay: Duration) {
        *self.validate_delay.lock().unwrap() = delay;
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn last_validate_headers(&self) -> Option<HeaderMap> {
        self.last_validate_headers.lock().unwrap().clone()
    }

    pub fn forms(&self) -> Vec<RegistrationForm> {
        self.forms.lock().unwrap().clone()
    }
}

fn unscripted<T>() -> Reply<T> {
    Err(BackendError::Network("no scripted reply".into()))
}

#[async_trait]
impl Backend for FakeBackend {
    async fn check_user(
        &self,
        _headers: HeaderMap,
        _request: &UserLookup,
    ) -> Result<Envelope<CheckUserResponse>, BackendError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.check.lock().unwrap().pop_front();
        reply.unwrap_or_else(unscripted)
    }

    async fn login_user(
        &self,
        _headers: HeaderMap,
        _request: &UserLookup,
    ) -> Result<Envelope<AuthGrant>, BackendError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.login.lock().unwrap().pop_front();
        reply.unwrap_or_else(unscripted)
    }

    async fn register_user(
        &self,
        _headers: HeaderMap,
        form: &RegistrationForm,
    ) -> Result<Envelope<AuthGrant>, BackendError> {
        self.forms.lock().unwrap().push(form.clone());
        let reply = self.register.lock().unwrap().pop_front();
        reply.unwrap_or_else(unscripted)
    }

    async fn validate_token(&self, headers: HeaderMap) -> Result<TokenValidity, BackendError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_validate_headers.lock().unwrap() = Some(headers);

        let delay = *self.validate_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mode = *self.validate.lock().unwrap();
        match mode {
            ValidateMode::Valid => Ok(TokenValidity { is_valid: true }),
            ValidateMode::Invalid => Ok(TokenValidity { is_valid: false }),
            ValidateMode::Unauthorized => Err(BackendError::Unauthorized),
            ValidateMode::NetworkDown => Err(BackendError::Network("offline".into())),
        }
    }
}

/// Successful login/registration grant for `tg_id`.
pub fn grant_for(tg_id: &str, token: &str) -> AuthGrant {
    AuthGrant {
        user_data: json!({ "tg_id": tg_id, "name": "Asha Verma", "courseName": "B.Sc" }),
        token: token.to_string(),
    }
}

/// Host bridge that records feedback requests.
pub struct RecordingHost {
    inner: StaticHost,
    feedback: Mutex<Vec<Feedback>>,
}

impl RecordingHost {
    pub fn new(inner: StaticHost) -> Self {
        Self {
            inner,
            feedback: Mutex::new(Vec::new()),
        }
    }

    pub fn feedback(&self) -> Vec<Feedback> {
        self.feedback.lock().unwrap().clone()
    }
}

impl HostBridge for RecordingHost {
    fn init_data(&self) -> Option<String> {
        self.inner.init_data()
    }

    fn identity(&self) -> Option<Identity> {
        self.inner.identity()
    }

    fn notify(&self, feedback: Feedback) {
        self.feedback.lock().unwrap().push(feedback);
    }
}

/// In-memory store whose writes can be switched to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl KeyValueStore for FlakyStore {
    fn get_many(&self, keys: &[&str]) -> StorageResult<Vec<Option<String>>> {
        self.inner.get_many(keys)
    }

    fn apply(&self, batch: &WriteBatch) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.inner.apply(batch)
    }
}
