// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process fakes for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::auth::{AuthFuture, AuthService, CodeExchange, LoginGrant};
use crate::error::AuthError;
use crate::session::UserProfile;
use crate::token::TokenGrant;

/// Scriptable [`AuthService`] that counts calls.
///
/// Refresh replies are taken from a queue; when it is empty each refresh
/// mints `access-<n>` / `refresh-<n>` valid for an hour. With a gate
/// installed, refresh calls block until [`FakeAuth::release_refresh`].
#[derive(Default)]
pub struct FakeAuth {
    pub exchange_calls: AtomicU32,
    pub refresh_calls: AtomicU32,
    pub revoke_calls: AtomicU32,
    pub user_info_calls: AtomicU32,
    exchange_reply: Mutex<Option<Result<LoginGrant, AuthError>>>,
    refresh_replies: Mutex<VecDeque<Result<TokenGrant, AuthError>>>,
    revoke_reply: Mutex<Option<AuthError>>,
    user_info_reply: Mutex<Option<Result<UserProfile, AuthError>>>,
    refresh_gate: Mutex<Option<Arc<Notify>>>,
    refresh_entered: Notify,
}

impl FakeAuth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_exchange(&self, reply: Result<LoginGrant, AuthError>) {
        *self.exchange_reply.lock() = Some(reply);
    }

    pub fn push_refresh(&self, reply: Result<TokenGrant, AuthError>) {
        self.refresh_replies.lock().push_back(reply);
    }

    pub fn fail_revoke(&self, err: AuthError) {
        *self.revoke_reply.lock() = Some(err);
    }

    pub fn on_user_info(&self, reply: Result<UserProfile, AuthError>) {
        *self.user_info_reply.lock() = Some(reply);
    }

    /// Hold every refresh call until released.
    pub fn gate_refresh(&self) {
        *self.refresh_gate.lock() = Some(Arc::new(Notify::new()));
    }

    /// Let one gated refresh call proceed.
    pub fn release_refresh(&self) {
        if let Some(ref gate) = *self.refresh_gate.lock() {
            gate.notify_one();
        }
    }

    /// Wait until a refresh call has reached the service.
    pub async fn refresh_started(&self) {
        let entered = self.refresh_entered.notified();
        tokio::pin!(entered);
        entered.as_mut().enable();
        if self.refresh_calls.load(Ordering::SeqCst) > 0 {
            return;
        }
        entered.await;
    }

    pub fn refreshes(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn exchanges(&self) -> u32 {
        self.exchange_calls.load(Ordering::SeqCst)
    }
}

/// Poll `cond` until it holds, failing the test after five seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Minimal user record.
pub fn user(id: &str) -> UserProfile {
    UserProfile {
        id: id.to_owned(),
        display_name: format!("User {id}"),
        email: Some(format!("{id}@example.com")),
        avatar: None,
        provider: Some("password".to_owned()),
        created_at: None,
        updated_at: None,
        extra: serde_json::Map::new(),
    }
}

/// Grant valid for `expires_in` seconds.
pub fn grant(access: &str, refresh: Option<&str>, expires_in: Option<u64>) -> TokenGrant {
    TokenGrant {
        access_token: access.to_owned(),
        refresh_token: refresh.map(str::to_owned),
        expires_in,
        token_type: Some("Bearer".to_owned()),
    }
}

impl AuthService for FakeAuth {
    fn exchange_code<'a>(&'a self, _exchange: &'a CodeExchange) -> AuthFuture<'a, LoginGrant> {
        Box::pin(async move {
            let n = self.exchange_calls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.exchange_reply.lock().clone() {
                Some(reply) => reply,
                None => Ok(LoginGrant {
                    user: user("u-1"),
                    tokens: grant(&format!("login-access-{n}"), Some("login-refresh"), Some(3600)),
                }),
            }
        })
    }

    fn refresh<'a>(&'a self, _refresh_token: &'a str) -> AuthFuture<'a, TokenGrant> {
        Box::pin(async move {
            let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.refresh_entered.notify_waiters();
            let gate = self.refresh_gate.lock().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let scripted = self.refresh_replies.lock().pop_front();
            match scripted {
                Some(reply) => reply,
                None => Ok(grant(&format!("access-{n}"), Some(&format!("refresh-{n}")), Some(3600))),
            }
        })
    }

    fn revoke<'a>(
        &'a self,
        _access_token: &'a str,
        _refresh_token: Option<&'a str>,
    ) -> AuthFuture<'a, ()> {
        Box::pin(async move {
            self.revoke_calls.fetch_add(1, Ordering::SeqCst);
            match self.revoke_reply.lock().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }

    fn user_info<'a>(&'a self, _access_token: &'a str) -> AuthFuture<'a, UserProfile> {
        Box::pin(async move {
            self.user_info_calls.fetch_add(1, Ordering::SeqCst);
            match self.user_info_reply.lock().clone() {
                Some(reply) => reply,
                None => Ok(user("u-1")),
            }
        })
    }
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
