// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session store: the single authoritative copy of who is signed in.

use std::collections::VecDeque;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::purge::OfflineContent;
use super::transition::{self, Cause};
use super::{AuthState, Session, SessionMode, UserProfile};
use crate::auth::{AuthService, CodeExchange};
use crate::coordinator::RefreshCoordinator;
use crate::error::AuthError;
use crate::event::{Connectivity, SessionSignal, ViewEvent};
use crate::storage::SessionVault;
use crate::token::{now_ms, TokenPair};

/// Completed login attempts remembered for duplicate detection.
const LOGIN_HISTORY: usize = 16;

/// Outcome of a login attempt, keyed by its parameters.
struct LoginAttempt {
    fingerprint: String,
    outcome: Result<(), AuthError>,
}

/// Owns the live [`Session`] and every durable write.
///
/// Network access is limited to the code exchange, revocation and
/// reconnect validation; token refresh goes through the coordinator.
pub struct SessionStore {
    coordinator: Arc<RefreshCoordinator>,
    auth: Arc<dyn AuthService>,
    vault: SessionVault,
    session: RwLock<Session>,
    view_tx: broadcast::Sender<ViewEvent>,
    /// Serializes logins and remembers recent ones for duplicate detection.
    login_gate: tokio::sync::Mutex<VecDeque<LoginAttempt>>,
    offline_content: Mutex<Vec<Arc<dyn OfflineContent>>>,
    landing: String,
}

impl SessionStore {
    pub fn new(
        coordinator: Arc<RefreshCoordinator>,
        auth: Arc<dyn AuthService>,
        vault: SessionVault,
        landing: impl Into<String>,
    ) -> Arc<Self> {
        let (view_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            coordinator,
            auth,
            vault,
            session: RwLock::new(Session::default()),
            view_tx,
            login_gate: tokio::sync::Mutex::new(VecDeque::new()),
            offline_content: Mutex::new(Vec::new()),
            landing: landing.into(),
        })
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Read-only snapshot for the view layer.
    pub fn auth_state(&self) -> AuthState {
        AuthState::from(&*self.session.read())
    }

    pub fn mode(&self) -> SessionMode {
        self.session.read().mode
    }

    /// Subscribe to navigation, mode and expiry events.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.view_tx.subscribe()
    }

    /// Register a subsystem whose offline content is purged when the
    /// session ends.
    pub fn register_offline_content(&self, content: Arc<dyn OfflineContent>) {
        self.offline_content.lock().push(content);
    }

    // -- Startup --------------------------------------------------------------

    /// Restore the session from durable storage.
    ///
    /// A complete live record resumes online. Otherwise a cached snapshot
    /// resumes offline. Otherwise the session stays unauthenticated.
    pub fn startup(&self) -> SessionMode {
        if self.mode().is_authenticated() {
            debug!("session already resolved, skipping startup");
            return self.mode();
        }

        let live = self.vault.load_live().unwrap_or_else(|e| {
            warn!(err = %e, "failed to read live session, ignoring it");
            None
        });
        if let Some((user, tokens)) = live {
            self.coordinator.install(tokens.clone());
            self.coordinator.set_offline(false);
            if let Err(e) = self.vault.save_snapshot(&user) {
                warn!(err = %e, "failed to mirror cached session");
            }
            self.commit(Session::online(user, tokens), Cause::Startup);
            return SessionMode::AuthenticatedOnline;
        }

        let snapshot = self.vault.load_snapshot().unwrap_or_else(|e| {
            warn!(err = %e, "failed to read cached session, ignoring it");
            None
        });
        if let Some(snapshot) = snapshot {
            self.coordinator.set_offline(true);
            let session = Session {
                user: Some(snapshot.user),
                tokens: None,
                mode: SessionMode::AuthenticatedOffline,
            };
            self.commit(session, Cause::Startup);
            return SessionMode::AuthenticatedOffline;
        }

        debug!("no stored session");
        SessionMode::Unauthenticated
    }

    // -- Login / logout -------------------------------------------------------

    /// Exchange an authorization code and sign in.
    ///
    /// Repeating a recent (code, redirect, state) triple never exchanges the
    /// code twice. A repeat of a failed attempt returns the same error. A
    /// repeat of a successful one returns the current state while signed in,
    /// and fails once that session has ended. Signing in while already
    /// authenticated is rejected; log out first.
    pub async fn login(&self, exchange: CodeExchange) -> Result<AuthState, AuthError> {
        let fingerprint = login_fingerprint(&exchange);
        let mut history = self.login_gate.lock().await;

        if let Some(attempt) = history.iter().find(|a| a.fingerprint == fingerprint) {
            debug!("duplicate login ignored");
            return match attempt.outcome {
                Err(ref e) => Err(e.clone()),
                Ok(()) if self.mode().is_authenticated() => Ok(self.auth_state()),
                Ok(()) => Err(AuthError::LoginFailed("authorization code already used".into())),
            };
        }
        if self.mode().is_authenticated() {
            return Err(AuthError::AlreadyAuthenticated);
        }

        let outcome = match self.auth.exchange_code(&exchange).await {
            Ok(grant) => {
                let tokens = grant.tokens.into_pair();
                self.sign_in(grant.user, tokens)
            }
            Err(e) => {
                warn!(err = %e, "authorization code exchange failed");
                Err(match e {
                    AuthError::LoginFailed(_) => e,
                    other => AuthError::LoginFailed(other.to_string()),
                })
            }
        };
        if history.len() == LOGIN_HISTORY {
            history.pop_front();
        }
        history.push_back(LoginAttempt { fingerprint, outcome: outcome.clone() });
        drop(history);

        outcome?;
        let _ = self.view_tx.send(ViewEvent::Navigate { to: self.landing.clone() });
        Ok(self.auth_state())
    }

    fn sign_in(&self, user: UserProfile, tokens: TokenPair) -> Result<(), AuthError> {
        if self.mode().is_authenticated() {
            return Err(AuthError::AlreadyAuthenticated);
        }
        self.coordinator.install(tokens.clone());
        self.coordinator.set_offline(false);
        self.persist_user(&user);
        self.persist_tokens(&tokens);
        self.commit(Session::online(user, tokens), Cause::Login);
        Ok(())
    }

    /// Sign out. Revocation is best effort; the local session is always
    /// cleared.
    pub async fn logout(&self) -> AuthState {
        if let Some(tokens) = self.coordinator.tokens() {
            let refresh = tokens.refresh_token.as_deref();
            match self.auth.revoke(&tokens.access_token, refresh).await {
                Ok(()) => debug!("refresh token revoked"),
                Err(e) => warn!(err = %e, "revoke failed, clearing locally anyway"),
            }
        }
        self.clear_local(Cause::Logout).await;
        self.auth_state()
    }

    /// Refresh through the coordinator. A failed refresh ends the session.
    pub async fn refresh_access_token(&self) -> Result<AuthState, AuthError> {
        match self.coordinator.refresh().await {
            Ok(tokens) => {
                self.apply_tokens(tokens);
                Ok(self.auth_state())
            }
            Err(e) => {
                self.clear_local(Cause::Expired).await;
                Err(e)
            }
        }
    }

    // -- Event intake ---------------------------------------------------------

    /// Apply a coordinator signal. Signals about a credential the
    /// coordinator no longer holds are dropped.
    pub async fn handle_signal(&self, signal: SessionSignal) {
        let current = self.coordinator.generation();
        if signal.generation() != current {
            debug!(signal = signal.generation(), current, "stale session signal dropped");
            return;
        }
        match signal {
            SessionSignal::TokensRefreshed { tokens, .. } => self.apply_tokens(tokens),
            SessionSignal::SessionExpired { .. } => self.clear_local(Cause::Expired).await,
        }
    }

    /// React to a connectivity transition.
    pub async fn on_connectivity(&self, connectivity: Connectivity) {
        match connectivity {
            Connectivity::Offline => self.went_offline(),
            Connectivity::Online => self.reconcile().await,
        }
    }

    fn went_offline(&self) {
        let mut next = self.session.read().clone();
        if next.mode != SessionMode::AuthenticatedOnline {
            return;
        }
        self.coordinator.set_offline(true);
        next.mode = SessionMode::AuthenticatedOffline;
        self.commit(next, Cause::WentOffline);
    }

    /// Re-validate an offline identity with the server.
    ///
    /// A transient failure keeps the session offline. A rejected token is
    /// refreshed once; if that fails the session ends.
    async fn reconcile(&self) {
        if self.mode() != SessionMode::AuthenticatedOffline {
            return;
        }
        let Some(tokens) = self.coordinator.tokens() else {
            debug!("no credential to re-validate, staying offline");
            return;
        };

        // An expired or missing access token goes straight to refresh.
        let validated = if tokens.access_token.is_empty() || tokens.is_expired(now_ms()) {
            Err(AuthError::CredentialRejected)
        } else {
            self.auth.user_info(&tokens.access_token).await
        };
        let user = match validated {
            Ok(user) => user,
            Err(AuthError::CredentialRejected) => {
                let tokens = match self.coordinator.refresh().await {
                    Ok(tokens) => tokens,
                    Err(e) => {
                        info!(err = %e, "cached credential could not be renewed");
                        self.clear_local(Cause::Expired).await;
                        return;
                    }
                };
                match self.auth.user_info(&tokens.access_token).await {
                    Ok(user) => user,
                    Err(e) => {
                        info!(err = %e, "re-validation failed, staying offline");
                        return;
                    }
                }
            }
            Err(e) => {
                info!(err = %e, "re-validation failed, staying offline");
                return;
            }
        };

        let Some(tokens) = self.coordinator.tokens() else {
            debug!("session cleared during re-validation");
            return;
        };
        let mut next = self.session.read().clone();
        if next.mode != SessionMode::AuthenticatedOffline {
            return;
        }
        self.coordinator.set_offline(false);
        self.persist_user(&user);
        self.persist_tokens(&tokens);
        next.user = Some(user);
        next.tokens = Some(tokens);
        next.mode = SessionMode::AuthenticatedOnline;
        self.commit(next, Cause::Reconciled);
    }

    /// Bring the session back in line with the coordinator after missed
    /// signals.
    pub(super) async fn resync(&self) {
        let session = self.session.read().clone();
        if !session.mode.is_authenticated() {
            return;
        }
        match self.coordinator.tokens() {
            Some(tokens) if session.tokens.as_ref() != Some(&tokens) => self.apply_tokens(tokens),
            Some(_) => {}
            None if session.tokens.is_some() => self.clear_local(Cause::Expired).await,
            None => {}
        }
    }

    // -- Internals ------------------------------------------------------------

    /// Merge refreshed tokens into the live session and durable storage.
    fn apply_tokens(&self, tokens: TokenPair) {
        let user = {
            let mut session = self.session.write();
            if !session.mode.is_authenticated() {
                debug!("refreshed tokens arrived after sign-out, ignoring");
                return;
            }
            session.tokens = Some(tokens.clone());
            session.user.clone()
        };
        self.persist_tokens(&tokens);
        debug!(expires_at_ms = ?tokens.expires_at_ms, "tokens updated");
        if let Some(user) = user {
            self.persist_snapshot(&user);
        }
    }

    /// Local half of logout: drop credentials, durable state and offline
    /// content, then fall back to unauthenticated.
    async fn clear_local(&self, cause: Cause) {
        self.coordinator.clear();
        self.coordinator.set_offline(false);
        let previous = std::mem::take(&mut *self.session.write());

        if let Err(e) = self.vault.clear_all() {
            warn!(err = %e, "failed to clear stored session");
        }
        if let Some(ref user) = previous.user {
            self.purge_offline(&user.id).await;
        }

        if !previous.mode.is_authenticated() {
            return;
        }
        self.announce(previous.mode, SessionMode::Unauthenticated, cause);
        if cause == Cause::Expired {
            let _ = self.view_tx.send(ViewEvent::SessionExpired);
        }
    }

    async fn purge_offline(&self, user_id: &str) {
        let owners: Vec<_> = self.offline_content.lock().clone();
        let results =
            futures_util::future::join_all(owners.iter().map(|owner| owner.purge(user_id))).await;
        for (owner, result) in owners.iter().zip(results) {
            if let Err(e) = result {
                warn!(owner = owner.name(), err = %e, "offline content purge failed");
            }
        }
    }

    /// Replace the live session, validating the mode change.
    fn commit(&self, next: Session, cause: Cause) {
        let to = next.mode;
        let from = {
            let mut session = self.session.write();
            let from = session.mode;
            if from != to && !transition::is_valid(from, to, cause) {
                warn!(from = %from, to = %to, cause = cause.as_str(), "invalid transition refused");
                return;
            }
            *session = next;
            from
        };
        if from != to {
            self.announce(from, to, cause);
        }
    }

    fn announce(&self, from: SessionMode, to: SessionMode, cause: Cause) {
        info!(from = %from, to = %to, cause = cause.as_str(), "session mode changed");
        let _ = self.view_tx.send(ViewEvent::ModeChanged { from, to });
    }

    fn persist_user(&self, user: &UserProfile) {
        if let Err(e) = self.vault.save_user(user) {
            warn!(err = %e, "failed to persist user");
        }
        self.persist_snapshot(user);
    }

    fn persist_tokens(&self, tokens: &TokenPair) {
        if let Err(e) = self.vault.save_tokens(tokens) {
            warn!(err = %e, "failed to persist tokens");
        }
    }

    fn persist_snapshot(&self, user: &UserProfile) {
        if let Err(e) = self.vault.save_snapshot(user) {
            warn!(err = %e, "failed to persist cached session");
        }
    }
}

/// Stable key for a login attempt. The single-use code is hashed rather
/// than retained.
pub fn login_fingerprint(exchange: &CodeExchange) -> String {
    let mut hasher = Sha256::new();
    for part in [Some(exchange.code.as_str()), Some(exchange.redirect_uri.as_str()), exchange.state.as_deref()] {
        match part {
            Some(value) => {
                hasher.update([1u8]);
                hasher.update((value.len() as u64).to_be_bytes());
                hasher.update(value.as_bytes());
            }
            None => hasher.update([0u8]),
        }
    }
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
