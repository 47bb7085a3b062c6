// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token refresh coordinator.
//!
//! Wraps every authenticated request. When the server rejects a credential,
//! exactly one refresh call is made per coordination episode no matter how
//! many requests fail concurrently; every other caller parks on a oneshot
//! and replays its own request once the shared refresh settles.
//!
//! The coordinator never writes durable storage. It keeps the live
//! credential in memory and reports outcomes as [`SessionSignal`]s for the
//! session store to persist.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::AuthService;
use crate::error::AuthError;
use crate::event::SessionSignal;
use crate::token::{now_ms, TokenPair};

/// Outcome handed to each caller parked behind an episode.
type Waiter = oneshot::Sender<Result<String, AuthError>>;

/// What started a coordination episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A request came back with its credential rejected.
    Rejected,
    /// The expiry check fired before anything failed.
    Proactive,
    /// The session store asked for a refresh.
    Explicit,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::Proactive => "proactive",
            Self::Explicit => "explicit",
        }
    }
}

/// Result of [`RefreshCoordinator::proactive_refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProactiveRefresh {
    Refreshed,
    /// Another episode was already running; nothing was started.
    AlreadyInFlight,
}

/// Diagnostic snapshot of the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinatorStatus {
    pub refresh_in_progress: bool,
    pub queued: usize,
    pub episodes: u64,
    pub has_credentials: bool,
    pub offline: bool,
}

/// Process-wide refresh coordination state. Never persisted.
#[derive(Default)]
struct Coordination {
    in_progress: bool,
    waiters: Vec<Waiter>,
}

/// In-memory credential plus a generation that changes on every
/// install/clear, so an episode that straddles a logout cannot resurrect
/// the old session.
#[derive(Default)]
struct Credentials {
    tokens: Option<TokenPair>,
    generation: u64,
}

pub struct RefreshCoordinator {
    auth: Arc<dyn AuthService>,
    credentials: RwLock<Credentials>,
    coordination: Mutex<Coordination>,
    offline: AtomicBool,
    episodes: AtomicU64,
    signal_tx: broadcast::Sender<SessionSignal>,
    margin: Duration,
    refresh_timeout: Duration,
}

impl RefreshCoordinator {
    /// Create a coordinator with no credential installed.
    ///
    /// `margin` is the expiry safety margin, `refresh_timeout` bounds each
    /// refresh call.
    pub fn new(
        auth: Arc<dyn AuthService>,
        margin: Duration,
        refresh_timeout: Duration,
    ) -> (Arc<Self>, broadcast::Receiver<SessionSignal>) {
        let (signal_tx, signal_rx) = broadcast::channel(64);
        let coordinator = Arc::new(Self {
            auth,
            credentials: RwLock::new(Credentials::default()),
            coordination: Mutex::new(Coordination::default()),
            offline: AtomicBool::new(false),
            episodes: AtomicU64::new(0),
            signal_tx,
            margin,
            refresh_timeout,
        });
        (coordinator, signal_rx)
    }

    /// Subscribe to refresh outcomes.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionSignal> {
        self.signal_tx.subscribe()
    }

    // -- Credential slot ------------------------------------------------------

    /// Install the credential used for subsequent requests.
    pub fn install(&self, tokens: TokenPair) {
        let mut creds = self.credentials.write();
        creds.tokens = Some(tokens);
        creds.generation += 1;
    }

    /// Drop the in-memory credential.
    pub fn clear(&self) {
        let mut creds = self.credentials.write();
        creds.tokens = None;
        creds.generation += 1;
    }

    pub fn tokens(&self) -> Option<TokenPair> {
        self.credentials.read().tokens.clone()
    }

    /// Changes on every install, clear and settled refresh.
    pub fn generation(&self) -> u64 {
        self.credentials.read().generation
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.read().tokens.is_some()
    }

    /// The current access token. An empty token counts as absent.
    fn access_token(&self) -> Option<String> {
        self.credentials
            .read()
            .tokens
            .as_ref()
            .map(|t| t.access_token.clone())
            .filter(|t| !t.is_empty())
    }

    /// While offline, [`execute`](Self::execute) fails fast instead of
    /// sending a credential the server has not vouched for.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }

    // -- Requests -------------------------------------------------------------

    /// Run `request` with the current access token.
    ///
    /// On [`AuthError::CredentialRejected`] the request waits for a fresh
    /// token (starting or joining the shared refresh) and is re-issued
    /// exactly once. A second rejection is returned as-is; a failed refresh
    /// returns [`AuthError::SessionExpired`].
    pub async fn execute<T, F, Fut>(self: &Arc<Self>, mut request: F) -> Result<T, AuthError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, AuthError>>,
    {
        if self.is_offline() {
            return Err(AuthError::Offline);
        }

        let presented = match self.access_token() {
            Some(token) => match request(token.clone()).await {
                Err(AuthError::CredentialRejected) => Some(token),
                other => return other,
            },
            None if self.has_credentials() => None,
            None => return Err(AuthError::SessionExpired),
        };

        debug!(has_token = presented.is_some(), "credential rejected, awaiting refresh");
        let fresh = self.fresh_token(presented.as_deref()).await?;
        match request(fresh).await {
            Err(AuthError::CredentialRejected) => {
                warn!("credential rejected again after refresh, not retrying");
                Err(AuthError::CredentialRejected)
            }
            other => other,
        }
    }

    /// Join the in-flight refresh or start one, and wait for its outcome.
    pub async fn refresh(self: &Arc<Self>) -> Result<TokenPair, AuthError> {
        let rx = {
            let mut coordination = self.coordination.lock();
            self.enqueue(&mut coordination, Trigger::Explicit)
        };
        settle(rx).await?;
        self.tokens().ok_or(AuthError::SessionExpired)
    }

    /// Start a refresh ahead of expiry. No-op while one is in flight.
    pub async fn proactive_refresh(self: &Arc<Self>) -> Result<ProactiveRefresh, AuthError> {
        let rx = {
            let mut coordination = self.coordination.lock();
            if coordination.in_progress {
                debug!("proactive refresh skipped, refresh already in flight");
                return Ok(ProactiveRefresh::AlreadyInFlight);
            }
            self.enqueue(&mut coordination, Trigger::Proactive)
        };
        settle(rx).await.map(|_| ProactiveRefresh::Refreshed)
    }

    /// True when the access token's remaining lifetime is under the margin,
    /// or when no token is held at all.
    pub fn is_expiring_soon(&self) -> bool {
        match self.credentials.read().tokens {
            Some(ref tokens) => tokens.expires_within(self.margin, now_ms()),
            None => true,
        }
    }

    pub fn status(&self) -> CoordinatorStatus {
        let (refresh_in_progress, queued) = {
            let coordination = self.coordination.lock();
            (coordination.in_progress, coordination.waiters.len())
        };
        CoordinatorStatus {
            refresh_in_progress,
            queued,
            episodes: self.episodes.load(Ordering::Relaxed),
            has_credentials: self.has_credentials(),
            offline: self.is_offline(),
        }
    }

    /// Periodically check expiry and refresh ahead of it.
    pub fn spawn_expiry_watch(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.cancelled() => {
                        debug!("shutdown, stopping expiry watch");
                        return;
                    }
                }
                if coordinator.is_offline() || !coordinator.has_credentials() {
                    continue;
                }
                if !coordinator.is_expiring_soon() {
                    continue;
                }
                match coordinator.proactive_refresh().await {
                    Ok(ProactiveRefresh::Refreshed) => debug!("proactive refresh completed"),
                    Ok(ProactiveRefresh::AlreadyInFlight) => {}
                    Err(e) => warn!(err = %e, "proactive refresh failed"),
                }
            }
        })
    }

    // -- Coordination ---------------------------------------------------------

    /// Token to replay with after `presented` was rejected.
    async fn fresh_token(self: &Arc<Self>, presented: Option<&str>) -> Result<String, AuthError> {
        let rx = {
            let mut coordination = self.coordination.lock();
            if !coordination.in_progress {
                // An episode that settled after our request left may already
                // have replaced the rejected token.
                if let (Some(presented), Some(current)) = (presented, self.access_token()) {
                    if presented != current {
                        debug!("rejected token already replaced, replaying");
                        return Ok(current);
                    }
                }
            }
            self.enqueue(&mut coordination, Trigger::Rejected)
        };
        settle(rx).await
    }

    /// Park a waiter, starting an episode if none is running. The flag is
    /// checked and set under the lock, before any suspension point.
    fn enqueue(
        self: &Arc<Self>,
        coordination: &mut Coordination,
        trigger: Trigger,
    ) -> oneshot::Receiver<Result<String, AuthError>> {
        let (tx, rx) = oneshot::channel();
        coordination.waiters.retain(|w| !w.is_closed());
        coordination.waiters.push(tx);
        if coordination.in_progress {
            debug!(queued = coordination.waiters.len(), "joined in-flight refresh");
        } else {
            coordination.in_progress = true;
            let generation = self.credentials.read().generation;
            tokio::spawn(Arc::clone(self).run_episode(trigger, generation));
        }
        rx
    }

    /// One coordination episode. Runs detached so a cancelled initiator
    /// cannot strand the queue.
    async fn run_episode(self: Arc<Self>, trigger: Trigger, generation: u64) {
        let mut guard = EpisodeGuard { coordinator: Arc::clone(&self), outcome: None };
        let episode = self.episodes.fetch_add(1, Ordering::Relaxed) + 1;
        let queued = self.coordination.lock().waiters.len();
        info!(episode, trigger = trigger.as_str(), queued, "refresh started");

        let outcome = self.perform_refresh().await;

        let result = {
            let mut creds = self.credentials.write();
            if creds.generation != generation {
                debug!(episode, "credential replaced during refresh, discarding outcome");
                match creds.tokens {
                    Some(ref tokens) => Ok(tokens.access_token.clone()),
                    None => Err(AuthError::SessionExpired),
                }
            } else {
                match outcome {
                    Ok(tokens) => {
                        let access = tokens.access_token.clone();
                        creds.tokens = Some(tokens.clone());
                        creds.generation += 1;
                        let generation = creds.generation;
                        drop(creds);
                        info!(episode, "refresh succeeded");
                        let _ = self
                            .signal_tx
                            .send(SessionSignal::TokensRefreshed { tokens, generation });
                        Ok(access)
                    }
                    Err(e) => {
                        creds.tokens = None;
                        creds.generation += 1;
                        let generation = creds.generation;
                        drop(creds);
                        warn!(episode, err = %e, "refresh failed, session expired");
                        let _ = self.signal_tx.send(SessionSignal::SessionExpired { generation });
                        Err(AuthError::SessionExpired)
                    }
                }
            }
        };
        guard.outcome = Some(result);
    }

    /// The single network call of an episode. A missing refresh token skips
    /// the call entirely.
    async fn perform_refresh(&self) -> Result<TokenPair, AuthError> {
        let current = self.tokens();
        let Some(refresh_token) = current.as_ref().and_then(|t| t.refresh_token.clone()) else {
            debug!("no refresh token, skipping refresh call");
            return Err(AuthError::SessionExpired);
        };

        let grant = match tokio::time::timeout(
            self.refresh_timeout,
            self.auth.refresh(&refresh_token),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(AuthError::Timeout),
        };

        Ok(match current {
            Some(current) => current.merged(grant),
            None => grant.into_pair(),
        })
    }
}

/// Clears the in-progress flag and resolves every waiter when an episode
/// ends, including when its task is cancelled or panics.
struct EpisodeGuard {
    coordinator: Arc<RefreshCoordinator>,
    outcome: Option<Result<String, AuthError>>,
}

impl Drop for EpisodeGuard {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or(Err(AuthError::SessionExpired));
        let waiters = {
            let mut coordination = self.coordinator.coordination.lock();
            coordination.in_progress = false;
            std::mem::take(&mut coordination.waiters)
        };
        let mut replayed = 0usize;
        for waiter in waiters {
            if waiter.send(outcome.clone()).is_ok() {
                replayed += 1;
            }
        }
        debug!(replayed, ok = outcome.is_ok(), "refresh settled");
    }
}

async fn settle(rx: oneshot::Receiver<Result<String, AuthError>>) -> Result<String, AuthError> {
    rx.await.unwrap_or(Err(AuthError::SessionExpired))
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
