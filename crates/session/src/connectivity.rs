// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reachability probe publishing online/offline transitions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::event::Connectivity;

/// Periodically probes a URL. Any HTTP response counts as online; a
/// transport failure counts as offline.
pub struct ConnectivityMonitor {
    probe_url: String,
    interval: Duration,
    http: reqwest::Client,
    state_tx: watch::Sender<Connectivity>,
}

impl ConnectivityMonitor {
    /// Starts out assuming the network is reachable.
    pub fn new(probe_url: &str, interval: Duration, timeout: Duration) -> anyhow::Result<Self> {
        let (state_tx, _) = watch::channel(Connectivity::Online);
        Ok(Self {
            probe_url: probe_url.to_owned(),
            interval,
            http: crate::http_client(timeout)?,
            state_tx,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.state_tx.subscribe()
    }

    pub fn current(&self) -> Connectivity {
        *self.state_tx.borrow()
    }

    /// Record an observation. Subscribers are woken only on a change;
    /// returns whether one happened.
    pub fn report(&self, observed: Connectivity) -> bool {
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == observed {
                return false;
            }
            *state = observed;
            true
        });
        if changed {
            info!(online = observed.is_online(), "connectivity changed");
        }
        changed
    }

    /// Probe once and record the result.
    pub async fn probe(&self) -> Connectivity {
        let observed = match self.http.head(&self.probe_url).send().await {
            Ok(resp) => {
                debug!(status = resp.status().as_u16(), "probe answered");
                Connectivity::Online
            }
            Err(e) => {
                debug!(err = %e, "probe failed");
                Connectivity::Offline
            }
        };
        self.report(observed);
        observed
    }

    /// Probe every interval until `shutdown` fires.
    pub fn spawn(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                monitor.probe().await;
                tokio::select! {
                    _ = tokio::time::sleep(monitor.interval) => {}
                    _ = shutdown.cancelled() => {
                        debug!("shutdown, stopping connectivity monitor");
                        return;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
