// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event intake loop feeding coordinator signals and connectivity changes
//! into the session store.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::SessionStore;
use crate::event::{Connectivity, SessionSignal};

impl SessionStore {
    /// Consume signals and connectivity transitions until `shutdown` fires.
    ///
    /// The current connectivity value is applied once on entry.
    pub async fn run(
        self: Arc<Self>,
        mut signals: broadcast::Receiver<SessionSignal>,
        mut connectivity: watch::Receiver<Connectivity>,
        shutdown: CancellationToken,
    ) {
        let initial = *connectivity.borrow_and_update();
        self.on_connectivity(initial).await;
        let mut watching = true;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("shutdown, stopping session loop");
                    break;
                }
                signal = signals.recv() => match signal {
                    Ok(signal) => self.handle_signal(signal).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "session signals lagged, resyncing");
                        self.resync().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("signal channel closed, stopping session loop");
                        break;
                    }
                },
                changed = connectivity.changed(), if watching => match changed {
                    Ok(()) => {
                        let state = *connectivity.borrow_and_update();
                        debug!(online = state.is_online(), "applying connectivity");
                        self.on_connectivity(state).await;
                    }
                    Err(_) => {
                        debug!("connectivity monitor stopped");
                        watching = false;
                    }
                },
            }
        }
    }
}
