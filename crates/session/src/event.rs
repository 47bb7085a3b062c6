// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process signals between the coordinator, the session store and the
//! view layer.

use serde::{Deserialize, Serialize};

use crate::session::SessionMode;
use crate::token::TokenPair;

/// Emitted by the refresh coordinator, consumed only by the session store.
///
/// Each signal carries the credential generation it produced. A signal whose
/// generation no longer matches the coordinator belongs to a credential that
/// has since been replaced or cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    /// A refresh settled successfully with a new credential pair.
    TokensRefreshed { tokens: TokenPair, generation: u64 },
    /// The refresh token is absent or was rejected.
    SessionExpired { generation: u64 },
}

impl SessionSignal {
    pub fn generation(&self) -> u64 {
        match self {
            Self::TokensRefreshed { generation, .. } | Self::SessionExpired { generation } => {
                *generation
            }
        }
    }
}

/// Emitted by the session store for the view layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ViewEvent {
    /// Navigate to the given location (sent after a successful login).
    Navigate { to: String },
    /// The authentication mode changed.
    ModeChanged { from: SessionMode, to: SessionMode },
    /// The session ended without a user-initiated logout; re-authenticate.
    SessionExpired,
}

/// Network reachability as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}
