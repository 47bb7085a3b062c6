// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The authenticated session as perceived by the client.
//!
//! [`SessionStore`] owns the single in-memory [`Session`] and is the only
//! writer of durable session state.

pub mod purge;
pub mod run;
pub mod store;
pub mod transition;

use serde::{Deserialize, Serialize};

use crate::token::TokenPair;

pub use purge::OfflineContent;
pub use store::SessionStore;

/// Opaque profile record. Only carried, never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Fields this client does not know about, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// How far the client trusts the current identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    #[default]
    Unauthenticated,
    /// Holds an access token obtained from the server this session.
    AuthenticatedOnline,
    /// Honors a previously cached identity without server validation.
    AuthenticatedOffline,
}

impl SessionMode {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Unauthenticated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::AuthenticatedOnline => "authenticated-online",
            Self::AuthenticatedOffline => "authenticated-offline",
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live session state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<UserProfile>,
    pub tokens: Option<TokenPair>,
    pub mode: SessionMode,
}

impl Session {
    pub fn online(user: UserProfile, tokens: TokenPair) -> Self {
        Self { user: Some(user), tokens: Some(tokens), mode: SessionMode::AuthenticatedOnline }
    }
}

/// Read-only snapshot handed to the view layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    pub mode: SessionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
}

impl From<&Session> for AuthState {
    fn from(session: &Session) -> Self {
        Self {
            mode: session.mode,
            user: session.user.clone(),
            expires_at_ms: session.tokens.as_ref().and_then(|t| t.expires_at_ms),
        }
    }
}

/// Trust marker recorded with the cached snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trust {
    Cached,
}

/// Durable copy of the last known-good identity, without live tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    pub user: UserProfile,
    pub trust: Trust,
    pub saved_at_ms: u64,
}
