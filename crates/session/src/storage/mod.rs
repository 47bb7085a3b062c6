// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-durable key/value storage for the session.
//!
//! Layout: three independent live slots (user, access token, refresh token),
//! one cached-snapshot slot used only for offline bootstrap, and a derived
//! cookie mirror of the access token that nothing here ever reads back.

pub mod file;
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::session::{CachedSnapshot, Trust, UserProfile};
use crate::token::{now_ms, TokenPair};

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Persisted storage slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    User,
    AccessToken,
    RefreshToken,
    CachedSession,
    AuthCookie,
}

impl Slot {
    pub const ALL: [Slot; 5] =
        [Slot::User, Slot::AccessToken, Slot::RefreshToken, Slot::CachedSession, Slot::AuthCookie];

    pub fn key(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::CachedSession => "cached_session",
            Self::AuthCookie => "auth_cookie",
        }
    }
}

/// Raw slot storage. Implementations must make each write atomic per slot.
pub trait SessionStorage: Send + Sync + 'static {
    fn read(&self, slot: Slot) -> anyhow::Result<Option<String>>;
    fn write(&self, slot: Slot, value: &str) -> anyhow::Result<()>;
    fn remove(&self, slot: Slot) -> anyhow::Result<()>;
}

/// Access-token slot contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAccessToken {
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at_ms: Option<u64>,
}

/// Name of the cookie mirroring the access token.
pub const AUTH_COOKIE_NAME: &str = "latchkey_auth";

/// Typed view over a [`SessionStorage`].
#[derive(Clone)]
pub struct SessionVault {
    storage: Arc<dyn SessionStorage>,
}

impl SessionVault {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    /// Load the live session. Requires user, access and refresh slots.
    pub fn load_live(&self) -> anyhow::Result<Option<(UserProfile, TokenPair)>> {
        let Some(user) = self.read_json::<UserProfile>(Slot::User)? else {
            return Ok(None);
        };
        let Some(access) = self.read_json::<StoredAccessToken>(Slot::AccessToken)? else {
            return Ok(None);
        };
        let Some(refresh) = self.storage.read(Slot::RefreshToken)? else {
            return Ok(None);
        };
        if access.token.is_empty() || refresh.is_empty() {
            return Ok(None);
        }
        let tokens = TokenPair {
            access_token: access.token,
            refresh_token: Some(refresh),
            expires_at_ms: access.expires_at_ms,
        };
        Ok(Some((user, tokens)))
    }

    pub fn save_user(&self, user: &UserProfile) -> anyhow::Result<()> {
        self.write_json(Slot::User, user)
    }

    /// Write the access/refresh slots and the derived cookie mirror.
    pub fn save_tokens(&self, tokens: &TokenPair) -> anyhow::Result<()> {
        let access = StoredAccessToken {
            token: tokens.access_token.clone(),
            expires_at_ms: tokens.expires_at_ms,
        };
        self.write_json(Slot::AccessToken, &access)?;
        match tokens.refresh_token {
            Some(ref refresh) => self.storage.write(Slot::RefreshToken, refresh)?,
            None => self.storage.remove(Slot::RefreshToken)?,
        }
        self.storage.write(Slot::AuthCookie, &auth_cookie(tokens))
    }

    pub fn load_snapshot(&self) -> anyhow::Result<Option<CachedSnapshot>> {
        self.read_json(Slot::CachedSession)
    }

    pub fn save_snapshot(&self, user: &UserProfile) -> anyhow::Result<()> {
        let snapshot =
            CachedSnapshot { user: user.clone(), trust: Trust::Cached, saved_at_ms: now_ms() };
        self.write_json(Slot::CachedSession, &snapshot)
    }

    /// Empty the live token slots and cookie mirror. The user record goes too.
    ///
    /// Every slot is attempted even when an earlier removal fails.
    pub fn clear_live(&self) -> anyhow::Result<()> {
        self.remove_all(&[Slot::AccessToken, Slot::RefreshToken, Slot::AuthCookie, Slot::User])
    }

    /// Empty every slot, snapshot included.
    pub fn clear_all(&self) -> anyhow::Result<()> {
        self.remove_all(&Slot::ALL)
    }

    fn remove_all(&self, slots: &[Slot]) -> anyhow::Result<()> {
        let failed: Vec<String> = slots
            .iter()
            .filter_map(|slot| {
                self.storage.remove(*slot).err().map(|e| format!("{}: {e:#}", slot.key()))
            })
            .collect();
        if !failed.is_empty() {
            anyhow::bail!("failed to remove {}", failed.join(", "));
        }
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, slot: Slot) -> anyhow::Result<Option<T>> {
        match self.storage.read(slot)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn write_json<T: Serialize>(&self, slot: Slot, value: &T) -> anyhow::Result<()> {
        self.storage.write(slot, &serde_json::to_string(value)?)
    }
}

fn auth_cookie(tokens: &TokenPair) -> String {
    let mut cookie = format!("{AUTH_COOKIE_NAME}={}; Path=/; SameSite=Lax", tokens.access_token);
    if let Some(left) = tokens.remaining(now_ms()) {
        cookie.push_str(&format!("; Max-Age={}", left.as_secs()));
    }
    cookie
}

/// Resolve the default state directory.
///
/// Checks `$XDG_STATE_HOME/latchkey`, then `$HOME/.local/state/latchkey`.
pub fn default_state_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("latchkey");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/latchkey");
    }
    PathBuf::from(".latchkey")
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
