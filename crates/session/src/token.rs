// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access/refresh credential pair and expiry arithmetic.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Live credential pair held by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Declared expiry of the access token as epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
}

impl TokenPair {
    /// Build a pair, deriving expiry from `expires_in` or the JWT `exp` claim.
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: Option<u64>,
    ) -> Self {
        let expires_at_ms = match expires_in_secs {
            Some(secs) => Some(now_ms().saturating_add(secs.saturating_mul(1000))),
            None => jwt_expiry_ms(&access_token),
        };
        Self { access_token, refresh_token, expires_at_ms }
    }

    /// Remaining lifetime of the access token. `None` when expiry is unknown.
    pub fn remaining(&self, now_ms: u64) -> Option<Duration> {
        self.expires_at_ms.map(|at| Duration::from_millis(at.saturating_sub(now_ms)))
    }

    /// True when the access token expires within `margin` of `now_ms`.
    /// Tokens without a declared expiry never count as expiring.
    pub fn expires_within(&self, margin: Duration, now_ms: u64) -> bool {
        match self.remaining(now_ms) {
            Some(left) => left < margin,
            None => false,
        }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|at| at <= now_ms)
    }

    /// Merge a refresh grant. A grant without a rotated refresh token keeps
    /// the current one.
    pub fn merged(&self, grant: TokenGrant) -> Self {
        let refresh_token = grant.refresh_token.clone().or_else(|| self.refresh_token.clone());
        let mut next = grant.into_pair();
        next.refresh_token = refresh_token;
        next
    }
}

/// Token response from the authentication service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl TokenGrant {
    pub fn into_pair(self) -> TokenPair {
        TokenPair::new(self.access_token, self.refresh_token, self.expires_in)
    }
}

/// Read the `exp` claim (seconds) of a JWT-shaped token, as epoch millis.
///
/// The signature is not checked; only the server validates tokens.
pub fn jwt_expiry_ms(token: &str) -> Option<u64> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    claims.get("exp")?.as_u64().map(|secs| secs.saturating_mul(1000))
}

pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
