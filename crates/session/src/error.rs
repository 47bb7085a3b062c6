// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable machine-readable error codes surfaced to callers and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Transient,
    Timeout,
    Upstream,
    CredentialRejected,
    SessionExpired,
    LoginFailed,
    AlreadyAuthenticated,
    Offline,
    Storage,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "TRANSIENT",
            Self::Timeout => "TIMEOUT",
            Self::Upstream => "UPSTREAM",
            Self::CredentialRejected => "CREDENTIAL_REJECTED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::AlreadyAuthenticated => "ALREADY_AUTHENTICATED",
            Self::Offline => "OFFLINE",
            Self::Storage => "STORAGE",
        }
    }

    /// Process exit code used by the CLI. 2 is reserved for bad configuration.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Transient | Self::Timeout | Self::Upstream | Self::Offline => 3,
            Self::CredentialRejected | Self::SessionExpired => 4,
            Self::LoginFailed | Self::AlreadyAuthenticated => 5,
            Self::Storage => 1,
        }
    }

    /// Whether the caller should send the user back through authentication.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::CredentialRejected | Self::SessionExpired)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of an authenticated operation.
///
/// `Clone` so a single refresh outcome can be handed to every caller queued
/// behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Network-level failure; no session mutation.
    Transient(String),
    /// The request exceeded its deadline.
    Timeout,
    /// Non-success status other than a credential rejection.
    Http { status: u16, message: String },
    /// The server rejected the presented credential.
    CredentialRejected,
    /// The refresh token is missing or was rejected; the session is over.
    SessionExpired,
    /// Authorization-code exchange failed.
    LoginFailed(String),
    /// Login attempted while a session is already established.
    AlreadyAuthenticated,
    /// Authenticated request attempted while offline.
    Offline,
    /// Durable session storage failed.
    Storage(String),
}

impl AuthError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Transient(_) => ErrorCode::Transient,
            Self::Timeout => ErrorCode::Timeout,
            Self::Http { .. } => ErrorCode::Upstream,
            Self::CredentialRejected => ErrorCode::CredentialRejected,
            Self::SessionExpired => ErrorCode::SessionExpired,
            Self::LoginFailed(_) => ErrorCode::LoginFailed,
            Self::AlreadyAuthenticated => ErrorCode::AlreadyAuthenticated,
            Self::Offline => ErrorCode::Offline,
            Self::Storage(_) => ErrorCode::Storage,
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient(msg) => write!(f, "network error: {msg}"),
            Self::Timeout => f.write_str("request timed out"),
            Self::Http { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::CredentialRejected => f.write_str("credentials rejected"),
            Self::SessionExpired => f.write_str("session expired"),
            Self::LoginFailed(msg) => write!(f, "login failed: {msg}"),
            Self::AlreadyAuthenticated => f.write_str("already authenticated"),
            Self::Offline => f.write_str("offline"),
            Self::Storage(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transient(e.to_string())
        }
    }
}

/// Error body printed by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&AuthError> for ErrorBody {
    fn from(e: &AuthError) -> Self {
        Self { code: e.code(), message: e.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
