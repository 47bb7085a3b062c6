// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session mode state machine.
//!
//! ```text
//! unauthenticated --login/startup--> authenticated-online
//! unauthenticated --startup--------> authenticated-offline
//! authenticated-online <--connectivity--> authenticated-offline
//! authenticated-* --logout/expired--> unauthenticated
//! ```

use super::SessionMode;

/// What is driving a mode change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    /// Restoring durable state at process start.
    Startup,
    Login,
    Logout,
    /// Refresh failed or the coordinator reported the session expired.
    Expired,
    WentOffline,
    /// Reconnected and the server re-validated the identity.
    Reconciled,
}

impl Cause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Expired => "expired",
            Self::WentOffline => "went_offline",
            Self::Reconciled => "reconciled",
        }
    }
}

/// Whether `cause` may move the session from `from` to `to`.
pub fn is_valid(from: SessionMode, to: SessionMode, cause: Cause) -> bool {
    use SessionMode::*;
    matches!(
        (from, to, cause),
        (Unauthenticated, AuthenticatedOnline, Cause::Startup | Cause::Login)
            | (Unauthenticated, AuthenticatedOffline, Cause::Startup)
            | (AuthenticatedOnline, AuthenticatedOffline, Cause::WentOffline)
            | (AuthenticatedOffline, AuthenticatedOnline, Cause::Reconciled)
            | (AuthenticatedOnline | AuthenticatedOffline, Unauthenticated, Cause::Logout | Cause::Expired)
    )
}

#[cfg(test)]
#[path = "transition_tests.rs"]
mod tests;
