// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use yare::parameterized;

use super::*;
use crate::session::SessionMode::*;

#[parameterized(
    login = { Unauthenticated, AuthenticatedOnline, Cause::Login },
    restore_live = { Unauthenticated, AuthenticatedOnline, Cause::Startup },
    restore_cached = { Unauthenticated, AuthenticatedOffline, Cause::Startup },
    went_offline = { AuthenticatedOnline, AuthenticatedOffline, Cause::WentOffline },
    reconciled = { AuthenticatedOffline, AuthenticatedOnline, Cause::Reconciled },
    logout_online = { AuthenticatedOnline, Unauthenticated, Cause::Logout },
    logout_offline = { AuthenticatedOffline, Unauthenticated, Cause::Logout },
    expired_online = { AuthenticatedOnline, Unauthenticated, Cause::Expired },
    expired_offline = { AuthenticatedOffline, Unauthenticated, Cause::Expired },
)]
fn allowed(from: SessionMode, to: SessionMode, cause: Cause) {
    assert!(is_valid(from, to, cause), "{from} -> {to} via {}", cause.as_str());
}

#[parameterized(
    login_over_online = { AuthenticatedOnline, AuthenticatedOnline, Cause::Login },
    login_over_offline = { AuthenticatedOffline, AuthenticatedOnline, Cause::Login },
    offline_without_session = { Unauthenticated, AuthenticatedOffline, Cause::WentOffline },
    reconcile_without_session = { Unauthenticated, AuthenticatedOnline, Cause::Reconciled },
    logout_when_signed_out = { Unauthenticated, Unauthenticated, Cause::Logout },
    startup_over_online = { AuthenticatedOnline, AuthenticatedOffline, Cause::Startup },
    login_to_offline = { Unauthenticated, AuthenticatedOffline, Cause::Login },
)]
fn rejected(from: SessionMode, to: SessionMode, cause: Cause) {
    assert!(!is_valid(from, to, cause), "{from} -> {to} via {}", cause.as_str());
}
