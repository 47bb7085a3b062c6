// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seam to the remote authentication service.
//!
//! The service issues tokens and validates authorization codes; this crate
//! only consumes it. [`http::HttpAuthService`] is the production
//! implementation, tests substitute in-process fakes.

pub mod http;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::session::UserProfile;
use crate::token::TokenGrant;

/// Boxed future returned by [`AuthService`] methods.
pub type AuthFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AuthError>> + Send + 'a>>;

/// Authorization-code exchange parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeExchange {
    pub code: String,
    pub redirect_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Result of a successful code exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginGrant {
    pub user: UserProfile,
    #[serde(flatten)]
    pub tokens: TokenGrant,
}

/// Remote authentication service.
///
/// Object-safe for use as `Arc<dyn AuthService>`.
pub trait AuthService: Send + Sync + 'static {
    /// Exchange an authorization code for a user record and token pair.
    fn exchange_code<'a>(&'a self, exchange: &'a CodeExchange) -> AuthFuture<'a, LoginGrant>;

    /// Mint a new access token. Rejection means the refresh token is dead.
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> AuthFuture<'a, TokenGrant>;

    /// Best-effort revocation of the session's refresh token.
    fn revoke<'a>(
        &'a self,
        access_token: &'a str,
        refresh_token: Option<&'a str>,
    ) -> AuthFuture<'a, ()>;

    /// Fetch the user record behind an access token (server-side validation).
    fn user_info<'a>(&'a self, access_token: &'a str) -> AuthFuture<'a, UserProfile>;
}
