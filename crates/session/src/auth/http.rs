// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth-style authentication service client over HTTP.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{AuthFuture, AuthService, CodeExchange, LoginGrant};
use crate::error::AuthError;
use crate::session::UserProfile;
use crate::token::TokenGrant;

/// OAuth error response from the provider.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Authentication service reached over HTTP.
pub struct HttpAuthService {
    base_url: String,
    client_id: Option<String>,
    http: reqwest::Client,
}

impl HttpAuthService {
    pub fn new(
        base_url: &str,
        client_id: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client_id,
            http: crate::http_client(timeout)?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn with_client_id<'a>(&'a self, form: &mut Vec<(&'static str, &'a str)>) {
        if let Some(ref client_id) = self.client_id {
            form.push(("client_id", client_id));
        }
    }

    async fn post_token<T: DeserializeOwned>(
        &self,
        form: &[(&str, &str)],
    ) -> Result<T, AuthError> {
        let resp = self.http.post(self.url("/oauth/token")).form(form).send().await?;
        read_json(resp).await
    }
}

impl AuthService for HttpAuthService {
    fn exchange_code<'a>(&'a self, exchange: &'a CodeExchange) -> AuthFuture<'a, LoginGrant> {
        Box::pin(async move {
            let mut form = vec![
                ("grant_type", "authorization_code"),
                ("code", exchange.code.as_str()),
                ("redirect_uri", exchange.redirect_uri.as_str()),
            ];
            if let Some(ref state) = exchange.state {
                form.push(("state", state.as_str()));
            }
            self.with_client_id(&mut form);
            self.post_token(&form).await
        })
    }

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> AuthFuture<'a, TokenGrant> {
        Box::pin(async move {
            let mut form = vec![("grant_type", "refresh_token"), ("refresh_token", refresh_token)];
            self.with_client_id(&mut form);
            self.post_token(&form).await
        })
    }

    fn revoke<'a>(
        &'a self,
        access_token: &'a str,
        refresh_token: Option<&'a str>,
    ) -> AuthFuture<'a, ()> {
        Box::pin(async move {
            let mut form = Vec::new();
            if let Some(token) = refresh_token {
                form.push(("token", token));
                form.push(("token_type_hint", "refresh_token"));
            }
            self.with_client_id(&mut form);
            let resp = self
                .http
                .post(self.url("/oauth/revoke"))
                .bearer_auth(access_token)
                .form(&form)
                .send()
                .await?;
            let status = resp.status();
            if status.is_success() {
                return Ok(());
            }
            let body = resp.text().await.unwrap_or_default();
            Err(classify_failure(status.as_u16(), &body))
        })
    }

    fn user_info<'a>(&'a self, access_token: &'a str) -> AuthFuture<'a, UserProfile> {
        Box::pin(async move {
            let resp =
                self.http.get(self.url("/oauth/userinfo")).bearer_auth(access_token).send().await?;
            read_json(resp).await
        })
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, AuthError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(classify_failure(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|e| AuthError::Http {
        status: status.as_u16(),
        message: format!("parse response: {e}"),
    })
}

/// Map a non-success response to the error taxonomy.
///
/// `401`, or an OAuth `invalid_grant`/`invalid_token` error, is a credential
/// rejection; anything else is an upstream failure.
pub fn classify_failure(status: u16, body: &str) -> AuthError {
    let oauth = serde_json::from_str::<TokenErrorResponse>(body).ok();
    if let Some(ref err) = oauth {
        debug!(status, error = %err.error, "auth service error response");
        if err.error == "invalid_grant" || err.error == "invalid_token" {
            return AuthError::CredentialRejected;
        }
    }
    if status == 401 {
        return AuthError::CredentialRejected;
    }
    let message = match oauth {
        Some(err) => match err.error_description {
            Some(desc) => format!("{}: {desc}", err.error),
            None => err.error,
        },
        None => body.to_owned(),
    };
    AuthError::Http { status, message }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
