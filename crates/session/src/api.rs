// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated JSON requests against the application API.
//!
//! Every call goes through [`RefreshCoordinator::execute`], so a rejected
//! token is refreshed once and the request replayed transparently.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::http::classify_failure;
use crate::coordinator::RefreshCoordinator;
use crate::error::AuthError;

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        coordinator: Arc<RefreshCoordinator>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            http: crate::http_client(timeout)?,
            coordinator,
        })
    }

    /// Absolute URL for `path`, which may omit its leading slash.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        let url = self.url(path);
        self.coordinator
            .execute(|token| {
                let request = self.http.get(&url).bearer_auth(token);
                async move { read_response(request.send().await?).await }
            })
            .await
    }

    /// Send `body` as JSON with `method` and decode the JSON reply.
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, AuthError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        self.coordinator
            .execute(|token| {
                let request = self.http.request(method.clone(), &url).bearer_auth(token).json(body);
                async move { read_response(request.send().await?).await }
            })
            .await
    }
}

/// Decode a reply. An empty success body decodes as JSON `null`.
async fn read_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, AuthError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(classify_failure(status.as_u16(), &body));
    }
    let body = if body.trim().is_empty() { "null" } else { body.as_str() };
    serde_json::from_str(body).map_err(|e| AuthError::Http {
        status: status.as_u16(),
        message: format!("parse response: {e}"),
    })
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
