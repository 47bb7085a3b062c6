// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod api;
pub mod auth;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod session;
pub mod storage;
pub mod test_support;
pub mod token;

use std::sync::Once;
use std::time::Duration;

use anyhow::Context;

static CRYPTO_INIT: Once = Once::new();

/// Install the rustls crypto provider (needed for reqwest even on plain HTTP).
fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// HTTP client with a whole-request timeout.
pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    ensure_crypto();
    reqwest::Client::builder().timeout(timeout).build().context("build http client")
}
