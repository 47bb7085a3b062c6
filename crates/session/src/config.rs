// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::storage::default_state_dir;

/// Client-side session manager: sign in, keep tokens fresh, sign out.
#[derive(Debug, Parser)]
#[command(name = "latchkey", version, about)]
pub struct Config {
    /// Authentication service base URL.
    #[arg(long, env = "LATCHKEY_AUTH_URL", default_value = "http://127.0.0.1:8900")]
    pub auth_url: String,

    /// Application API base URL (also probed for connectivity).
    #[arg(long, env = "LATCHKEY_API_URL", default_value = "http://127.0.0.1:8901")]
    pub api_url: String,

    /// OAuth client identifier sent with token requests.
    #[arg(long, env = "LATCHKEY_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Directory holding the persisted session.
    #[arg(long, env = "LATCHKEY_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Keep the session in memory only.
    #[arg(long, env = "LATCHKEY_EPHEMERAL")]
    pub ephemeral: bool,

    /// Refresh this many seconds before the access token expires.
    #[arg(long, env = "LATCHKEY_REFRESH_MARGIN_SECS", default_value = "120")]
    pub refresh_margin_secs: u64,

    /// Timeout for every outbound request, refresh included.
    #[arg(long, env = "LATCHKEY_REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout_ms: u64,

    /// Interval between connectivity probes.
    #[arg(long, env = "LATCHKEY_PROBE_INTERVAL_MS", default_value = "15000")]
    pub probe_interval_ms: u64,

    /// Interval between proactive expiry checks.
    #[arg(long, env = "LATCHKEY_EXPIRY_CHECK_MS", default_value = "30000")]
    pub expiry_check_ms: u64,

    /// Where to navigate after a successful login.
    #[arg(long, env = "LATCHKEY_LANDING", default_value = "/")]
    pub landing: String,

    /// Log format (json or text).
    #[arg(long, env = "LATCHKEY_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LATCHKEY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print the current authentication state.
    Status,
    /// Exchange an authorization code and sign in.
    Login {
        #[arg(long)]
        code: String,
        #[arg(long)]
        redirect_uri: String,
        #[arg(long)]
        state: Option<String>,
    },
    /// Print an authorization URL with a fresh anti-forgery state.
    AuthorizeUrl {
        #[arg(long)]
        authorize_endpoint: String,
        #[arg(long)]
        redirect_uri: String,
    },
    /// Revoke and clear the session.
    Logout,
    /// Refresh the access token now.
    Refresh,
    /// GET an API path with the session's credential.
    Fetch { path: String },
    /// Keep the session alive and print view events until interrupted.
    Watch,
}

/// Runtime knobs for the library, independent of clap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub refresh_margin: Duration,
    pub request_timeout: Duration,
    pub probe_interval: Duration,
    pub expiry_check: Duration,
    pub landing: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_margin: Duration::from_secs(120),
            request_timeout: Duration::from_secs(10),
            probe_interval: Duration::from_secs(15),
            expiry_check: Duration::from_secs(30),
            landing: "/".to_owned(),
        }
    }
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("invalid log format: {} (expected json or text)", self.log_format);
        }
        for (flag, url) in [("--auth-url", &self.auth_url), ("--api-url", &self.api_url)] {
            if !is_http_url(url) {
                anyhow::bail!("{flag} must be an http(s) URL, got {url:?}");
            }
        }
        for (flag, value) in [
            ("--request-timeout-ms", self.request_timeout_ms),
            ("--probe-interval-ms", self.probe_interval_ms),
            ("--expiry-check-ms", self.expiry_check_ms),
        ] {
            if value == 0 {
                anyhow::bail!("{flag} must be greater than zero");
            }
        }
        if let Command::AuthorizeUrl { ref authorize_endpoint, .. } = self.command {
            if !is_http_url(authorize_endpoint) {
                anyhow::bail!("--authorize-endpoint must be an http(s) URL");
            }
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            refresh_margin: Duration::from_secs(self.refresh_margin_secs),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            probe_interval: Duration::from_millis(self.probe_interval_ms),
            expiry_check: Duration::from_millis(self.expiry_check_ms),
            landing: self.landing.clone(),
        }
    }

    /// Explicit `--state-dir`, else the XDG default.
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(default_state_dir)
    }
}

fn is_http_url(url: &str) -> bool {
    let rest = url.strip_prefix("https://").or_else(|| url.strip_prefix("http://"));
    rest.is_some_and(|host| !host.is_empty())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
