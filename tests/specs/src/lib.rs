// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Runs the real `latchkey` binary as a subprocess against an in-process
//! mock of the authentication service and application API.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// Authorization code the mock service accepts.
pub const GOOD_CODE: &str = "good-code";

/// Resolve the path to the compiled `latchkey` binary.
pub fn latchkey_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("latchkey")
}

/// Call counters shared with the mock server.
#[derive(Default)]
pub struct Calls {
    pub exchanges: AtomicU32,
    pub refreshes: AtomicU32,
    pub revokes: AtomicU32,
}

impl Calls {
    pub fn get(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

fn bearer(headers: &HeaderMap) -> &str {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
}

fn user() -> Value {
    json!({"id": "u-1", "display_name": "Ada", "email": "ada@example.com", "provider": "password"})
}

async fn token(State(calls): State<Arc<Calls>>, Form(form): Form<HashMap<String, String>>) -> impl IntoResponse {
    let field = |k: &str| form.get(k).map(String::as_str).unwrap_or_default();
    match field("grant_type") {
        "authorization_code" => {
            calls.exchanges.fetch_add(1, Ordering::SeqCst);
            if field("code") == GOOD_CODE {
                let body = json!({
                    "user": user(),
                    "access_token": "acc-1",
                    "refresh_token": "ref-1",
                    "expires_in": 3600
                });
                return (StatusCode::OK, Json(body));
            }
        }
        "refresh_token" => {
            calls.refreshes.fetch_add(1, Ordering::SeqCst);
            if field("refresh_token") == "ref-1" {
                let body =
                    json!({"access_token": "acc-2", "refresh_token": "ref-2", "expires_in": 3600});
                return (StatusCode::OK, Json(body));
            }
        }
        _ => {}
    }
    (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"})))
}

/// Revocation always fails so logout has to succeed without it.
async fn revoke(State(calls): State<Arc<Calls>>) -> impl IntoResponse {
    calls.revokes.fetch_add(1, Ordering::SeqCst);
    (StatusCode::INTERNAL_SERVER_ERROR, "revocation store down")
}

async fn userinfo(headers: HeaderMap) -> impl IntoResponse {
    match bearer(&headers) {
        "acc-1" | "acc-2" => (StatusCode::OK, Json(user())),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_token"}))),
    }
}

/// Only the refreshed token is accepted, forcing one refresh per fetch.
async fn articles(headers: HeaderMap) -> impl IntoResponse {
    match bearer(&headers) {
        "acc-2" => (StatusCode::OK, Json(json!([{"id": 1, "title": "Offline reading"}]))),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_token"}))),
    }
}

/// Mock authentication service plus application API on one port.
pub struct MockServer {
    pub addr: SocketAddr,
    pub calls: Arc<Calls>,
}

impl MockServer {
    pub async fn start() -> anyhow::Result<Self> {
        let calls = Arc::new(Calls::default());
        let app = Router::new()
            .route("/oauth/token", post(token))
            .route("/oauth/revoke", post(revoke))
            .route("/oauth/userinfo", get(userinfo))
            .route("/articles", get(articles))
            .with_state(Arc::clone(&calls));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Ok(Self { addr, calls })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Result of one `latchkey` invocation.
#[derive(Debug)]
pub struct Outcome {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Outcome {
    /// The last stdout line parsed as JSON.
    pub fn json(&self) -> anyhow::Result<Value> {
        let line = self.stdout.lines().last().unwrap_or_default();
        serde_json::from_str(line)
            .map_err(|e| anyhow::anyhow!("bad JSON {line:?}: {e}; stderr: {}", self.stderr))
    }
}

/// A `latchkey` CLI bound to a mock server and a private state directory.
pub struct Latchkey {
    base_url: String,
    state_dir: tempfile::TempDir,
}

impl Latchkey {
    pub fn new(server: &MockServer) -> anyhow::Result<Self> {
        Ok(Self { base_url: server.url(), state_dir: tempfile::tempdir()? })
    }

    pub fn state_dir(&self) -> &Path {
        self.state_dir.path()
    }

    /// Run the binary with `args` after the shared flags.
    pub async fn run(&self, args: &[&str]) -> anyhow::Result<Outcome> {
        let binary = latchkey_binary();
        anyhow::ensure!(binary.exists(), "latchkey binary not found at {}", binary.display());

        let output = tokio::process::Command::new(&binary)
            .arg("--auth-url")
            .arg(&self.base_url)
            .arg("--api-url")
            .arg(&self.base_url)
            .arg("--state-dir")
            .arg(self.state_dir.path())
            .arg("--request-timeout-ms")
            .arg("5000")
            .args(args)
            .env("LATCHKEY_LOG_LEVEL", "debug")
            .output()
            .await?;

        Ok(Outcome {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    pub async fn login(&self, code: &str) -> anyhow::Result<Outcome> {
        self.run(&["login", "--code", code, "--redirect-uri", "https://app.example/callback"]).await
    }
}
