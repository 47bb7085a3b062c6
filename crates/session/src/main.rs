// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use clap::Parser;
use rand::Rng;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use latchkey::api::ApiClient;
use latchkey::auth::http::HttpAuthService;
use latchkey::auth::{AuthService, CodeExchange};
use latchkey::config::{Command, Config, SessionSettings};
use latchkey::connectivity::ConnectivityMonitor;
use latchkey::coordinator::{CoordinatorStatus, RefreshCoordinator};
use latchkey::error::{AuthError, ErrorBody};
use latchkey::event::SessionSignal;
use latchkey::session::purge::DirectoryPurge;
use latchkey::session::{AuthState, SessionStore};
use latchkey::storage::{FileStorage, MemoryStorage, SessionStorage, SessionVault};

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&config);

    if let Err(e) = run(config).await {
        let code = match e.downcast_ref::<AuthError>() {
            Some(auth) => {
                let _ = print_json(&ErrorReply { error: ErrorBody::from(auth) });
                if auth.code().requires_reauth() {
                    warn!("session is no longer valid, run `latchkey login` again");
                }
                auth.code().exit_code()
            }
            None => 1,
        };
        error!("{e:#}");
        std::process::exit(code);
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

#[derive(Serialize)]
struct ErrorReply {
    error: ErrorBody,
}

#[derive(Serialize)]
struct StatusReply {
    #[serde(flatten)]
    state: AuthState,
    coordinator: CoordinatorStatus,
}

#[derive(Serialize)]
struct AuthorizeReply {
    url: String,
    state: String,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

/// Wired-up library components for one invocation.
struct App {
    store: Arc<SessionStore>,
    coordinator: Arc<RefreshCoordinator>,
    signals: broadcast::Receiver<SessionSignal>,
}

impl App {
    fn build(config: &Config, settings: &SessionSettings) -> anyhow::Result<Self> {
        let state_dir = config.state_dir();
        let storage: Arc<dyn SessionStorage> = if config.ephemeral {
            Arc::new(MemoryStorage::new())
        } else {
            std::fs::create_dir_all(&state_dir).map_err(|e| {
                AuthError::Storage(format!("create {}: {e}", state_dir.display()))
            })?;
            Arc::new(FileStorage::new(&state_dir))
        };
        let auth: Arc<dyn AuthService> = Arc::new(HttpAuthService::new(
            &config.auth_url,
            config.client_id.clone(),
            settings.request_timeout,
        )?);
        let (coordinator, signals) = RefreshCoordinator::new(
            Arc::clone(&auth),
            settings.refresh_margin,
            settings.request_timeout,
        );
        let store = SessionStore::new(
            Arc::clone(&coordinator),
            auth,
            SessionVault::new(storage),
            settings.landing.clone(),
        );
        store.register_offline_content(Arc::new(DirectoryPurge::new(state_dir.join("offline"))));
        debug!(state_dir = %state_dir.display(), ephemeral = config.ephemeral, "session wired");
        Ok(Self { store, coordinator, signals })
    }

    /// Apply refresh outcomes the coordinator reported during a one-shot
    /// command, so the store persists them before exit.
    async fn settle_signals(&mut self) {
        loop {
            match self.signals.try_recv() {
                Ok(signal) => self.store.handle_signal(signal).await,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(skipped = n, "session signals lagged");
                }
                Err(_) => break,
            }
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let settings = config.session_settings();

    if let Command::AuthorizeUrl { ref authorize_endpoint, ref redirect_uri } = config.command {
        return print_json(&authorize_url(
            authorize_endpoint,
            redirect_uri,
            config.client_id.as_deref(),
        )?);
    }

    let mut app = App::build(&config, &settings)?;
    app.store.startup();

    match config.command.clone() {
        Command::Status => print_json(&StatusReply {
            state: app.store.auth_state(),
            coordinator: app.coordinator.status(),
        }),
        Command::Login { code, redirect_uri, state } => {
            let state = app.store.login(CodeExchange { code, redirect_uri, state }).await?;
            print_json(&state)
        }
        Command::Logout => print_json(&app.store.logout().await),
        Command::Refresh => {
            let state = app.store.refresh_access_token().await?;
            print_json(&state)
        }
        Command::Fetch { path } => {
            let api = ApiClient::new(
                &config.api_url,
                Arc::clone(&app.coordinator),
                settings.request_timeout,
            )?;
            let result = api.get_json::<serde_json::Value>(&path).await;
            app.settle_signals().await;
            print_json(&result?)
        }
        Command::Watch => watch(app, &config, &settings).await,
        Command::AuthorizeUrl { .. } => Ok(()),
    }
}

/// Keep the session alive until Ctrl-C, printing view events as JSON lines.
async fn watch(app: App, config: &Config, settings: &SessionSettings) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let mut views = app.store.subscribe();

    let monitor = Arc::new(ConnectivityMonitor::new(
        &config.api_url,
        settings.probe_interval,
        settings.request_timeout,
    )?);
    let monitor_task = monitor.spawn(shutdown.clone());
    let expiry_task = app.coordinator.spawn_expiry_watch(settings.expiry_check, shutdown.clone());
    let store_task =
        tokio::spawn(Arc::clone(&app.store).run(app.signals, monitor.subscribe(), shutdown.clone()));

    print_json(&app.store.auth_state())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = views.recv() => match event {
                Ok(event) => print_json(&event)?,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "view events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    shutdown.cancel();
    let _ = tokio::join!(monitor_task, expiry_task, store_task);
    Ok(())
}

/// Authorization URL carrying a fresh random `state` (32 bytes, base64url).
fn authorize_url(
    endpoint: &str,
    redirect_uri: &str,
    client_id: Option<&str>,
) -> anyhow::Result<AuthorizeReply> {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    let state = URL_SAFE_NO_PAD.encode(bytes);

    let mut params = vec![
        ("response_type", "code"),
        ("redirect_uri", redirect_uri),
        ("state", state.as_str()),
    ];
    if let Some(client_id) = client_id {
        params.push(("client_id", client_id));
    }
    let url = reqwest::Url::parse_with_params(endpoint, &params)?;
    Ok(AuthorizeReply { url: url.to_string(), state })
}
