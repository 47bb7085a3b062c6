// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;

use super::*;

async fn reachable_server() -> anyhow::Result<String> {
    let app = Router::new().route("/", any(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(format!("http://{addr}/"))
}

/// An address nothing is listening on.
async fn dead_url() -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}/"))
}

fn monitor(url: &str) -> ConnectivityMonitor {
    ConnectivityMonitor::new(url, Duration::from_millis(10), Duration::from_secs(2))
        .expect("http client")
}

#[test]
fn report_publishes_only_transitions() {
    let monitor = monitor("http://127.0.0.1:9/");
    let mut rx = monitor.subscribe();

    assert!(!monitor.report(Connectivity::Online));
    assert!(!rx.has_changed().unwrap_or(true));

    assert!(monitor.report(Connectivity::Offline));
    assert!(rx.has_changed().unwrap_or(false));
    assert_eq!(*rx.borrow_and_update(), Connectivity::Offline);

    assert!(!monitor.report(Connectivity::Offline));
    assert!(!rx.has_changed().unwrap_or(true));
}

#[tokio::test]
async fn any_http_response_counts_as_online() -> anyhow::Result<()> {
    let url = reachable_server().await?;
    let monitor = monitor(&url);
    monitor.report(Connectivity::Offline);

    assert_eq!(monitor.probe().await, Connectivity::Online);
    assert_eq!(monitor.current(), Connectivity::Online);
    Ok(())
}

#[tokio::test]
async fn refused_connection_counts_as_offline() -> anyhow::Result<()> {
    let monitor = monitor(&dead_url().await?);
    assert_eq!(monitor.probe().await, Connectivity::Offline);
    assert_eq!(monitor.current(), Connectivity::Offline);
    Ok(())
}

#[tokio::test]
async fn spawned_monitor_notices_outage() -> anyhow::Result<()> {
    let monitor = Arc::new(monitor(&dead_url().await?));
    let mut rx = monitor.subscribe();
    let shutdown = CancellationToken::new();
    let task = monitor.spawn(shutdown.clone());

    tokio::time::timeout(Duration::from_secs(5), rx.changed()).await??;
    assert_eq!(*rx.borrow(), Connectivity::Offline);

    shutdown.cancel();
    task.await?;
    Ok(())
}
