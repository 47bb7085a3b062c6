// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that run the real `latchkey` binary against a
//! mock authentication service.

use latchkey_specs::{Calls, Latchkey, MockServer, GOOD_CODE};

#[tokio::test]
async fn status_without_session_is_unauthenticated() -> anyhow::Result<()> {
    let server = MockServer::start().await?;
    let cli = Latchkey::new(&server)?;

    let out = cli.run(&["status"]).await?;

    assert_eq!(out.code, Some(0), "{out:?}");
    let json = out.json()?;
    assert_eq!(json["mode"], "unauthenticated");
    assert_eq!(json["coordinator"]["refresh_in_progress"], false);
    Ok(())
}

#[tokio::test]
async fn login_persists_session_across_invocations() -> anyhow::Result<()> {
    let server = MockServer::start().await?;
    let cli = Latchkey::new(&server)?;

    let out = cli.login(GOOD_CODE).await?;
    assert_eq!(out.code, Some(0), "{out:?}");
    assert_eq!(out.json()?["mode"], "authenticated-online");

    for slot in ["user", "access_token", "refresh_token", "cached_session", "auth_cookie"] {
        assert!(cli.state_dir().join(slot).exists(), "{slot} missing");
    }

    let status = cli.run(&["status"]).await?.json()?;
    assert_eq!(status["mode"], "authenticated-online");
    assert_eq!(status["user"]["id"], "u-1");
    assert_eq!(Calls::get(&server.calls.exchanges), 1);
    Ok(())
}

#[tokio::test]
async fn bad_code_exits_with_login_error() -> anyhow::Result<()> {
    let server = MockServer::start().await?;
    let cli = Latchkey::new(&server)?;

    let out = cli.login("stolen-code").await?;

    assert_eq!(out.code, Some(5), "{out:?}");
    assert_eq!(out.json()?["error"]["code"], "LOGIN_FAILED");
    assert!(!cli.state_dir().join("access_token").exists());
    Ok(())
}

#[tokio::test]
async fn second_login_requires_logout() -> anyhow::Result<()> {
    let server = MockServer::start().await?;
    let cli = Latchkey::new(&server)?;
    cli.login(GOOD_CODE).await?;

    let out = cli.login("another-code").await?;

    assert_eq!(out.code, Some(5), "{out:?}");
    assert_eq!(out.json()?["error"]["code"], "ALREADY_AUTHENTICATED");
    assert_eq!(Calls::get(&server.calls.exchanges), 1);
    Ok(())
}

#[tokio::test]
async fn logout_succeeds_when_revoke_fails() -> anyhow::Result<()> {
    let server = MockServer::start().await?;
    let cli = Latchkey::new(&server)?;
    cli.login(GOOD_CODE).await?;
    std::fs::create_dir_all(cli.state_dir().join("offline/u-1"))?;

    let out = cli.run(&["logout"]).await?;

    assert_eq!(out.code, Some(0), "{out:?}");
    assert_eq!(out.json()?["mode"], "unauthenticated");
    assert_eq!(Calls::get(&server.calls.revokes), 1);
    for slot in ["user", "access_token", "refresh_token", "cached_session", "auth_cookie"] {
        assert!(!cli.state_dir().join(slot).exists(), "{slot} left behind");
    }
    assert!(!cli.state_dir().join("offline/u-1").exists());
    Ok(())
}

#[tokio::test]
async fn fetch_refreshes_rejected_token_and_persists_it() -> anyhow::Result<()> {
    let server = MockServer::start().await?;
    let cli = Latchkey::new(&server)?;
    cli.login(GOOD_CODE).await?;

    let out = cli.run(&["fetch", "/articles"]).await?;

    assert_eq!(out.code, Some(0), "{out:?}");
    assert_eq!(out.json()?[0]["title"], "Offline reading");
    assert_eq!(Calls::get(&server.calls.refreshes), 1);
    let stored = std::fs::read_to_string(cli.state_dir().join("access_token"))?;
    assert!(stored.contains("acc-2"), "{stored}");
    assert_eq!(std::fs::read_to_string(cli.state_dir().join("refresh_token"))?, "ref-2");
    Ok(())
}

#[tokio::test]
async fn refresh_with_dead_token_expires_session() -> anyhow::Result<()> {
    let server = MockServer::start().await?;
    let cli = Latchkey::new(&server)?;
    cli.login(GOOD_CODE).await?;
    std::fs::write(cli.state_dir().join("refresh_token"), "revoked")?;

    let out = cli.run(&["refresh"]).await?;

    assert_eq!(out.code, Some(4), "{out:?}");
    assert_eq!(out.json()?["error"]["code"], "SESSION_EXPIRED");
    let status = cli.run(&["status"]).await?.json()?;
    assert_eq!(status["mode"], "unauthenticated");
    Ok(())
}

#[tokio::test]
async fn authorize_url_carries_fresh_state() -> anyhow::Result<()> {
    let server = MockServer::start().await?;
    let cli = Latchkey::new(&server)?;
    let args = [
        "authorize-url",
        "--authorize-endpoint",
        "https://auth.example/authorize",
        "--redirect-uri",
        "https://app.example/callback",
    ];

    let first = cli.run(&args).await?.json()?;
    let second = cli.run(&args).await?.json()?;

    let url = first["url"].as_str().unwrap_or_default();
    assert!(url.starts_with("https://auth.example/authorize?response_type=code"), "{url}");
    assert!(url.contains("state="));
    assert_ne!(first["state"], second["state"]);
    Ok(())
}

#[tokio::test]
async fn invalid_config_exits_with_2() -> anyhow::Result<()> {
    let server = MockServer::start().await?;
    let cli = Latchkey::new(&server)?;

    let out = cli.run(&["--log-format", "xml", "status"]).await?;

    assert_eq!(out.code, Some(2), "{out:?}");
    Ok(())
}
