// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serial_test::serial;

use super::{Command, Config, SessionSettings};

fn parse(args: &[&str]) -> Config {
    Config::parse_from(args)
}

#[test]
#[serial]
fn defaults_match_settings_default() -> anyhow::Result<()> {
    let config = parse(&["latchkey", "status"]);
    config.validate()?;
    assert_eq!(config.command, Command::Status);
    assert_eq!(config.session_settings(), SessionSettings::default());
    assert_eq!(config.auth_url, "http://127.0.0.1:8900");
    assert!(!config.ephemeral);
    Ok(())
}

#[test]
fn login_subcommand_parses() {
    let config = parse(&[
        "latchkey",
        "login",
        "--code",
        "abc",
        "--redirect-uri",
        "https://app.example/cb",
        "--state",
        "s1",
    ]);
    assert_eq!(
        config.command,
        Command::Login {
            code: "abc".into(),
            redirect_uri: "https://app.example/cb".into(),
            state: Some("s1".into()),
        }
    );
}

#[test]
fn settings_derive_durations() {
    let config = parse(&[
        "latchkey",
        "--refresh-margin-secs",
        "30",
        "--request-timeout-ms",
        "2500",
        "--landing",
        "/feed",
        "watch",
    ]);
    let settings = config.session_settings();
    assert_eq!(settings.refresh_margin, Duration::from_secs(30));
    assert_eq!(settings.request_timeout, Duration::from_millis(2500));
    assert_eq!(settings.landing, "/feed");
}

#[yare::parameterized(
    bad_log_format = { &["latchkey", "--log-format", "xml", "status"], "invalid log format" },
    bad_auth_url   = { &["latchkey", "--auth-url", "ftp://auth", "status"], "--auth-url" },
    bare_scheme    = { &["latchkey", "--api-url", "https://", "status"], "--api-url" },
    zero_timeout   = { &["latchkey", "--request-timeout-ms", "0", "status"], "--request-timeout-ms" },
    zero_probe     = { &["latchkey", "--probe-interval-ms", "0", "watch"], "--probe-interval-ms" },
    bad_authorize  = { &["latchkey", "authorize-url", "--authorize-endpoint", "nope",
                         "--redirect-uri", "https://app/cb"], "--authorize-endpoint" },
)]
fn invalid_config(args: &[&str], expected_substr: &str) {
    let config = parse(args);
    crate::assert_err_contains!(config.validate(), expected_substr);
}

#[test]
#[serial]
fn env_overrides_flags_defaults() -> anyhow::Result<()> {
    std::env::set_var("LATCHKEY_LANDING", "/from-env");
    std::env::set_var("LATCHKEY_REFRESH_MARGIN_SECS", "45");
    let config = Config::try_parse_from(["latchkey", "status"]);
    std::env::remove_var("LATCHKEY_LANDING");
    std::env::remove_var("LATCHKEY_REFRESH_MARGIN_SECS");

    let settings = config?.session_settings();
    assert_eq!(settings.landing, "/from-env");
    assert_eq!(settings.refresh_margin, Duration::from_secs(45));
    Ok(())
}

#[test]
#[serial]
fn state_dir_prefers_flag_then_xdg() {
    let config = parse(&["latchkey", "--state-dir", "/tmp/lk", "status"]);
    assert_eq!(config.state_dir(), PathBuf::from("/tmp/lk"));

    let previous = std::env::var("XDG_STATE_HOME").ok();
    std::env::set_var("XDG_STATE_HOME", "/tmp/xdg");
    let config = parse(&["latchkey", "status"]);
    let resolved = config.state_dir();
    match previous {
        Some(value) => std::env::set_var("XDG_STATE_HOME", value),
        None => std::env::remove_var("XDG_STATE_HOME"),
    }
    assert_eq!(resolved, PathBuf::from("/tmp/xdg/latchkey"));
}
