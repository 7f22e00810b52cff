//! CLI integration tests

use std::process::{Command, Output};

/// Run the `vmi` binary with an isolated home directory
fn vmi(home: &std::path::Path, args: &[&str], api_url: Option<&str>) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_vmi"));
    command.args(args).env("HOME", home).env_remove("VMI_API_URL");
    if let Some(url) = api_url {
        command.env("VMI_API_URL", url);
    }
    command.output().expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let home = tempfile::tempdir().unwrap();
    let output = vmi(home.path(), &["--help"], None);

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Azure VM Insights"), "Should show app name");
    for command in [
        "mgmt-groups",
        "subscriptions",
        "vms",
        "runtime",
        "compliance",
        "advisor",
        "metrics",
        "config",
    ] {
        assert!(stdout.contains(command), "Should show {command} command");
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let home = tempfile::tempdir().unwrap();
    let output = vmi(home.path(), &["--version"], None);

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("vmi"), "Should show binary name");
}

/// Test metrics subcommand help
#[test]
fn test_metrics_help() {
    let home = tempfile::tempdir().unwrap();
    let output = vmi(home.path(), &["metrics", "--help"], None);

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Metrics help should succeed");
    assert!(stdout.contains("--subscription"), "Should show subscription option");
    assert!(stdout.contains("--hours"), "Should show hours option");
    assert!(stdout.contains("--timeseries"), "Should show timeseries option");
}

/// Test that subscriptions requires a management group
#[test]
fn test_subscriptions_requires_mgmt() {
    let home = tempfile::tempdir().unwrap();
    let output = vmi(home.path(), &["subscriptions"], None);

    assert!(!output.status.success(), "Missing --mgmt should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--mgmt"), "Should name the missing option");
}

/// Test that a subscription is required when none is configured
#[test]
fn test_vms_without_subscription_fails() {
    let home = tempfile::tempdir().unwrap();
    let output = vmi(home.path(), &["vms"], Some("http://127.0.0.1:9"));

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No subscription given"));
}

/// Test that an error envelope ends with a non-zero exit
#[test]
fn test_error_envelope_exits_non_zero() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/virtualmachines")
        .match_query(mockito::Matcher::Any)
        .with_body(r#"{"error": "(SubscriptionNotFound) The subscription could not be found."}"#)
        .create();

    let home = tempfile::tempdir().unwrap();
    let output = vmi(
        home.path(),
        &["vms", "--subscription", "sub-missing"],
        Some(&server.url()),
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("SubscriptionNotFound"));
}

/// Test that the stored default subscription is used
#[test]
fn test_config_default_subscription() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/vm-runtimehours")
        .match_query(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("subscription_id".into(), "sub-saved".into()),
            mockito::Matcher::UrlEncoded("lookback_days".into(), "7".into()),
        ]))
        .with_body(r#"[{"resourceId": "/subscriptions/sub-saved/virtualMachines/web-01", "runtimeHours": 168}]"#)
        .create();

    let home = tempfile::tempdir().unwrap();
    let saved = vmi(home.path(), &["config", "--subscription", "sub-saved"], None);
    assert!(saved.status.success());

    let output = vmi(home.path(), &["--format", "json", "runtime"], Some(&server.url()));

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    mock.assert();
    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(records[0]["runtimeHours"], 168);
}
