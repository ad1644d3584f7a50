//! Integration tests for the Stackpilot configuration system
//!
//! These tests verify:
//! - Loading configuration from TOML, YAML, and JSON files
//! - Human-readable durations
//! - Environment variable overrides
//! - Default values for sections left out of a file
//! - Error reporting for unreadable and malformed files

use serde_json::json;
use serial_test::serial;
use stackpilot::config::Config;
use stackpilot::stack::StackOperation;
use stackpilot::telemetry::{LogFormat, LogLevel};
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

const ENV_VARS: &[&str] = &[
    "STACKPILOT_CONFIG",
    "STACKPILOT_REGION",
    "STACKPILOT_PROFILE",
    "STACKPILOT_ENDPOINT_URL",
    "STACKPILOT_POLL_INTERVAL",
    "STACKPILOT_LOG_POLL_INTERVAL",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

// ============================================================================
// File Formats
// ============================================================================

#[test]
fn test_load_toml_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stackpilot.toml");
    fs::write(
        &path,
        r#"
[aws]
region = "eu-west-1"
profile = "deploy"

[stack]
create_timeout_minutes = 20

[stack.wait]
poll_interval = "2s"
create_timeout = "30m"

[logs]
group_prefix = "/apps/"
poll_interval = "250ms"

[logging]
level = "debug"
format = "json"
"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();

    assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
    assert_eq!(config.aws.profile.as_deref(), Some("deploy"));
    assert_eq!(config.stack.create_timeout_minutes, 20);
    assert_eq!(config.stack.wait.poll_interval, Duration::from_secs(2));
    assert_eq!(
        config.stack.wait.for_operation(StackOperation::Create).timeout,
        Duration::from_secs(30 * 60)
    );
    // Unset durations keep their defaults
    assert_eq!(config.stack.wait.delete_timeout, Duration::from_secs(60 * 60));
    assert_eq!(config.logs.group_name("demo"), "/apps/demo");
    assert_eq!(config.logs.poll_interval, Duration::from_millis(250));
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_load_yaml_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stackpilot.yaml");
    fs::write(
        &path,
        "aws:\n  endpoint_url: http://localhost:4566\nstack:\n  wait:\n    change_set_timeout: 90s\n",
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();

    assert_eq!(config.aws.endpoint_url.as_deref(), Some("http://localhost:4566"));
    assert_eq!(config.stack.wait.change_set_timeout, Duration::from_secs(90));
    assert_eq!(config.stack.create_timeout_minutes, 10);
}

#[test]
fn test_load_json_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stackpilot.json");
    let document = json!({
        "logs": { "channel_capacity": 64 },
        "logging": { "ansi_colors": false }
    });
    fs::write(&path, document.to_string()).unwrap();

    let config = Config::from_file(&path).unwrap();

    assert_eq!(config.logs.channel_capacity, 64);
    assert!(!config.logging.ansi_colors);
    assert_eq!(config.logs.group_prefix, "/docker-compose/");
}

#[test]
fn test_empty_file_is_default_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.toml");
    fs::write(&path, "").unwrap();

    assert_eq!(Config::from_file(&path).unwrap(), Config::default());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let err = Config::from_file(dir.path().join("nope.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_malformed_duration_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[stack.wait]\npoll_interval = \"soon\"\n").unwrap();

    let err = Config::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

// ============================================================================
// Environment Overrides
// ============================================================================

#[test]
#[serial]
fn test_load_without_file_uses_defaults() {
    clear_env();
    let config = Config::load(None).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn test_env_overrides_file_values() {
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("stackpilot.toml");
    fs::write(&path, "[aws]\nregion = \"eu-west-1\"\n").unwrap();

    std::env::set_var("STACKPILOT_REGION", "us-east-2");
    std::env::set_var("STACKPILOT_POLL_INTERVAL", "750ms");
    std::env::set_var("STACKPILOT_LOG_POLL_INTERVAL", "2s");
    let config = Config::load(Some(&path));
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.aws.region.as_deref(), Some("us-east-2"));
    assert_eq!(config.stack.wait.poll_interval, Duration::from_millis(750));
    assert_eq!(config.logs.poll_interval, Duration::from_secs(2));
}

#[test]
#[serial]
fn test_config_path_from_env() {
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("from-env.yaml");
    fs::write(&path, "aws:\n  profile: staging\n").unwrap();

    std::env::set_var("STACKPILOT_CONFIG", &path);
    let config = Config::load(None);
    clear_env();

    assert_eq!(config.unwrap().aws.profile.as_deref(), Some("staging"));
}

#[test]
#[serial]
fn test_invalid_env_duration_is_an_error() {
    clear_env();
    std::env::set_var("STACKPILOT_POLL_INTERVAL", "often");
    let result = Config::load(None);
    clear_env();

    let err = result.unwrap_err();
    assert!(err.to_string().contains("STACKPILOT_POLL_INTERVAL"));
}
