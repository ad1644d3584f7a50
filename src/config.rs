//! Configuration module for Stackpilot
//!
//! Handles loading configuration from:
//! - Default values
//! - An explicit file, or the file named by `STACKPILOT_CONFIG`
//!   (TOML, YAML or JSON, chosen by extension)
//! - Environment variables

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::poll::{BackoffStrategy, JitterStrategy, PollSettings};
use crate::stack::StackOperation;
use crate::telemetry::LoggingConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider selection (region, profile, endpoint)
    pub aws: AwsSettings,

    /// Stack engine settings
    pub stack: StackSettings,

    /// Log tailing settings
    pub logs: LogSettings,

    /// Local logging settings
    pub logging: LoggingConfig,
}

/// Which AWS account endpoint to talk to. Credentials come from the
/// standard provider chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSettings {
    /// Region; falls back to `AWS_REGION` and the shared config file
    pub region: Option<String>,

    /// Named profile from the shared config file
    pub profile: Option<String>,

    /// Endpoint override (LocalStack and similar)
    pub endpoint_url: Option<String>,
}

/// Stack engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSettings {
    /// Creation timeout handed to CloudFormation, in minutes
    pub create_timeout_minutes: i32,

    /// Polling behaviour of the blocking waits
    pub wait: WaitSettings,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            create_timeout_minutes: 10,
            wait: WaitSettings::default(),
        }
    }
}

/// Timing of change set and stack waits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSettings {
    /// Delay between polls
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Upper bound on the delay after backoff
    #[serde(with = "humantime_serde")]
    pub max_poll_interval: Duration,

    /// Backoff applied to `poll_interval`
    pub backoff: BackoffStrategy,

    /// Jitter applied after backoff
    pub jitter: JitterStrategy,

    /// Limit for change set creation
    #[serde(with = "humantime_serde")]
    pub change_set_timeout: Duration,

    /// Limit for stack creation
    #[serde(with = "humantime_serde")]
    pub create_timeout: Duration,

    /// Limit for stack updates
    #[serde(with = "humantime_serde")]
    pub update_timeout: Duration,

    /// Limit for stack deletion
    #[serde(with = "humantime_serde")]
    pub delete_timeout: Duration,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_poll_interval: Duration::from_secs(30),
            backoff: BackoffStrategy::Constant,
            jitter: JitterStrategy::None,
            change_set_timeout: Duration::from_secs(10 * 60),
            create_timeout: Duration::from_secs(60 * 60),
            update_timeout: Duration::from_secs(60 * 60),
            delete_timeout: Duration::from_secs(60 * 60),
        }
    }
}

impl WaitSettings {
    /// Poll settings for awaiting a stack operation.
    pub fn for_operation(&self, operation: StackOperation) -> PollSettings {
        let timeout = match operation {
            StackOperation::Create => self.create_timeout,
            StackOperation::Update => self.update_timeout,
            StackOperation::Delete => self.delete_timeout,
        };
        self.poll_settings(timeout)
    }

    /// Poll settings for awaiting change set creation.
    pub fn for_change_set(&self) -> PollSettings {
        self.poll_settings(self.change_set_timeout)
    }

    fn poll_settings(&self, timeout: Duration) -> PollSettings {
        PollSettings {
            interval: self.poll_interval,
            max_interval: self.max_poll_interval,
            timeout,
            backoff: self.backoff,
            jitter: self.jitter,
        }
    }
}

/// Log tailing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Prefix of the log group; the project name is appended
    pub group_prefix: String,

    /// Delay between fetch rounds
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Capacity of the channel used by spawned tails
    pub channel_capacity: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            group_prefix: "/docker-compose/".to_string(),
            poll_interval: Duration::from_millis(500),
            channel_capacity: 1024,
        }
    }
}

impl LogSettings {
    /// Log group holding the logs of `project`.
    pub fn group_name(&self, project: &str) -> String {
        format!("{}{}", self.group_prefix, project)
    }
}

impl Config {
    /// Load configuration from defaults, an optional file, and the environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("STACKPILOT_CONFIG").ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Config::default(),
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a single file, without environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = match extension {
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(region) = std::env::var("STACKPILOT_REGION") {
            self.aws.region = Some(region);
        }

        if let Ok(profile) = std::env::var("STACKPILOT_PROFILE") {
            self.aws.profile = Some(profile);
        }

        if let Ok(endpoint) = std::env::var("STACKPILOT_ENDPOINT_URL") {
            self.aws.endpoint_url = Some(endpoint);
        }

        if let Ok(interval) = std::env::var("STACKPILOT_POLL_INTERVAL") {
            self.stack.wait.poll_interval = humantime::parse_duration(&interval)
                .with_context(|| format!("Invalid STACKPILOT_POLL_INTERVAL: {}", interval))?;
        }

        if let Ok(interval) = std::env::var("STACKPILOT_LOG_POLL_INTERVAL") {
            self.logs.poll_interval = humantime::parse_duration(&interval)
                .with_context(|| format!("Invalid STACKPILOT_LOG_POLL_INTERVAL: {}", interval))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.stack.create_timeout_minutes, 10);
        assert_eq!(config.stack.wait.poll_interval, Duration::from_secs(5));
        assert_eq!(config.logs.poll_interval, Duration::from_millis(500));
        assert_eq!(config.logs.group_name("demo"), "/docker-compose/demo");
        assert!(config.aws.region.is_none());
    }

    #[test]
    fn test_wait_settings_per_operation() {
        let wait = WaitSettings {
            create_timeout: Duration::from_secs(100),
            update_timeout: Duration::from_secs(200),
            delete_timeout: Duration::from_secs(300),
            change_set_timeout: Duration::from_secs(50),
            ..WaitSettings::default()
        };
        assert_eq!(wait.for_operation(StackOperation::Create).timeout, Duration::from_secs(100));
        assert_eq!(wait.for_operation(StackOperation::Update).timeout, Duration::from_secs(200));
        assert_eq!(wait.for_operation(StackOperation::Delete).timeout, Duration::from_secs(300));
        assert_eq!(wait.for_change_set().timeout, Duration::from_secs(50));
        assert_eq!(wait.for_change_set().interval, wait.poll_interval);
    }
}
