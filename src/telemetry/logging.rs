//! Subscriber installation for the `tracing` events Stackpilot emits.
//!
//! Library code only uses the `tracing` macros. Binaries and tests call
//! [`LoggingBuilder::init`] (or one of the helpers) once to print them.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};
use crate::telemetry::config::{LogFormat, LogLevel, LoggingConfig};

/// Builder for the global logging subscriber.
pub struct LoggingBuilder {
    config: LoggingConfig,
}

impl LoggingBuilder {
    /// Create a new logging builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: LoggingConfig::default(),
        }
    }

    /// Create a builder from an existing configuration.
    pub fn from_config(config: LoggingConfig) -> Self {
        Self { config }
    }

    /// Set the log level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// Set the log format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Set ANSI colors.
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.config.ansi_colors = enabled;
        self
    }

    /// Include target in logs.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.config.with_target = enabled;
        self
    }

    /// Set filter directive.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.filter = Some(filter.into());
        self
    }

    /// Install the global subscriber.
    ///
    /// Fails with [`Error::Config`] when a subscriber is already installed.
    pub fn init(self) -> Result<()> {
        let env_filter = self.build_filter();
        let span_events = if self.config.with_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let registry = tracing_subscriber::registry().with(env_filter);
        let base = tracing_subscriber::fmt::layer()
            .with_target(self.config.with_target)
            .with_file(self.config.with_file)
            .with_line_number(self.config.with_file)
            .with_span_events(span_events);

        let installed = match self.config.format {
            LogFormat::Pretty => registry
                .with(base.pretty().with_ansi(self.config.ansi_colors))
                .try_init(),
            LogFormat::Compact => registry
                .with(base.compact().with_ansi(self.config.ansi_colors))
                .try_init(),
            LogFormat::Json => registry
                .with(
                    base.json()
                        .with_current_span(self.config.with_spans)
                        .with_span_list(self.config.with_spans),
                )
                .try_init(),
        };

        installed.map_err(|e| Error::Config(e.to_string()))
    }

    /// `RUST_LOG` wins, then the configured directives, then the level.
    fn build_filter(&self) -> EnvFilter {
        let default_filter = self.config.level.to_string();

        if let Some(ref filter) = self.config.filter {
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(filter))
                .unwrap_or_else(|_| EnvFilter::new(&default_filter))
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter))
        }
    }
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize logging from a `-v` count.
pub fn init_from_verbosity(verbosity: u8) -> Result<()> {
    let config = LoggingConfig {
        level: LogLevel::from_verbosity(verbosity),
        format: if verbosity >= 3 {
            LogFormat::Compact
        } else {
            LogFormat::Pretty
        },
        with_file: verbosity >= 3,
        with_target: verbosity >= 2,
        ..Default::default()
    };

    LoggingBuilder::from_config(config).init()
}

/// Initialize JSON logging for production.
pub fn init_json_logging() -> Result<()> {
    LoggingBuilder::from_config(LoggingConfig::production()).init()
}
