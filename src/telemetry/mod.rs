//! Local logging setup.
//!
//! Stackpilot instruments every provider call with `tracing` events:
//! `debug!` for individual calls, `info!` for lifecycle transitions and
//! `warn!` for tolerated anomalies. This module only decides how they are
//! printed.
//!
//! ```rust,ignore
//! use stackpilot::telemetry::{LoggingBuilder, LoggingConfig};
//!
//! LoggingBuilder::from_config(LoggingConfig::production()).init()?;
//! ```

pub mod config;
pub mod logging;

pub use config::{LogFormat, LogLevel, LoggingConfig};
pub use logging::{init_from_verbosity, init_json_logging, LoggingBuilder};
