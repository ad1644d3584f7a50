//! # Stackpilot - CloudFormation stack convergence for container deployments
//!
//! Stackpilot drives the AWS side of a compose-style deployment: it applies a
//! CloudFormation template to a named stack, waits for the stack to settle,
//! looks up the resources around it and tails the containers' logs.
//!
//! ## Core Concepts
//!
//! - **Stack engine**: creates a stack, or updates it through a change set,
//!   and waits for the terminal state of each operation
//! - **Convergence**: one idempotent "apply this template" call with
//!   progress events
//! - **Resource client**: one typed call per ECS, EC2, ELBv2, IAM and
//!   Secrets Manager operation
//! - **Log tailer**: a cancellable poll loop over a CloudWatch log group
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │       StackEngine        │   │        LogTailer         │
//! │ (converge, waits, events)│   │ (watermark poll loop)    │
//! └────────────┬─────────────┘   └────────────┬─────────────┘
//!              │ StackApi                     │ LogEventSource
//!              ▼                              ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │  CloudFormationStackApi  │   │   CloudWatchLogSource    │
//! └──────────────────────────┘   └──────────────────────────┘
//!
//! ┌──────────────────────────────────────────────────────────┐
//! │   ResourceClient (ECS, EC2, ELBv2, IAM, Secrets Manager)  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use stackpilot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load(None).map_err(|e| Error::Config(e.to_string()))?;
//!     let sdk = stackpilot::aws::load_sdk_config(&config.aws).await;
//!
//!     let engine = StackEngine::with_settings(CloudFormationStackApi::new(&sdk), config.stack);
//!     let template = Template::from_json_str(&std::fs::read_to_string("stack.json")?)?;
//!     let parameters = Parameters::new().with("Image", "nginx:1.25");
//!
//!     let outcome = engine
//!         .converge("demo", &template, &parameters, &NoopObserver, &CancellationToken::new())
//!         .await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::config::Config;
    pub use crate::error::{Error, ProviderError, Result};
    pub use crate::logs::{LogConsumer, LogLine, LogTailer, Watermark};
    pub use crate::stack::{
        ConvergeEvent, ConvergeObserver, ConvergeOutcome, NoopObserver, Parameters, StackApi,
        StackEngine, StackOperation, Template,
    };
    pub use tokio_util::sync::CancellationToken;

    #[cfg(feature = "aws")]
    pub use crate::aws::{CloudFormationStackApi, CloudWatchLogSource, ResourceClient};
}

pub mod config;
pub mod error;
pub mod logs;
pub mod poll;
pub mod resources;
pub mod stack;
pub mod telemetry;

#[cfg(feature = "aws")]
pub mod aws;

pub use config::Config;
pub use error::{Error, ProviderError, Result};
pub use stack::{StackEngine, StackOperation};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
