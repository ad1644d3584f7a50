//! AWS SDK backed providers.
//!
//! - [`CloudFormationStackApi`]: the [`StackApi`](crate::stack::StackApi)
//!   used by the stack engine
//! - [`CloudWatchLogSource`]: the [`LogEventSource`](crate::logs::LogEventSource)
//!   used by the log tailer
//! - [`ResourceClient`]: one call per ECS, EC2, ELBv2, IAM and Secrets
//!   Manager operation
//!
//! All of them are built from one [`SdkConfig`], usually obtained with
//! [`load_sdk_config`]. Credentials come from the standard provider chain.

pub mod cloudformation;
pub mod logs;

mod client;
mod ec2;
mod ecs;
mod elb;
mod iam;
mod secrets;

pub use client::ResourceClient;
pub use cloudformation::CloudFormationStackApi;
pub use logs::CloudWatchLogSource;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::AwsSettings;
use crate::error::ProviderError;

/// Key under which the SDK stores the request ID in error metadata.
const REQUEST_ID_KEY: &str = "aws_request_id";

/// Load the shared SDK configuration for the given settings.
pub async fn load_sdk_config(settings: &AwsSettings) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &settings.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(profile) = &settings.profile {
        loader = loader.profile_name(profile);
    }
    if let Some(endpoint) = &settings.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    let config = loader.load().await;
    debug!(region = ?config.region(), "loaded AWS configuration");
    config
}

/// Convert an SDK failure into a [`ProviderError`], keeping code and message.
pub(crate) fn provider_error<E, R>(service: &'static str, err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let request_id = err.meta().extra(REQUEST_ID_KEY).map(str::to_string);
    let error = match err.code() {
        Some(code) => ProviderError::new(
            service,
            code,
            err.message()
                .map(str::to_string)
                .unwrap_or_else(|| DisplayErrorContext(&err).to_string()),
        ),
        None => ProviderError::transport(service, DisplayErrorContext(&err).to_string()),
    };

    match request_id {
        Some(id) => error.with_request_id(id),
        None => error,
    }
}

/// Uniform access to response members the SDK models either as required
/// (`&T`) or optional (`Option<&T>`).
pub(crate) trait SdkField<'a, T: ?Sized> {
    fn field(self) -> Option<&'a T>;
}

impl<'a, T: ?Sized> SdkField<'a, T> for &'a T {
    fn field(self) -> Option<&'a T> {
        Some(self)
    }
}

impl<'a, T: ?Sized> SdkField<'a, T> for Option<&'a T> {
    fn field(self) -> Option<&'a T> {
        self
    }
}

/// Convert an SDK timestamp.
pub(crate) fn to_chrono(time: &aws_sdk_cloudformation::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}
