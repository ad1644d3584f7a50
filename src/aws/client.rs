use aws_config::SdkConfig;
use std::convert::Infallible;
use std::future::Future;
use tokio_util::sync::CancellationToken;

use super::logs::CloudWatchLogSource;
use crate::config::{AwsSettings, LogSettings};
use crate::error::{Error, ProviderError, Result};
use crate::logs::{LogConsumer, LogTailer};
use crate::poll::cancellable;

/// Thin typed client with one method per cloud operation.
///
/// Holds no state beyond the SDK clients and a cancellation token that every
/// call is raced against. Provider errors are passed through wrapped with the
/// operation name; the only exceptions are the existence checks, which treat
/// the matching not-found error as `false`.
///
/// Unlike [`StackEngine`](crate::stack::StackEngine), whose methods take a
/// token per call, the cancellation signal is bound once with
/// [`with_cancellation`](Self::with_cancellation) and applies to every call
/// made through this client and its clones. Use a separately configured
/// clone to cancel one group of calls without the others.
#[derive(Debug, Clone)]
pub struct ResourceClient {
    pub(super) ecs: aws_sdk_ecs::Client,
    pub(super) ec2: aws_sdk_ec2::Client,
    pub(super) elb: aws_sdk_elasticloadbalancingv2::Client,
    pub(super) iam: aws_sdk_iam::Client,
    pub(super) secrets: aws_sdk_secretsmanager::Client,
    logs: CloudWatchLogSource,
    cancel: CancellationToken,
}

impl ResourceClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            ecs: aws_sdk_ecs::Client::new(config),
            ec2: aws_sdk_ec2::Client::new(config),
            elb: aws_sdk_elasticloadbalancingv2::Client::new(config),
            iam: aws_sdk_iam::Client::new(config),
            secrets: aws_sdk_secretsmanager::Client::new(config),
            logs: CloudWatchLogSource::new(config),
            cancel: CancellationToken::new(),
        }
    }

    /// Build a client from settings, resolving credentials from the
    /// standard provider chain.
    pub async fn from_settings(settings: &AwsSettings) -> Self {
        Self::new(&super::load_sdk_config(settings).await)
    }

    /// Race every call against `cancel`.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run one SDK call, mapping its error and honouring cancellation.
    pub(super) async fn call<T, Fut>(
        &self,
        operation: &'static str,
        resource: &str,
        call: Fut,
    ) -> Result<T>
    where
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        cancellable(&self.cancel, operation, resource, async {
            call.await.map_err(|e| Error::provider(operation, resource, e))
        })
        .await
    }

    /// Follow the logs of `project` until cancelled; see [`LogTailer::tail`].
    pub async fn tail_logs(
        &self,
        project: &str,
        settings: &LogSettings,
        consumer: &mut dyn LogConsumer,
    ) -> Result<Infallible> {
        LogTailer::with_settings(self.logs.clone(), settings.clone())
            .tail(project, consumer, &self.cancel)
            .await
    }
}
