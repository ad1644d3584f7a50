//! CloudWatch Logs implementation of [`LogEventSource`].

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudwatchlogs::Client;

use super::provider_error;
use crate::error::ProviderError;
use crate::logs::{LogEvent, LogEventPage, LogEventSource};

const SERVICE: &str = "logs";

/// [`LogEventSource`] over `FilterLogEvents`.
#[derive(Debug, Clone)]
pub struct CloudWatchLogSource {
    client: Client,
}

impl CloudWatchLogSource {
    pub fn new(config: &SdkConfig) -> Self {
        Self::from_client(Client::new(config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LogEventSource for CloudWatchLogSource {
    async fn filter_log_events(
        &self,
        group: &str,
        start_time: i64,
        next_token: Option<String>,
    ) -> Result<LogEventPage, ProviderError> {
        let output = self
            .client
            .filter_log_events()
            .log_group_name(group)
            .start_time(start_time)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, e))?;

        let events = output
            .events()
            .iter()
            .map(|event| LogEvent {
                event_id: event.event_id().map(str::to_string),
                log_stream_name: event.log_stream_name().unwrap_or_default().to_string(),
                message: event.message().unwrap_or_default().to_string(),
                timestamp: event.timestamp(),
                ingestion_time: event.ingestion_time(),
            })
            .collect();

        Ok(LogEventPage {
            events,
            next_token: output.next_token().map(str::to_string),
        })
    }
}
