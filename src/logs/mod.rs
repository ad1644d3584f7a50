//! Container log tailing.
//!
//! Logs of a deployed project live in one CloudWatch log group
//! (`/docker-compose/<project>` by default), with one stream per task
//! container named `<prefix>/<service>/<container>`. [`LogTailer`] polls
//! that group forever and hands every new event to a [`LogConsumer`].

mod tail;

pub use tail::{LogTailer, Watermark};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;

/// One raw event from the log service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Provider event ID, unique within the group
    pub event_id: Option<String>,
    /// Stream the event was written to
    pub log_stream_name: String,
    pub message: String,
    /// Event time, milliseconds since the epoch
    pub timestamp: Option<i64>,
    /// Time the service ingested the event, milliseconds since the epoch
    pub ingestion_time: Option<i64>,
}

/// One page of a filtered log query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogEventPage {
    pub events: Vec<LogEvent>,
    /// Continuation token; `None` when exhausted
    pub next_token: Option<String>,
}

/// A log event attributed to a service container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub service: String,
    pub container: String,
    pub message: String,
    /// Event time, milliseconds since the epoch
    pub timestamp: Option<i64>,
    /// Ingestion time, milliseconds since the epoch
    pub ingestion_time: i64,
}

impl LogLine {
    pub(crate) fn from_event(event: LogEvent, ingestion_time: i64) -> Self {
        let (service, container) = parse_stream_name(&event.log_stream_name);
        Self {
            service: service.to_string(),
            container: container.to_string(),
            message: event.message,
            timestamp: event.timestamp,
            ingestion_time,
        }
    }
}

/// Split `<prefix>/<service>/<container>` into service and container.
///
/// Streams that do not follow the layout are attributed to a service named
/// after the whole stream, with an empty container.
pub fn parse_stream_name(stream: &str) -> (&str, &str) {
    let parts: Vec<&str> = stream.split('/').collect();
    match parts.as_slice() {
        [_, service, container, ..] => (*service, *container),
        [_, service] => (*service, ""),
        _ => (stream, ""),
    }
}

/// Source of log events, one page per call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogEventSource: Send + Sync {
    /// Events of `group` ingested at or after `start_time` (milliseconds
    /// since the epoch).
    async fn filter_log_events(
        &self,
        group: &str,
        start_time: i64,
        next_token: Option<String>,
    ) -> Result<LogEventPage, ProviderError>;
}

/// Receives tailed log lines.
#[async_trait]
pub trait LogConsumer: Send {
    /// Deliver one line. Returns `false` when the consumer no longer wants
    /// lines, which ends the tail.
    async fn log(&mut self, line: LogLine) -> bool;
}

#[async_trait]
impl LogConsumer for mpsc::Sender<LogLine> {
    async fn log(&mut self, line: LogLine) -> bool {
        self.send(line).await.is_ok()
    }
}

#[async_trait]
impl LogConsumer for mpsc::UnboundedSender<LogLine> {
    async fn log(&mut self, line: LogLine) -> bool {
        self.send(line).is_ok()
    }
}

#[async_trait]
impl LogConsumer for Vec<LogLine> {
    async fn log(&mut self, line: LogLine) -> bool {
        self.push(line);
        true
    }
}
