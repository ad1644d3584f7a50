use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{LogConsumer, LogEvent, LogEventSource, LogLine};
use crate::config::LogSettings;
use crate::error::{Error, Result};
use crate::poll::cancellable;

const OPERATION: &str = "TailLogs";

/// Position of a tail in a log group.
///
/// Holds the newest ingestion time delivered so far and the events already
/// delivered at exactly that millisecond. Restarting a tail from a saved
/// watermark never re-delivers an event ingested before it.
///
/// Within one poll every event at or after the starting position is
/// delivered, whatever its ingestion order. An event ingested before the
/// watermark but returned only by a later poll is missed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watermark {
    time: i64,
    seen: HashSet<String>,
}

impl Watermark {
    /// Start at `time` (milliseconds since the epoch) with nothing delivered.
    pub fn at(time: i64) -> Self {
        Self {
            time,
            seen: HashSet::new(),
        }
    }

    /// Newest ingestion time delivered.
    pub fn time(&self) -> i64 {
        self.time
    }

    /// Ingestion time of `event` unless this position already covers it.
    fn admits(&self, event: &LogEvent) -> Option<i64> {
        let time = event.ingestion_time.unwrap_or(self.time);
        let covered =
            time < self.time || (time == self.time && self.seen.contains(&event_key(event)));
        (!covered).then_some(time)
    }

    /// Record the event keyed `key` as delivered at `time`. Never moves
    /// backwards.
    fn advance(&mut self, key: String, time: i64) {
        if time > self.time {
            self.time = time;
            self.seen.clear();
        }
        if time == self.time {
            self.seen.insert(key);
        }
    }
}

fn event_key(event: &LogEvent) -> String {
    match &event.event_id {
        Some(id) => id.clone(),
        None => format!(
            "{}:{}:{}",
            event.log_stream_name,
            event.timestamp.unwrap_or_default(),
            event.message
        ),
    }
}

/// Polls a log group and forwards new events.
pub struct LogTailer<S> {
    source: Arc<S>,
    settings: LogSettings,
}

impl<S> Clone for LogTailer<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            settings: self.settings.clone(),
        }
    }
}

impl<S: LogEventSource> LogTailer<S> {
    pub fn new(source: S) -> Self {
        Self::with_settings(source, LogSettings::default())
    }

    pub fn with_settings(source: S, settings: LogSettings) -> Self {
        Self {
            source: Arc::new(source),
            settings,
        }
    }

    pub fn settings(&self) -> &LogSettings {
        &self.settings
    }

    /// Tail the logs of `project` from the beginning of its log group.
    ///
    /// Never returns `Ok`. Ends with [`Error::Cancelled`] when `cancel` fires
    /// or the consumer stops accepting lines, or with the provider error of a
    /// failed fetch.
    pub async fn tail(
        &self,
        project: &str,
        consumer: &mut dyn LogConsumer,
        cancel: &CancellationToken,
    ) -> Result<Infallible> {
        let group = self.settings.group_name(project);
        let mut watermark = Watermark::default();
        self.tail_from(&group, &mut watermark, consumer, cancel).await
    }

    /// Tail `group` starting at `watermark`, advancing it as lines are
    /// delivered. The watermark can be kept to resume later.
    pub async fn tail_from(
        &self,
        group: &str,
        watermark: &mut Watermark,
        consumer: &mut dyn LogConsumer,
        cancel: &CancellationToken,
    ) -> Result<Infallible> {
        debug!(group, start = watermark.time(), "tailing log group");

        loop {
            let delivered = self.poll_once(group, watermark, consumer, cancel).await?;
            if delivered > 0 {
                trace!(group, delivered, watermark = watermark.time(), "delivered log lines");
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::cancelled(OPERATION, group)),
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
    }

    /// Fetch every page since the watermark once and deliver the new events.
    /// Returns the number of lines delivered.
    pub async fn poll_once(
        &self,
        group: &str,
        watermark: &mut Watermark,
        consumer: &mut dyn LogConsumer,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let start = watermark.clone();
        let mut next_token: Option<String> = None;
        let mut delivered = 0;

        loop {
            let page = cancellable(cancel, "FilterLogEvents", group, async {
                self.source
                    .filter_log_events(group, start.time(), next_token.take())
                    .await
                    .map_err(|e| Error::provider("FilterLogEvents", group, e))
            })
            .await?;

            for event in page.events {
                let Some(ingestion_time) = start.admits(&event) else {
                    continue;
                };
                let key = event_key(&event);

                let line = LogLine::from_event(event, ingestion_time);
                let accepted = cancellable(cancel, OPERATION, group, async {
                    Ok(consumer.log(line).await)
                })
                .await?;
                if !accepted {
                    debug!(group, "log consumer closed");
                    return Err(Error::cancelled(OPERATION, group));
                }
                watermark.advance(key, ingestion_time);
                delivered += 1;
            }

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => return Ok(delivered),
            }
        }
    }
}

impl<S: LogEventSource + 'static> LogTailer<S> {
    /// Run [`tail`](Self::tail) in a background task feeding a bounded
    /// channel of `channel_capacity` lines.
    ///
    /// Dropping the receiver ends the task at its next delivery.
    pub fn spawn(
        &self,
        project: &str,
        cancel: CancellationToken,
    ) -> (JoinHandle<Result<Infallible>>, mpsc::Receiver<LogLine>) {
        let (mut tx, rx) = mpsc::channel(self.settings.channel_capacity.max(1));
        let tailer = self.clone();
        let project = project.to_string();

        let handle = tokio::spawn(async move { tailer.tail(&project, &mut tx, &cancel).await });
        (handle, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, ingestion_time: i64) -> LogEvent {
        LogEvent {
            event_id: Some(id.to_string()),
            log_stream_name: "demo/web/1".to_string(),
            message: format!("message {}", id),
            timestamp: Some(ingestion_time),
            ingestion_time: Some(ingestion_time),
        }
    }

    fn deliver(watermark: &mut Watermark, events: &[LogEvent]) -> Vec<String> {
        let start = watermark.clone();
        let mut delivered = Vec::new();
        for event in events {
            if let Some(time) = start.admits(event) {
                watermark.advance(event_key(event), time);
                delivered.push(event.event_id.clone().unwrap_or_default());
            }
        }
        delivered
    }

    #[test]
    fn test_watermark_moves_forward_only() {
        let mut watermark = Watermark::default();
        assert_eq!(deliver(&mut watermark, &[event("a", 10)]), vec!["a"]);
        assert_eq!(deliver(&mut watermark, &[event("b", 5)]), Vec::<String>::new());
        assert_eq!(watermark.time(), 10);
        assert_eq!(deliver(&mut watermark, &[event("c", 20)]), vec!["c"]);
        assert_eq!(watermark.time(), 20);
    }

    #[test]
    fn test_out_of_order_ingestion_within_a_poll_is_delivered() {
        let mut watermark = Watermark::at(100);
        let delivered = deliver(
            &mut watermark,
            &[event("a", 105), event("b", 103), event("c", 104)],
        );
        assert_eq!(delivered, vec!["a", "b", "c"]);
        assert_eq!(watermark.time(), 105);
    }

    #[test]
    fn test_watermark_skips_duplicates_at_same_millisecond() {
        let mut watermark = Watermark::at(100);
        assert_eq!(
            deliver(&mut watermark, &[event("a", 100), event("b", 100)]),
            vec!["a", "b"]
        );
        assert_eq!(
            deliver(&mut watermark, &[event("a", 100), event("c", 100)]),
            vec!["c"]
        );
    }

    #[test]
    fn test_events_without_id_are_keyed_by_content() {
        let mut watermark = Watermark::default();
        let mut anonymous = event("x", 7);
        anonymous.event_id = None;
        assert_eq!(deliver(&mut watermark, &[anonymous.clone()]).len(), 1);
        assert!(deliver(&mut watermark, &[anonymous]).is_empty());
    }
}
