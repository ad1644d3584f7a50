//! Cancellable polling for long-running provider operations.
//!
//! Every blocking wait in Stackpilot (change set creation, stack completion)
//! is a loop of remote probes separated by sleeps. The loop:
//!
//! - Probes the provider and returns as soon as the probe reports readiness
//! - Gives up with [`Error::WaitTimeout`] once the configured timeout elapses
//! - Returns [`Error::Cancelled`] as soon as the caller's token fires, both
//!   while a probe is in flight and while sleeping between probes
//!
//! The delay between probes follows a [`BackoffStrategy`] capped at
//! `max_interval`, optionally spread with a [`JitterStrategy`].
//!
//! # Example
//!
//! ```rust,ignore
//! use stackpilot::poll::{poll_until, PollSettings, PollState};
//!
//! let settings = PollSettings::constant(Duration::from_secs(5), Duration::from_secs(600));
//! let status = poll_until(&settings, &cancel, "WaitStackComplete", "app-1", |_| async {
//!     let status = fetch_status().await?;
//!     Ok(if status.is_terminal() { PollState::Ready(status) } else { PollState::Pending })
//! })
//! .await?;
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Backoff strategy for calculating delay between polls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Constant delay between polls.
    Constant,

    /// Linear backoff: delay = interval * (attempt + 1)
    Linear,

    /// Exponential backoff: delay = interval * multiplier^attempt
    Exponential {
        /// Multiplier for exponential growth
        multiplier: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Constant
    }
}

impl BackoffStrategy {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn calculate_delay(&self, attempt: u32, interval: Duration) -> Duration {
        let base_millis = interval.as_millis() as f64;

        let delay_millis = match self {
            Self::Constant => base_millis,
            Self::Linear => base_millis * (attempt as f64 + 1.0),
            Self::Exponential { multiplier } => base_millis * multiplier.powf(attempt as f64),
        };

        Duration::from_millis(delay_millis.min(u64::MAX as f64) as u64)
    }
}

/// Jitter strategy for spreading polls of concurrent waiters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// Use the exact calculated delay.
    None,

    /// Half the delay plus a random share of the other half.
    Equal,

    /// Add a random value within a percentage of the delay (0.0 to 1.0).
    Bounded {
        /// Percentage of delay to use as jitter range
        percentage: f64,
    },
}

impl Default for JitterStrategy {
    fn default() -> Self {
        Self::None
    }
}

impl JitterStrategy {
    /// Apply jitter to a calculated delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let delay_millis = delay.as_millis() as f64;
        let mut rng = rand::thread_rng();

        let jittered_millis = match self {
            Self::None => delay_millis,
            Self::Equal => {
                let half = delay_millis / 2.0;
                if half > 0.0 {
                    half + rng.gen_range(0.0..half)
                } else {
                    0.0
                }
            }
            Self::Bounded { percentage } => {
                let range = delay_millis * percentage.clamp(0.0, 1.0);
                if range > 0.0 {
                    delay_millis + rng.gen_range(-range..range)
                } else {
                    delay_millis
                }
            }
        };

        Duration::from_millis(jittered_millis.max(0.0) as u64)
    }
}

/// Timing of a single wait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollSettings {
    /// Base delay between probes
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Upper bound for the delay after backoff
    #[serde(with = "humantime_serde")]
    pub max_interval: Duration,

    /// Total time allowed for the wait
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Backoff applied to the interval
    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Jitter applied after backoff
    #[serde(default)]
    pub jitter: JitterStrategy,
}

impl PollSettings {
    /// Poll at a fixed interval until `timeout`.
    pub fn constant(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            timeout,
            backoff: BackoffStrategy::Constant,
            jitter: JitterStrategy::None,
        }
    }

    /// Delay to sleep after the given (0-indexed) probe.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self
            .backoff
            .calculate_delay(attempt, self.interval)
            .min(self.max_interval.max(self.interval));
        self.jitter.apply(delay)
    }
}

/// Outcome of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState<T> {
    /// The awaited condition holds.
    Ready(T),
    /// Probe again after the next delay.
    Pending,
}

/// Probe until ready, timed out, failed or cancelled.
///
/// The probe receives the attempt number. A probe error aborts the wait and
/// is returned unchanged.
pub async fn poll_until<T, F, Fut>(
    settings: &PollSettings,
    cancel: &CancellationToken,
    operation: &'static str,
    resource: &str,
    mut probe: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollState<T>>>,
{
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        let state = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::cancelled(operation, resource)),
            state = probe(attempt) => state?,
        };

        if let PollState::Ready(value) = state {
            debug!(operation, resource, attempts = attempt + 1, "wait finished");
            return Ok(value);
        }

        let elapsed = started.elapsed();
        if elapsed >= settings.timeout {
            return Err(Error::WaitTimeout {
                operation,
                resource: resource.to_string(),
                timeout: settings.timeout,
            });
        }

        let delay = settings.delay_for(attempt).min(settings.timeout - elapsed);
        trace!(operation, resource, attempt, ?delay, "still pending");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::cancelled(operation, resource)),
            _ = tokio::time::sleep(delay) => {}
        }

        attempt = attempt.saturating_add(1);
    }
}

/// Run a single provider call, returning [`Error::Cancelled`] if the token
/// fires first. The remote side is not rolled back.
pub async fn cancellable<T, Fut>(
    cancel: &CancellationToken,
    operation: &'static str,
    resource: &str,
    call: Fut,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::cancelled(operation, resource)),
        result = call => result,
    }
}
