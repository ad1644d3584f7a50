//! Idempotent apply of a desired template, with progress reporting.
//!
//! [`StackEngine::converge`] creates the stack when it is absent and otherwise
//! updates it through a change set. Resource events seen while waiting are
//! pushed to a [`ConvergeObserver`].

use parking_lot::Mutex;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::api::StackApi;
use super::engine::{Progress, StackEngine};
use super::types::{ChangeSetExecution, Parameters, StackEvent, StackOperation, Template};
use crate::error::Result;

/// What converge decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergeAction {
    Create,
    Update,
    Delete,
}

/// Result of a successful converge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergeOutcome {
    /// The stack did not exist and was created.
    Created { stack_id: String },
    /// A change set was executed and the update completed.
    Updated { change_set_id: String },
    /// The template and parameters matched the deployed stack.
    Unchanged,
}

/// Progress notification emitted during converge and destroy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergeEvent {
    /// An operation was submitted to the provider.
    Started {
        stack: String,
        action: ConvergeAction,
    },
    /// A resource event not reported before.
    ///
    /// Each probe reports its new events oldest first, the reverse of the
    /// newest-first order the provider returns.
    /// [`StackEngine::stream_events`] keeps the provider order.
    Resource(StackEvent),
    /// The change set turned out to be empty.
    NoChanges { stack: String },
    /// The operation reached its successful terminal state.
    Completed {
        stack: String,
        action: ConvergeAction,
    },
}

/// Receives converge progress. Called inline from the wait loop; must not block.
pub trait ConvergeObserver: Send + Sync {
    fn on_event(&self, event: ConvergeEvent);
}

/// Observer that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ConvergeObserver for NoopObserver {
    fn on_event(&self, _event: ConvergeEvent) {}
}

impl ConvergeObserver for mpsc::UnboundedSender<ConvergeEvent> {
    fn on_event(&self, event: ConvergeEvent) {
        // A dropped receiver only means nobody is listening anymore.
        let _ = self.send(event);
    }
}

/// Remembers which stack event IDs have already been reported.
#[derive(Debug, Default)]
pub struct EventTracker {
    seen: Mutex<HashSet<String>>,
}

impl EventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark events as already reported.
    pub fn seed(&self, events: &[StackEvent]) {
        let mut seen = self.seen.lock();
        seen.extend(events.iter().map(|e| e.event_id.clone()));
    }

    /// Events not reported before, oldest first.
    ///
    /// The provider returns events newest first; the result is reversed so
    /// observers see them in the order they happened.
    pub fn unseen(&self, events: Vec<StackEvent>) -> Vec<StackEvent> {
        let mut seen = self.seen.lock();
        let mut fresh: Vec<StackEvent> = events
            .into_iter()
            .filter(|event| seen.insert(event.event_id.clone()))
            .collect();
        fresh.reverse();
        fresh
    }

    /// Number of distinct events seen so far.
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A: StackApi> StackEngine<A> {
    /// Bring the named stack to `template` with `parameters`.
    ///
    /// Safe to repeat: an unchanged template leaves the stack untouched and
    /// returns [`ConvergeOutcome::Unchanged`]. Updates reuse the stack's
    /// current parameter values; only the keys of `parameters` are sent.
    pub async fn converge(
        &self,
        name: &str,
        template: &Template,
        parameters: &Parameters,
        observer: &dyn ConvergeObserver,
        cancel: &CancellationToken,
    ) -> Result<ConvergeOutcome> {
        let tracker = EventTracker::new();

        let Some(current) = self.describe(name, cancel).await? else {
            let stack_id = self.create(name, template, parameters, cancel).await?;
            observer.on_event(ConvergeEvent::Started {
                stack: name.to_string(),
                action: ConvergeAction::Create,
            });

            let progress = Progress {
                stack_id: &stack_id,
                observer,
                tracker: &tracker,
            };
            self.wait_inner(name, StackOperation::Create, cancel, Some(progress))
                .await?;

            observer.on_event(ConvergeEvent::Completed {
                stack: name.to_string(),
                action: ConvergeAction::Create,
            });
            return Ok(ConvergeOutcome::Created { stack_id });
        };

        self.seed_events(&current.stack_id, &tracker, cancel).await?;

        let change_set_id = self
            .create_change_set(name, template, parameters, cancel)
            .await?;

        match self.execute_change_set(&change_set_id, cancel).await? {
            ChangeSetExecution::NoChanges => {
                if let Err(e) = self.delete_change_set(&change_set_id, cancel).await {
                    warn!(stack = name, change_set = %change_set_id, error = %e, "failed to discard empty change set");
                }
                observer.on_event(ConvergeEvent::NoChanges {
                    stack: name.to_string(),
                });
                info!(stack = name, "stack is up to date");
                Ok(ConvergeOutcome::Unchanged)
            }
            ChangeSetExecution::Executed => {
                observer.on_event(ConvergeEvent::Started {
                    stack: name.to_string(),
                    action: ConvergeAction::Update,
                });

                let progress = Progress {
                    stack_id: &current.stack_id,
                    observer,
                    tracker: &tracker,
                };
                self.wait_inner(name, StackOperation::Update, cancel, Some(progress))
                    .await?;

                observer.on_event(ConvergeEvent::Completed {
                    stack: name.to_string(),
                    action: ConvergeAction::Update,
                });
                Ok(ConvergeOutcome::Updated { change_set_id })
            }
        }
    }

    /// Delete the named stack and wait until it is gone.
    ///
    /// An absent stack is already destroyed.
    pub async fn destroy(
        &self,
        name: &str,
        observer: &dyn ConvergeObserver,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(current) = self.describe(name, cancel).await? else {
            info!(stack = name, "stack already absent");
            return Ok(());
        };

        let tracker = EventTracker::new();
        self.seed_events(&current.stack_id, &tracker, cancel).await?;

        self.delete(name, cancel).await?;
        observer.on_event(ConvergeEvent::Started {
            stack: name.to_string(),
            action: ConvergeAction::Delete,
        });

        let progress = Progress {
            stack_id: &current.stack_id,
            observer,
            tracker: &tracker,
        };
        self.wait_inner(name, StackOperation::Delete, cancel, Some(progress))
            .await?;

        observer.on_event(ConvergeEvent::Completed {
            stack: name.to_string(),
            action: ConvergeAction::Delete,
        });
        Ok(())
    }
}
