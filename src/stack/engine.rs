//! Stack convergence engine.
//!
//! [`StackEngine`] drives a named CloudFormation stack through creation,
//! change set updates and deletion on top of a [`StackApi`] provider. Each
//! method maps to one step of the protocol; [`StackEngine::converge`] chains
//! them into a single idempotent apply.

use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::api::{ChangeSetRequest, CreateStackRequest, StackApi, CAPABILITY_IAM};
use super::converge::{ConvergeEvent, ConvergeObserver, EventTracker};
use super::types::{
    change_set_name, ChangeSetCreation, ChangeSetDescription, ChangeSetExecution, Parameters,
    StackDescription, StackEvent, StackOperation, StackParameter, Template,
    WaitOutcome,
};
use crate::config::StackSettings;
use crate::error::{Error, Result};
use crate::poll::{cancellable, poll_until, PollState};

/// Failure policy for stack creation: roll back and remove the stack.
pub const ON_FAILURE_DELETE: &str = "DELETE";

/// Event source used while waiting with progress reporting.
pub(crate) struct Progress<'a> {
    pub stack_id: &'a str,
    pub observer: &'a dyn ConvergeObserver,
    pub tracker: &'a EventTracker,
}

/// Drives stacks to a desired template.
///
/// The engine is stateless apart from its settings; clones share the provider.
/// Calls for different stacks may run concurrently. Overlapping operations on
/// the same stack are rejected by the provider and surface as errors.
pub struct StackEngine<A> {
    api: Arc<A>,
    settings: StackSettings,
}

impl<A> Clone for StackEngine<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            settings: self.settings.clone(),
        }
    }
}

impl<A: StackApi> StackEngine<A> {
    /// Create an engine with default settings.
    pub fn new(api: A) -> Self {
        Self::with_settings(api, StackSettings::default())
    }

    /// Create an engine with explicit settings.
    pub fn with_settings(api: A, settings: StackSettings) -> Self {
        Self {
            api: Arc::new(api),
            settings,
        }
    }

    /// The provider behind this engine.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Engine settings.
    pub fn settings(&self) -> &StackSettings {
        &self.settings
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Check whether a stack exists.
    ///
    /// A "stack does not exist" provider error is a negative result. Any
    /// other failure (throttling, permissions, network) is returned.
    pub async fn exists(&self, name: &str, cancel: &CancellationToken) -> Result<bool> {
        debug!(stack = name, "checking if stack exists");
        Ok(self.describe(name, cancel).await?.is_some())
    }

    /// Describe a stack, `None` if the provider does not know it.
    pub async fn describe(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<StackDescription>> {
        cancellable(cancel, "DescribeStacks", name, self.lookup(name)).await
    }

    /// ID of an existing stack.
    pub async fn stack_id(&self, name: &str, cancel: &CancellationToken) -> Result<String> {
        let stacks = cancellable(cancel, "DescribeStacks", name, async {
            self.api
                .describe_stacks(name)
                .await
                .map_err(|e| Error::provider("DescribeStacks", name, e))
        })
        .await?;

        stacks
            .into_iter()
            .next()
            .map(|stack| stack.stack_id)
            .ok_or_else(|| Error::missing_field("DescribeStacks", name, "stack"))
    }

    /// Fetch every event of a stack, following continuation tokens.
    ///
    /// Events are returned in provider order. A failing page aborts the whole
    /// fetch; partial results are discarded.
    pub async fn stream_events(
        &self,
        stack: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<StackEvent>> {
        let mut events = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = cancellable(cancel, "DescribeStackEvents", stack, async {
                self.api
                    .describe_stack_events(stack, next_token.take())
                    .await
                    .map_err(|e| Error::provider("DescribeStackEvents", stack, e))
            })
            .await?;

            pages += 1;
            events.extend(page.events);

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => {
                    debug!(stack, pages, events = events.len(), "fetched stack events");
                    return Ok(events);
                }
            }
        }
    }

    // ========================================================================
    // Stack lifecycle
    // ========================================================================

    /// Submit creation of a new stack and return its ID.
    ///
    /// A failed creation is rolled back and the stack deleted. The call does
    /// not wait; use [`wait_complete`](Self::wait_complete) with
    /// [`StackOperation::Create`].
    pub async fn create(
        &self,
        name: &str,
        template: &Template,
        parameters: &Parameters,
        cancel: &CancellationToken,
    ) -> Result<String> {
        debug!(stack = name, "creating CloudFormation stack");

        let request = CreateStackRequest {
            stack_name: name.to_string(),
            template_body: template.to_json()?,
            parameters: parameters
                .iter()
                .map(|(key, value)| StackParameter {
                    key: key.to_string(),
                    value: value.clone(),
                })
                .collect(),
            timeout_in_minutes: self.settings.create_timeout_minutes,
            on_failure: ON_FAILURE_DELETE.to_string(),
            capabilities: vec![CAPABILITY_IAM.to_string()],
            client_request_token: client_request_token(),
        };

        let stack_id = cancellable(cancel, "CreateStack", name, async {
            self.api
                .create_stack(request)
                .await
                .map_err(|e| Error::provider("CreateStack", name, e))
        })
        .await?;

        info!(stack = name, stack_id = %stack_id, "stack creation submitted");
        Ok(stack_id)
    }

    /// Create an update change set for an existing stack and wait until the
    /// provider has computed it.
    ///
    /// Every parameter is sent with `UsePreviousValue`; `parameters` only
    /// enumerates the keys. A change set that turns out to be empty is not an
    /// error here; [`execute_change_set`](Self::execute_change_set) treats it
    /// as a no-op.
    pub async fn create_change_set(
        &self,
        name: &str,
        template: &Template,
        parameters: &Parameters,
        cancel: &CancellationToken,
    ) -> Result<String> {
        debug!(stack = name, "creating CloudFormation change set");

        let request = ChangeSetRequest {
            change_set_name: change_set_name(Utc::now()),
            stack_name: name.to_string(),
            template_body: template.to_json()?,
            parameters: parameters.keys().map(StackParameter::reuse).collect(),
            capabilities: vec![CAPABILITY_IAM.to_string()],
        };
        let change_set_name = request.change_set_name.clone();

        let change_set_id = cancellable(cancel, "CreateChangeSet", name, async {
            self.api
                .create_change_set(request)
                .await
                .map_err(|e| Error::provider("CreateChangeSet", name, e))
        })
        .await?;

        debug!(stack = name, change_set = %change_set_name, "waiting for change set");

        let settings = self.settings.wait.for_change_set();
        poll_until(
            &settings,
            cancel,
            "WaitChangeSetCreateComplete",
            &change_set_id,
            |_| self.probe_change_set(&change_set_id),
        )
        .await?;

        Ok(change_set_id)
    }

    /// Execute a change set, unless it has nothing to apply.
    ///
    /// Executing an empty change set is a provider error, so an empty one is
    /// reported as [`ChangeSetExecution::NoChanges`] without touching the stack.
    pub async fn execute_change_set(
        &self,
        change_set_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ChangeSetExecution> {
        let description = cancellable(
            cancel,
            "DescribeChangeSet",
            change_set_id,
            self.describe_change_set(change_set_id),
        )
        .await?;

        if description.is_no_change() {
            info!(
                stack = %description.stack_name,
                change_set = %description.name,
                "change set has no changes, skipping execution"
            );
            return Ok(ChangeSetExecution::NoChanges);
        }

        let token = client_request_token();
        cancellable(cancel, "ExecuteChangeSet", change_set_id, async {
            self.api
                .execute_change_set(change_set_id, &token)
                .await
                .map_err(|e| Error::provider("ExecuteChangeSet", change_set_id, e))
        })
        .await?;

        info!(
            stack = %description.stack_name,
            change_set = %description.name,
            changes = description.change_count,
            "change set execution submitted"
        );
        Ok(ChangeSetExecution::Executed)
    }

    /// Discard a change set that will not be executed.
    pub async fn delete_change_set(
        &self,
        change_set_id: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!(change_set = change_set_id, "deleting change set");
        cancellable(cancel, "DeleteChangeSet", change_set_id, async {
            self.api
                .delete_change_set(change_set_id)
                .await
                .map_err(|e| Error::provider("DeleteChangeSet", change_set_id, e))
        })
        .await
    }

    /// Submit stack deletion. Use [`wait_complete`](Self::wait_complete) with
    /// [`StackOperation::Delete`] to await it.
    pub async fn delete(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        debug!(stack = name, "deleting CloudFormation stack");
        let token = client_request_token();
        cancellable(cancel, "DeleteStack", name, async {
            self.api
                .delete_stack(name, &token)
                .await
                .map_err(|e| Error::provider("DeleteStack", name, e))
        })
        .await?;

        info!(stack = name, "stack deletion submitted");
        Ok(())
    }

    /// Block until the stack reaches the terminal state of `operation`.
    ///
    /// Returns [`Error::StackOperationFailed`] when the stack lands in a
    /// failure state, [`Error::WaitTimeout`] when the configured timeout
    /// elapses and [`Error::Cancelled`] when `cancel` fires. Cancelling does
    /// not stop the remote operation.
    pub async fn wait_complete(
        &self,
        name: &str,
        operation: StackOperation,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.wait_inner(name, operation, cancel, None).await
    }

    pub(crate) async fn wait_inner(
        &self,
        name: &str,
        operation: StackOperation,
        cancel: &CancellationToken,
        progress: Option<Progress<'_>>,
    ) -> Result<()> {
        let settings = self.settings.wait.for_operation(operation);
        info!(stack = name, %operation, timeout = ?settings.timeout, "waiting for stack");

        poll_until(&settings, cancel, "WaitStackComplete", name, |_| {
            self.probe_stack(name, operation, progress.as_ref())
        })
        .await?;

        info!(stack = name, %operation, "stack operation complete");
        Ok(())
    }

    // ========================================================================
    // Convergence
    // ========================================================================

    /// Report stack events not seen before to the observer.
    pub(crate) async fn report_new_events(&self, progress: &Progress<'_>) -> Result<()> {
        let page = self
            .api
            .describe_stack_events(progress.stack_id, None)
            .await
            .map_err(|e| Error::provider("DescribeStackEvents", progress.stack_id, e))?;

        for event in progress.tracker.unseen(page.events) {
            progress.observer.on_event(ConvergeEvent::Resource(event));
        }
        Ok(())
    }

    /// Remember the current first page of events so only later ones are reported.
    pub(crate) async fn seed_events(
        &self,
        stack_id: &str,
        tracker: &EventTracker,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let page = cancellable(cancel, "DescribeStackEvents", stack_id, async {
            self.api
                .describe_stack_events(stack_id, None)
                .await
                .map_err(|e| Error::provider("DescribeStackEvents", stack_id, e))
        })
        .await?;
        tracker.seed(&page.events);
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn lookup(&self, name: &str) -> Result<Option<StackDescription>> {
        match self.api.describe_stacks(name).await {
            Ok(stacks) => Ok(stacks.into_iter().next()),
            Err(e) if e.is_stack_not_found() => {
                debug!(stack = name, "stack does not exist");
                Ok(None)
            }
            Err(e) => Err(Error::provider("DescribeStacks", name, e)),
        }
    }

    async fn describe_change_set(&self, change_set_id: &str) -> Result<ChangeSetDescription> {
        self.api
            .describe_change_set(change_set_id)
            .await
            .map_err(|e| Error::provider("DescribeChangeSet", change_set_id, e))
    }

    async fn probe_change_set(&self, change_set_id: &str) -> Result<PollState<()>> {
        let description = self.describe_change_set(change_set_id).await?;
        match description.creation() {
            ChangeSetCreation::Pending => Ok(PollState::Pending),
            ChangeSetCreation::Ready | ChangeSetCreation::Empty => Ok(PollState::Ready(())),
            ChangeSetCreation::Failed => Err(Error::ChangeSetFailed {
                change_set: change_set_id.to_string(),
                reason: description
                    .status_reason
                    .or(Some(format!("status {}", description.status))),
            }),
        }
    }

    async fn probe_stack(
        &self,
        name: &str,
        operation: StackOperation,
        progress: Option<&Progress<'_>>,
    ) -> Result<PollState<()>> {
        let stack = self.lookup(name).await?;

        if let Some(progress) = progress {
            if let Err(e) = self.report_new_events(progress).await {
                warn!(stack = name, error = %e, "failed to fetch stack events");
            }
        }

        let status = stack.as_ref().map(|s| s.status.as_str());
        match operation.evaluate(status) {
            WaitOutcome::Complete => Ok(PollState::Ready(())),
            WaitOutcome::Pending => Ok(PollState::Pending),
            WaitOutcome::Failed => Err(Error::StackOperationFailed {
                stack: name.to_string(),
                operation,
                status: stack
                    .as_ref()
                    .map(|s| s.status.clone())
                    .unwrap_or_else(|| "DOES_NOT_EXIST".to_string()),
                reason: stack.and_then(|s| s.status_reason),
            }),
        }
    }
}

/// Fresh idempotency token for a mutating call.
fn client_request_token() -> String {
    format!("stackpilot-{}", Uuid::new_v4())
}
