//! Provider seam for the stack engine.
//!
//! [`StackApi`] has one method per CloudFormation call the engine makes.
//! Implementations translate requests and responses only: no retries, no
//! waiting and no error classification. Errors are returned exactly as the
//! provider reported them.

use async_trait::async_trait;

use super::types::{ChangeSetDescription, StackDescription, StackEventPage, StackParameter};
use crate::error::ProviderError;

/// Result of a single provider call.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Capability acknowledging that a template may create IAM resources.
pub const CAPABILITY_IAM: &str = "CAPABILITY_IAM";

/// Request to create a new stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStackRequest {
    pub stack_name: String,
    /// Rendered template body
    pub template_body: String,
    pub parameters: Vec<StackParameter>,
    /// Creation timeout handed to the provider
    pub timeout_in_minutes: i32,
    /// Always `DELETE`: a failed creation is rolled back and removed
    pub on_failure: String,
    pub capabilities: Vec<String>,
    /// Idempotency token
    pub client_request_token: String,
}

/// Request to create an update change set for an existing stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetRequest {
    pub change_set_name: String,
    pub stack_name: String,
    pub template_body: String,
    pub parameters: Vec<StackParameter>,
    pub capabilities: Vec<String>,
}

/// CloudFormation operations used by [`StackEngine`](super::StackEngine).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StackApi: Send + Sync {
    /// Describe the stack with the given name or ID.
    ///
    /// An unknown stack is an error from the provider, not an empty list.
    async fn describe_stacks(&self, stack_name: &str) -> ProviderResult<Vec<StackDescription>>;

    /// Submit stack creation and return the new stack ID.
    async fn create_stack(&self, request: CreateStackRequest) -> ProviderResult<String>;

    /// Submit an update change set and return its ID.
    async fn create_change_set(&self, request: ChangeSetRequest) -> ProviderResult<String>;

    /// Describe a change set by ID.
    async fn describe_change_set(&self, change_set_id: &str)
        -> ProviderResult<ChangeSetDescription>;

    /// Execute a change set.
    async fn execute_change_set(
        &self,
        change_set_id: &str,
        client_request_token: &str,
    ) -> ProviderResult<()>;

    /// Delete a change set that will not be executed.
    async fn delete_change_set(&self, change_set_id: &str) -> ProviderResult<()>;

    /// Submit stack deletion.
    async fn delete_stack(&self, stack_name: &str, client_request_token: &str)
        -> ProviderResult<()>;

    /// Fetch one page of stack events.
    async fn describe_stack_events(
        &self,
        stack_name: &str,
        next_token: Option<String>,
    ) -> ProviderResult<StackEventPage>;
}
