//! CloudFormation implementation of [`StackApi`].

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudformation::types::{
    Capability, ChangeSetType, OnFailure, Parameter, Stack, StackEvent as SdkStackEvent,
};
use aws_sdk_cloudformation::Client;
use tracing::debug;

use super::{provider_error, to_chrono, SdkField};
use crate::error::ProviderError;
use crate::stack::{
    ChangeSetDescription, ChangeSetRequest, CreateStackRequest, ParameterValue, ProviderResult,
    StackApi, StackDescription, StackEvent, StackEventPage, StackParameter,
};

const SERVICE: &str = "cloudformation";

/// [`StackApi`] over the CloudFormation SDK client.
#[derive(Debug, Clone)]
pub struct CloudFormationStackApi {
    client: Client,
}

impl CloudFormationStackApi {
    pub fn new(config: &SdkConfig) -> Self {
        Self::from_client(Client::new(config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn parameter(parameter: &StackParameter) -> Parameter {
    let builder = Parameter::builder().parameter_key(&parameter.key);
    let builder = match &parameter.value {
        ParameterValue::Literal(value) => builder.parameter_value(value),
        ParameterValue::UsePrevious => builder.use_previous_value(true),
    };
    builder.build()
}

fn missing(field: &str) -> ProviderError {
    ProviderError::transport(SERVICE, format!("response has no {}", field))
}

fn stack_description(stack: &Stack) -> StackDescription {
    StackDescription {
        stack_id: stack.stack_id().unwrap_or_default().to_string(),
        stack_name: stack.stack_name().field().unwrap_or_default().to_string(),
        status: stack
            .stack_status()
            .field()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        status_reason: stack.stack_status_reason().map(str::to_string),
        creation_time: stack.creation_time().field().and_then(to_chrono),
    }
}

fn stack_event(event: &SdkStackEvent) -> StackEvent {
    StackEvent {
        event_id: event.event_id().field().unwrap_or_default().to_string(),
        stack_id: event.stack_id().field().unwrap_or_default().to_string(),
        stack_name: event.stack_name().field().unwrap_or_default().to_string(),
        logical_resource_id: event.logical_resource_id().map(str::to_string),
        physical_resource_id: event.physical_resource_id().map(str::to_string),
        resource_type: event.resource_type().map(str::to_string),
        resource_status: event.resource_status().map(|s| s.as_str().to_string()),
        status_reason: event.resource_status_reason().map(str::to_string),
        timestamp: event.timestamp().field().and_then(to_chrono),
    }
}

#[async_trait]
impl StackApi for CloudFormationStackApi {
    async fn describe_stacks(&self, stack_name: &str) -> ProviderResult<Vec<StackDescription>> {
        debug!(stack = stack_name, "DescribeStacks");
        let output = self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, e))?;

        Ok(output.stacks().iter().map(stack_description).collect())
    }

    async fn create_stack(&self, request: CreateStackRequest) -> ProviderResult<String> {
        debug!(stack = %request.stack_name, "CreateStack");
        let output = self
            .client
            .create_stack()
            .stack_name(&request.stack_name)
            .template_body(request.template_body)
            .set_parameters(Some(request.parameters.iter().map(parameter).collect()))
            .timeout_in_minutes(request.timeout_in_minutes)
            .on_failure(OnFailure::from(request.on_failure.as_str()))
            .set_capabilities(Some(
                request
                    .capabilities
                    .iter()
                    .map(|c| Capability::from(c.as_str()))
                    .collect(),
            ))
            .client_request_token(request.client_request_token)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, e))?;

        output
            .stack_id()
            .map(str::to_string)
            .ok_or_else(|| missing("StackId"))
    }

    async fn create_change_set(&self, request: ChangeSetRequest) -> ProviderResult<String> {
        debug!(stack = %request.stack_name, change_set = %request.change_set_name, "CreateChangeSet");
        let output = self
            .client
            .create_change_set()
            .change_set_name(request.change_set_name)
            .change_set_type(ChangeSetType::Update)
            .stack_name(request.stack_name)
            .template_body(request.template_body)
            .set_parameters(Some(request.parameters.iter().map(parameter).collect()))
            .set_capabilities(Some(
                request
                    .capabilities
                    .iter()
                    .map(|c| Capability::from(c.as_str()))
                    .collect(),
            ))
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, e))?;

        output.id().map(str::to_string).ok_or_else(|| missing("Id"))
    }

    async fn describe_change_set(
        &self,
        change_set_id: &str,
    ) -> ProviderResult<ChangeSetDescription> {
        debug!(change_set = change_set_id, "DescribeChangeSet");
        let output = self
            .client
            .describe_change_set()
            .change_set_name(change_set_id)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, e))?;

        Ok(ChangeSetDescription {
            id: output
                .change_set_id()
                .unwrap_or(change_set_id)
                .to_string(),
            name: output.change_set_name().unwrap_or_default().to_string(),
            stack_name: output.stack_name().unwrap_or_default().to_string(),
            status: output
                .status()
                .field()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            execution_status: output.execution_status().map(|s| s.as_str().to_string()),
            status_reason: output.status_reason().map(str::to_string),
            change_count: output.changes().len(),
        })
    }

    async fn execute_change_set(
        &self,
        change_set_id: &str,
        client_request_token: &str,
    ) -> ProviderResult<()> {
        debug!(change_set = change_set_id, "ExecuteChangeSet");
        self.client
            .execute_change_set()
            .change_set_name(change_set_id)
            .client_request_token(client_request_token)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, e))?;
        Ok(())
    }

    async fn delete_change_set(&self, change_set_id: &str) -> ProviderResult<()> {
        debug!(change_set = change_set_id, "DeleteChangeSet");
        self.client
            .delete_change_set()
            .change_set_name(change_set_id)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, e))?;
        Ok(())
    }

    async fn delete_stack(&self, stack_name: &str, client_request_token: &str) -> ProviderResult<()> {
        debug!(stack = stack_name, "DeleteStack");
        self.client
            .delete_stack()
            .stack_name(stack_name)
            .client_request_token(client_request_token)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, e))?;
        Ok(())
    }

    async fn describe_stack_events(
        &self,
        stack_name: &str,
        next_token: Option<String>,
    ) -> ProviderResult<StackEventPage> {
        debug!(stack = stack_name, "DescribeStackEvents");
        let output = self
            .client
            .describe_stack_events()
            .stack_name(stack_name)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, e))?;

        Ok(StackEventPage {
            events: output.stack_events().iter().map(stack_event).collect(),
            next_token: output.next_token().map(str::to_string),
        })
    }
}
