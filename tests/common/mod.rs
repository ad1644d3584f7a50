//! Shared test utilities and fixtures for the Stackpilot test suite.
//!
//! This module provides:
//! - An in-memory CloudFormation ([`FakeStackApi`]) with scripted status
//!   transitions and failure injection
//! - An in-memory log group ([`FakeLogGroup`])
//! - Builders for templates, settings and events
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use stackpilot::config::{StackSettings, WaitSettings};
use stackpilot::error::ProviderError;
use stackpilot::logs::{LogEvent, LogEventPage, LogEventSource};
use stackpilot::stack::{
    ChangeSetDescription, ChangeSetRequest, CreateStackRequest, ProviderResult, StackApi,
    StackDescription, StackEvent, StackEventPage, StackParameter, Template,
};

pub const NO_CHANGES_REASON: &str = "The submitted information didn't contain changes. Submit different information to create a change set.";

// ============================================================================
// Helper Functions
// ============================================================================

/// Template with a single ECS cluster resource named `name`.
pub fn cluster_template(name: &str) -> Template {
    Template::new(serde_json::json!({
        "AWSTemplateFormatVersion": "2010-09-09",
        "Resources": {
            name: { "Type": "AWS::ECS::Cluster" }
        }
    }))
}

/// Fast waits for tests running on paused time.
pub fn fast_settings() -> StackSettings {
    StackSettings {
        create_timeout_minutes: 10,
        wait: WaitSettings {
            poll_interval: Duration::from_secs(1),
            max_poll_interval: Duration::from_secs(1),
            change_set_timeout: Duration::from_secs(60),
            create_timeout: Duration::from_secs(600),
            update_timeout: Duration::from_secs(600),
            delete_timeout: Duration::from_secs(600),
            ..WaitSettings::default()
        },
    }
}

pub fn not_found(name: &str) -> ProviderError {
    ProviderError::new(
        "cloudformation",
        "ValidationError",
        format!("Stack with id {} does not exist", name),
    )
}

pub fn throttled() -> ProviderError {
    ProviderError::new("cloudformation", "Throttling", "Rate exceeded")
}

// ============================================================================
// Fake CloudFormation
// ============================================================================

#[derive(Debug, Clone)]
struct FakeStack {
    id: String,
    name: String,
    template_body: String,
    parameters: Vec<StackParameter>,
    status: String,
    status_reason: Option<String>,
    pending: VecDeque<(String, Option<String>)>,
    events: Vec<StackEvent>,
}

#[derive(Debug, Clone)]
struct FakeChangeSet {
    description: ChangeSetDescription,
    template_body: String,
    pending_polls: u32,
}

#[derive(Debug, Default)]
struct FakeState {
    stacks: HashMap<String, FakeStack>,
    change_sets: HashMap<String, FakeChangeSet>,
    calls: Vec<String>,
    failures: HashMap<&'static str, VecDeque<Option<ProviderError>>>,
    create_script: Vec<(String, Option<String>)>,
    update_script: Vec<(String, Option<String>)>,
    delete_script: Vec<(String, Option<String>)>,
    change_set_pending_polls: u32,
    change_set_failure: Option<String>,
    event_page_size: usize,
    failing_event_token: Option<String>,
    last_create: Option<CreateStackRequest>,
    last_change_set: Option<ChangeSetRequest>,
    sequence: u32,
}

/// In-memory CloudFormation.
///
/// Each mutating call queues a scripted sequence of statuses; every
/// `DescribeStacks` pops the next one. A stack whose status becomes
/// `DELETE_COMPLETE` disappears. Clones share state, so a test can keep a
/// handle after moving one into the engine.
///
/// # Example
///
/// ```rust,ignore
/// let api = FakeStackApi::new().with_stack("app-1", "CREATE_COMPLETE", &template);
/// api.script_update(&["UPDATE_IN_PROGRESS", "UPDATE_COMPLETE"]);
/// let engine = StackEngine::with_settings(api.clone(), fast_settings());
/// ```
#[derive(Debug, Clone)]
pub struct FakeStackApi {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeStackApi {
    fn default() -> Self {
        Self::new()
    }
}

fn script(statuses: &[&str]) -> Vec<(String, Option<String>)> {
    statuses.iter().map(|s| (s.to_string(), None)).collect()
}

impl FakeStackApi {
    pub fn new() -> Self {
        let state = FakeState {
            create_script: script(&["CREATE_IN_PROGRESS", "CREATE_COMPLETE"]),
            update_script: script(&["UPDATE_IN_PROGRESS", "UPDATE_COMPLETE"]),
            delete_script: script(&["DELETE_IN_PROGRESS", "DELETE_COMPLETE"]),
            event_page_size: 100,
            ..FakeState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Seed an existing stack deployed from `template`.
    pub fn with_stack(self, name: &str, status: &str, template: &Template) -> Self {
        {
            let mut state = self.state.lock();
            state.sequence += 1;
            let id = stack_arn(name, state.sequence);
            let mut stack = FakeStack {
                id: id.clone(),
                name: name.to_string(),
                template_body: template.to_json().unwrap(),
                parameters: Vec::new(),
                status: status.to_string(),
                status_reason: None,
                pending: VecDeque::new(),
                events: Vec::new(),
            };
            push_event(&mut stack, name, status);
            state.stacks.insert(name.to_string(), stack);
        }
        self
    }

    /// Statuses reported after `CreateStack`.
    pub fn script_create(&self, statuses: &[&str]) {
        self.state.lock().create_script = script(statuses);
    }

    /// Statuses reported after `ExecuteChangeSet`.
    pub fn script_update(&self, statuses: &[&str]) {
        self.state.lock().update_script = script(statuses);
    }

    /// Statuses reported after `DeleteStack`.
    pub fn script_delete(&self, statuses: &[&str]) {
        self.state.lock().delete_script = script(statuses);
    }

    /// Attach a reason to the last scripted update status.
    pub fn script_update_failure(&self, statuses: &[&str], reason: &str) {
        let mut script = script(statuses);
        if let Some(last) = script.last_mut() {
            last.1 = Some(reason.to_string());
        }
        self.state.lock().update_script = script;
    }

    /// Number of `CREATE_PENDING` polls before a change set settles.
    pub fn change_set_pending_polls(&self, polls: u32) {
        self.state.lock().change_set_pending_polls = polls;
    }

    /// Settle every later change set as `FAILED` with `reason`.
    pub fn fail_change_sets(&self, reason: &str) {
        self.state.lock().change_set_failure = Some(reason.to_string());
    }

    /// Fail the next call of `operation` with `error`.
    pub fn fail_next(&self, operation: &'static str, error: ProviderError) {
        self.fail_nth(operation, 1, error);
    }

    /// Let `n - 1` calls of `operation` through, then fail one with `error`.
    pub fn fail_nth(&self, operation: &'static str, n: usize, error: ProviderError) {
        let mut state = self.state.lock();
        let queue = state.failures.entry(operation).or_default();
        queue.extend(std::iter::repeat_with(|| None).take(n.saturating_sub(1)));
        queue.push_back(Some(error));
    }

    /// Page size of `DescribeStackEvents`.
    pub fn set_event_page_size(&self, size: usize) {
        self.state.lock().event_page_size = size.max(1);
    }

    /// Fail the event page requested with this continuation token.
    pub fn fail_event_page(&self, token: &str) {
        self.state.lock().failing_event_token = Some(token.to_string());
    }

    /// Append `count` resource events to a stack.
    pub fn add_events(&self, name: &str, count: usize) {
        let mut state = self.state.lock();
        let stack = state.stacks.get_mut(name).expect("stack exists");
        for i in 0..count {
            let logical = format!("Resource{}", i);
            push_event(stack, &logical, "CREATE_COMPLETE");
        }
    }

    /// Operation names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }

    pub fn stack_status(&self, name: &str) -> Option<String> {
        self.state.lock().stacks.get(name).map(|s| s.status.clone())
    }

    pub fn stack_parameters(&self, name: &str) -> Vec<StackParameter> {
        self.state
            .lock()
            .stacks
            .get(name)
            .map(|s| s.parameters.clone())
            .unwrap_or_default()
    }

    pub fn change_set_count(&self) -> usize {
        self.state.lock().change_sets.len()
    }

    pub fn last_create_request(&self) -> Option<CreateStackRequest> {
        self.state.lock().last_create.clone()
    }

    pub fn last_change_set_request(&self) -> Option<ChangeSetRequest> {
        self.state.lock().last_change_set.clone()
    }

    fn enter(&self, operation: &'static str) -> ProviderResult<parking_lot::MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock();
        state.calls.push(operation.to_string());
        if let Some(Some(error)) = state.failures.get_mut(operation).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        Ok(state)
    }
}

fn stack_arn(name: &str, sequence: u32) -> String {
    format!(
        "arn:aws:cloudformation:eu-west-1:123456789012:stack/{}/{:08}",
        name, sequence
    )
}

fn push_event(stack: &mut FakeStack, logical: &str, status: &str) {
    let n = stack.events.len();
    stack.events.push(StackEvent {
        event_id: format!("{}-event-{}", stack.name, n),
        stack_id: stack.id.clone(),
        stack_name: stack.name.clone(),
        logical_resource_id: Some(logical.to_string()),
        physical_resource_id: None,
        resource_type: Some("AWS::CloudFormation::Stack".to_string()),
        resource_status: Some(status.to_string()),
        status_reason: None,
        timestamp: None,
    });
}

fn find_stack<'a>(state: &'a mut FakeState, name_or_id: &str) -> Option<&'a mut FakeStack> {
    let key = state
        .stacks
        .values()
        .find(|s| s.name == name_or_id || s.id == name_or_id)
        .map(|s| s.name.clone())?;
    state.stacks.get_mut(&key)
}

#[async_trait]
impl StackApi for FakeStackApi {
    async fn describe_stacks(&self, stack_name: &str) -> ProviderResult<Vec<StackDescription>> {
        let mut state = self.enter("DescribeStacks")?;
        let stack = find_stack(&mut state, stack_name).ok_or_else(|| not_found(stack_name))?;

        if let Some((status, reason)) = stack.pending.pop_front() {
            let name = stack.name.clone();
            push_event(stack, &name, &status);
            stack.status = status;
            stack.status_reason = reason;
        }

        if stack.status == "DELETE_COMPLETE" {
            let name = stack.name.clone();
            state.stacks.remove(&name);
            return Err(not_found(stack_name));
        }

        Ok(vec![StackDescription {
            stack_id: stack.id.clone(),
            stack_name: stack.name.clone(),
            status: stack.status.clone(),
            status_reason: stack.status_reason.clone(),
            creation_time: None,
        }])
    }

    async fn create_stack(&self, request: CreateStackRequest) -> ProviderResult<String> {
        let mut state = self.enter("CreateStack")?;
        if state.stacks.contains_key(&request.stack_name) {
            return Err(ProviderError::new(
                "cloudformation",
                "AlreadyExistsException",
                format!("Stack [{}] already exists", request.stack_name),
            ));
        }

        state.sequence += 1;
        let id = stack_arn(&request.stack_name, state.sequence);
        let mut stack = FakeStack {
            id: id.clone(),
            name: request.stack_name.clone(),
            template_body: request.template_body.clone(),
            parameters: request.parameters.clone(),
            status: "CREATE_IN_PROGRESS".to_string(),
            status_reason: None,
            pending: state.create_script.iter().cloned().collect(),
            events: Vec::new(),
        };
        push_event(&mut stack, &request.stack_name, "CREATE_IN_PROGRESS");
        state.stacks.insert(request.stack_name.clone(), stack);
        state.last_create = Some(request);
        Ok(id)
    }

    async fn create_change_set(&self, request: ChangeSetRequest) -> ProviderResult<String> {
        let mut state = self.enter("CreateChangeSet")?;
        let pending_polls = state.change_set_pending_polls;
        let failure = state.change_set_failure.clone();
        let stack = find_stack(&mut state, &request.stack_name)
            .ok_or_else(|| not_found(&request.stack_name))?;

        let unchanged = stack.template_body == request.template_body;
        let failed = unchanged || failure.is_some();
        let id = format!(
            "arn:aws:cloudformation:eu-west-1:123456789012:changeSet/{}/{}",
            request.change_set_name,
            stack.events.len()
        );
        let description = ChangeSetDescription {
            id: id.clone(),
            name: request.change_set_name.clone(),
            stack_name: stack.name.clone(),
            status: if failed { "FAILED" } else { "CREATE_COMPLETE" }.to_string(),
            execution_status: Some(if failed { "UNAVAILABLE" } else { "AVAILABLE" }.to_string()),
            status_reason: failure.or_else(|| unchanged.then(|| NO_CHANGES_REASON.to_string())),
            change_count: usize::from(!failed),
        };

        state.change_sets.insert(
            id.clone(),
            FakeChangeSet {
                description,
                template_body: request.template_body.clone(),
                pending_polls,
            },
        );
        state.last_change_set = Some(request);
        Ok(id)
    }

    async fn describe_change_set(&self, change_set_id: &str) -> ProviderResult<ChangeSetDescription> {
        let mut state = self.enter("DescribeChangeSet")?;
        let change_set = state.change_sets.get_mut(change_set_id).ok_or_else(|| {
            ProviderError::new(
                "cloudformation",
                "ChangeSetNotFound",
                format!("ChangeSet [{}] does not exist", change_set_id),
            )
        })?;

        if change_set.pending_polls > 0 {
            change_set.pending_polls -= 1;
            let mut pending = change_set.description.clone();
            pending.status = "CREATE_PENDING".to_string();
            pending.status_reason = None;
            return Ok(pending);
        }
        Ok(change_set.description.clone())
    }

    async fn execute_change_set(
        &self,
        change_set_id: &str,
        _client_request_token: &str,
    ) -> ProviderResult<()> {
        let mut state = self.enter("ExecuteChangeSet")?;
        let change_set = state
            .change_sets
            .remove(change_set_id)
            .ok_or_else(|| ProviderError::new("cloudformation", "ChangeSetNotFound", "missing"))?;

        if change_set.description.status != "CREATE_COMPLETE" {
            return Err(ProviderError::new(
                "cloudformation",
                "InvalidChangeSetStatus",
                format!(
                    "ChangeSet [{}] cannot be executed in its current status of [{}]",
                    change_set_id, change_set.description.status
                ),
            ));
        }

        let script = state.update_script.clone();
        let stack = find_stack(&mut state, &change_set.description.stack_name)
            .ok_or_else(|| not_found(&change_set.description.stack_name))?;
        stack.template_body = change_set.template_body;
        stack.status = "UPDATE_IN_PROGRESS".to_string();
        stack.pending = script.into_iter().collect();
        Ok(())
    }

    async fn delete_change_set(&self, change_set_id: &str) -> ProviderResult<()> {
        let mut state = self.enter("DeleteChangeSet")?;
        state.change_sets.remove(change_set_id);
        Ok(())
    }

    async fn delete_stack(&self, stack_name: &str, _client_request_token: &str) -> ProviderResult<()> {
        let mut state = self.enter("DeleteStack")?;
        let script = state.delete_script.clone();
        if let Some(stack) = find_stack(&mut state, stack_name) {
            stack.status = "DELETE_IN_PROGRESS".to_string();
            stack.pending = script.into_iter().collect();
        }
        Ok(())
    }

    async fn describe_stack_events(
        &self,
        stack_name: &str,
        next_token: Option<String>,
    ) -> ProviderResult<StackEventPage> {
        let mut state = self.enter("DescribeStackEvents")?;
        if next_token.is_some() && next_token == state.failing_event_token {
            return Err(throttled());
        }

        let page_size = state.event_page_size;
        let stack = find_stack(&mut state, stack_name).ok_or_else(|| not_found(stack_name))?;

        let offset: usize = next_token.as_deref().map_or(0, |t| t.parse().unwrap_or(0));
        let newest_first: Vec<StackEvent> = stack.events.iter().rev().cloned().collect();
        let end = (offset + page_size).min(newest_first.len());
        let events = newest_first[offset.min(end)..end].to_vec();

        Ok(StackEventPage {
            events,
            next_token: (end < newest_first.len()).then(|| end.to_string()),
        })
    }
}

// ============================================================================
// Fake CloudWatch Logs
// ============================================================================

/// In-memory log group. Like `FilterLogEvents`, returns stored events whose
/// timestamp is at or after the requested start time, ordered by timestamp
/// and paginated.
#[derive(Debug, Clone)]
pub struct FakeLogGroup {
    events: Arc<Mutex<Vec<LogEvent>>>,
    page_size: usize,
    calls: Arc<AtomicU32>,
    fail_on_call: Arc<Mutex<Option<u32>>>,
}

impl FakeLogGroup {
    pub fn new(page_size: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            page_size: page_size.max(1),
            calls: Arc::new(AtomicU32::new(0)),
            fail_on_call: Arc::new(Mutex::new(None)),
        }
    }

    /// Append an event written by `service`/`container` and ingested in the
    /// same millisecond.
    pub fn push(&self, service: &str, container: &str, message: &str, time: i64) {
        self.push_at(service, container, message, time, time);
    }

    /// Append an event written at `timestamp` and ingested at `ingestion_time`.
    pub fn push_at(
        &self,
        service: &str,
        container: &str,
        message: &str,
        timestamp: i64,
        ingestion_time: i64,
    ) {
        let mut events = self.events.lock();
        let n = events.len();
        events.push(LogEvent {
            event_id: Some(format!("event-{}", n)),
            log_stream_name: format!("demo/{}/{}", service, container),
            message: message.to_string(),
            timestamp: Some(timestamp),
            ingestion_time: Some(ingestion_time),
        });
    }

    /// Fail the `n`-th fetch (1-based).
    pub fn fail_on_call(&self, n: u32) {
        *self.fail_on_call.lock() = Some(n);
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogEventSource for FakeLogGroup {
    async fn filter_log_events(
        &self,
        _group: &str,
        start_time: i64,
        next_token: Option<String>,
    ) -> Result<LogEventPage, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_on_call.lock() == Some(call) {
            return Err(ProviderError::new(
                "logs",
                "ResourceNotFoundException",
                "The specified log group does not exist.",
            ));
        }

        let mut matching: Vec<LogEvent> = self
            .events
            .lock()
            .iter()
            .filter(|e| e.timestamp.unwrap_or_default() >= start_time)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.timestamp.unwrap_or_default());

        let offset: usize = next_token.as_deref().map_or(0, |t| t.parse().unwrap_or(0));
        let end = (offset + self.page_size).min(matching.len());
        Ok(LogEventPage {
            events: matching[offset.min(end)..end].to_vec(),
            next_token: (end < matching.len()).then(|| end.to_string()),
        })
    }
}
