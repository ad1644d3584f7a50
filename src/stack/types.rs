//! Stack, change set and event types shared by the engine and its providers.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Status reasons CloudFormation uses for a change set that would not modify
/// the stack. Matched as prefixes.
pub const NO_CHANGE_REASONS: &[&str] = &[
    "The submitted information didn't contain changes.",
    "No updates are to be performed.",
];

// ============================================================================
// Template
// ============================================================================

/// An infrastructure document understood by the stack service.
///
/// The content is opaque to Stackpilot; it is only rendered to a JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template {
    body: serde_json::Value,
}

impl Template {
    /// Wrap an already parsed document.
    pub fn new(body: serde_json::Value) -> Self {
        Self { body }
    }

    /// Build a template from any serializable document.
    pub fn from_serializable<T: Serialize>(document: &T) -> Result<Self> {
        serde_json::to_value(document)
            .map(Self::new)
            .map_err(|e| Error::Template(e.to_string()))
    }

    /// Parse a JSON template.
    pub fn from_json_str(source: &str) -> Result<Self> {
        serde_json::from_str(source)
            .map(Self::new)
            .map_err(|e| Error::Template(e.to_string()))
    }

    /// Parse a YAML template. Short-form intrinsic tags (`!Ref`) are not
    /// supported; use the long form (`Ref:`).
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        serde_yaml::from_str(source)
            .map(Self::new)
            .map_err(|e| Error::Template(e.to_string()))
    }

    /// The parsed document.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.body
    }

    /// Render the body sent to the provider.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.body)?)
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Value of a single stack parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterValue {
    /// Use this value.
    Literal(String),
    /// Keep whatever value the stack currently has.
    UsePrevious,
}

/// Named stack parameters, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(IndexMap<String, ParameterValue>);

impl Parameters {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a literal value, replacing any previous entry for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0
            .insert(key.into(), ParameterValue::Literal(value.into()));
        self
    }

    /// Mark `key` as reusing the stack's current value.
    pub fn reuse(&mut self, key: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), ParameterValue::UsePrevious);
        self
    }

    /// Builder-style [`Parameters::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a parameter.
    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.0.get(key)
    }

    /// Parameter names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate over parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut parameters = Parameters::new();
        for (key, value) in iter {
            parameters.insert(key, value);
        }
        parameters
    }
}

impl From<HashMap<String, String>> for Parameters {
    fn from(map: HashMap<String, String>) -> Self {
        let mut entries: Vec<_> = map.into_iter().collect();
        entries.sort();
        entries.into_iter().collect()
    }
}

/// A parameter as sent in a stack or change set request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackParameter {
    /// Parameter name
    pub key: String,
    /// Value or reuse marker
    pub value: ParameterValue,
}

impl StackParameter {
    /// Parameter that keeps the stack's current value.
    pub fn reuse(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: ParameterValue::UsePrevious,
        }
    }
}

// ============================================================================
// Operations and states
// ============================================================================

/// A stack operation whose completion can be awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackOperation {
    /// Stack creation
    Create,
    /// Change set execution
    Update,
    /// Stack deletion
    Delete,
}

impl StackOperation {
    /// Provider status that ends the operation successfully.
    pub fn complete_status(&self) -> &'static str {
        match self {
            Self::Create => "CREATE_COMPLETE",
            Self::Update => "UPDATE_COMPLETE",
            Self::Delete => "DELETE_COMPLETE",
        }
    }

    /// Classify the observed stack status for this operation.
    ///
    /// `None` means the provider reported the stack as not found.
    pub fn evaluate(&self, status: Option<&str>) -> WaitOutcome {
        let Some(status) = status else {
            return match self {
                Self::Delete => WaitOutcome::Complete,
                // OnFailure=DELETE removes a stack whose creation failed.
                Self::Create | Self::Update => WaitOutcome::Failed,
            };
        };

        if status == self.complete_status() {
            return WaitOutcome::Complete;
        }

        let failed = match self {
            Self::Create => matches!(
                status,
                "CREATE_FAILED"
                    | "ROLLBACK_COMPLETE"
                    | "ROLLBACK_FAILED"
                    | "DELETE_COMPLETE"
                    | "DELETE_FAILED"
            ),
            Self::Update => matches!(
                status,
                "UPDATE_FAILED" | "UPDATE_ROLLBACK_COMPLETE" | "UPDATE_ROLLBACK_FAILED"
            ),
            Self::Delete => status == "DELETE_FAILED",
        };

        if failed {
            WaitOutcome::Failed
        } else {
            WaitOutcome::Pending
        }
    }
}

impl fmt::Display for StackOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

impl FromStr for StackOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(Error::UnknownStackOperation(s.to_string())),
        }
    }
}

impl TryFrom<i32> for StackOperation {
    type Error = Error;

    /// Numeric operation codes used by older callers: 0 create, 1 update, 2 delete.
    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::Create),
            1 => Ok(Self::Update),
            2 => Ok(Self::Delete),
            other => Err(Error::UnknownStackOperation(other.to_string())),
        }
    }
}

/// Result of evaluating a stack status against an awaited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The operation finished successfully.
    Complete,
    /// The operation is still running.
    Pending,
    /// The stack reached a failure state.
    Failed,
}

/// Coarse lifecycle state of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackState {
    DoesNotExist,
    Creating,
    CreateComplete,
    Updating,
    UpdateComplete,
    Deleting,
    DeleteComplete,
    Failed,
}

impl StackState {
    /// Map a raw provider status onto the lifecycle.
    pub fn from_status(status: &str) -> Self {
        match status {
            "CREATE_IN_PROGRESS" | "REVIEW_IN_PROGRESS" => Self::Creating,
            "CREATE_COMPLETE" | "IMPORT_COMPLETE" => Self::CreateComplete,
            "UPDATE_IN_PROGRESS"
            | "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS"
            | "IMPORT_IN_PROGRESS" => Self::Updating,
            "UPDATE_COMPLETE" => Self::UpdateComplete,
            "DELETE_IN_PROGRESS" => Self::Deleting,
            "DELETE_COMPLETE" => Self::DeleteComplete,
            _ => Self::Failed,
        }
    }

    /// Whether no operation is running on the stack.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Creating | Self::Updating | Self::Deleting)
    }
}

// ============================================================================
// Provider views
// ============================================================================

/// A stack as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescription {
    /// Cloud-assigned ID
    pub stack_id: String,
    /// User-assigned name
    pub stack_name: String,
    /// Raw provider status (e.g. `UPDATE_ROLLBACK_COMPLETE`)
    pub status: String,
    /// Reason attached to the status
    pub status_reason: Option<String>,
    /// Creation time
    pub creation_time: Option<DateTime<Utc>>,
}

impl StackDescription {
    /// Lifecycle state derived from the raw status.
    pub fn state(&self) -> StackState {
        StackState::from_status(&self.status)
    }
}

/// One resource transition within a stack operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEvent {
    pub event_id: String,
    pub stack_id: String,
    pub stack_name: String,
    pub logical_resource_id: Option<String>,
    pub physical_resource_id: Option<String>,
    pub resource_type: Option<String>,
    pub resource_status: Option<String>,
    pub status_reason: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// One page of stack events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackEventPage {
    /// Events in provider order
    pub events: Vec<StackEvent>,
    /// Continuation token; `None` when exhausted
    pub next_token: Option<String>,
}

/// Creation state of a change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSetCreation {
    /// Still being computed
    Pending,
    /// Ready to execute
    Ready,
    /// Computed, but would not change the stack
    Empty,
    /// Creation failed or the change set was deleted
    Failed,
}

/// A change set as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetDescription {
    pub id: String,
    pub name: String,
    pub stack_name: String,
    /// Raw creation status (e.g. `CREATE_COMPLETE`, `FAILED`)
    pub status: String,
    /// Raw execution status (e.g. `AVAILABLE`, `UNAVAILABLE`)
    pub execution_status: Option<String>,
    pub status_reason: Option<String>,
    /// Number of resource changes
    pub change_count: usize,
}

impl ChangeSetDescription {
    /// Whether the status reason says the change set has nothing to apply.
    pub fn is_no_change(&self) -> bool {
        self.status_reason
            .as_deref()
            .map(|reason| NO_CHANGE_REASONS.iter().any(|p| reason.starts_with(p)))
            .unwrap_or(false)
    }

    /// Classify the creation status.
    pub fn creation(&self) -> ChangeSetCreation {
        match self.status.as_str() {
            "CREATE_PENDING" | "CREATE_IN_PROGRESS" => ChangeSetCreation::Pending,
            "CREATE_COMPLETE" => ChangeSetCreation::Ready,
            "FAILED" if self.is_no_change() => ChangeSetCreation::Empty,
            _ => ChangeSetCreation::Failed,
        }
    }
}

/// What [`execute_change_set`](crate::stack::StackEngine::execute_change_set) did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSetExecution {
    /// Execution was submitted; the stack is updating.
    Executed,
    /// The change set was empty; nothing was submitted.
    NoChanges,
}

/// Name of an update change set created at `now`.
pub fn change_set_name(now: DateTime<Utc>) -> String {
    now.format("Update-%Y-%m-%d-%H-%M-%S").to_string()
}
