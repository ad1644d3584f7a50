//! Error types for Stackpilot.
//!
//! Provider failures are kept verbatim in [`ProviderError`] and wrapped with the
//! operation and resource they came from. Only the existence checks classify a
//! provider failure as a negative result; everything else bubbles up unchanged.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::stack::StackOperation;

/// Result type alias for Stackpilot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Provider message returned by CloudFormation when a stack name is unknown.
const STACK_NOT_FOUND_MARKER: &str = "does not exist";

/// Error codes the AWS APIs use for request throttling.
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "RequestThrottled",
];

/// A failure reported by a cloud provider API, kept as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// Service that produced the error (e.g. `cloudformation`)
    pub service: &'static str,
    /// Provider error code, when the failure was a modeled service error
    pub code: Option<String>,
    /// Human readable message
    pub message: String,
    /// Request ID, when the provider returned one
    pub request_id: Option<String>,
}

impl ProviderError {
    /// Create a provider error from a service error code and message.
    pub fn new(
        service: &'static str,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service,
            code: Some(code.into()),
            message: message.into(),
            request_id: None,
        }
    }

    /// Create a provider error that did not carry an error code
    /// (dispatch failures, timeouts, unparseable responses).
    pub fn transport(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            code: None,
            message: message.into(),
            request_id: None,
        }
    }

    /// Attach the provider request ID.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Check whether the error carries the given code.
    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    /// CloudFormation reports an unknown stack as a `ValidationError` whose
    /// message contains "does not exist". Other validation errors do not count.
    pub fn is_stack_not_found(&self) -> bool {
        self.has_code("ValidationError") && self.message.contains(STACK_NOT_FOUND_MARKER)
    }

    /// Check whether the provider throttled the request.
    pub fn is_throttling(&self) -> bool {
        self.code
            .as_deref()
            .map(|code| THROTTLING_CODES.contains(&code))
            .unwrap_or(false)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} {}: {}", self.service, code, self.message)?,
            None => write!(f, "{}: {}", self.service, self.message)?,
        }
        if let Some(request_id) = &self.request_id {
            write!(f, " (request id: {})", request_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProviderError {}

/// The main error type for Stackpilot.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Provider Errors
    // ========================================================================
    /// A provider call failed.
    #[error("{operation} failed for '{resource}': {source}")]
    Provider {
        /// Provider operation name (e.g. `DescribeStacks`)
        operation: &'static str,
        /// Resource the call targeted
        resource: String,
        /// Provider failure
        #[source]
        source: ProviderError,
    },

    // ========================================================================
    // Wait Errors
    // ========================================================================
    /// The caller cancelled the operation.
    #[error("{operation} cancelled for '{resource}'")]
    Cancelled {
        /// Operation that was interrupted
        operation: &'static str,
        /// Resource the operation targeted
        resource: String,
    },

    /// A bounded wait ran out of time.
    #[error("timed out after {timeout:?} waiting for {operation} on '{resource}'")]
    WaitTimeout {
        /// Operation being awaited
        operation: &'static str,
        /// Resource being awaited
        resource: String,
        /// Configured timeout
        timeout: Duration,
    },

    // ========================================================================
    // Stack Errors
    // ========================================================================
    /// The stack reached a failure state for the awaited operation.
    #[error("stack '{stack}' {operation} failed with status {status}{}", reason_suffix(.reason))]
    StackOperationFailed {
        /// Stack name
        stack: String,
        /// Operation that was awaited
        operation: StackOperation,
        /// Terminal provider status
        status: String,
        /// Provider status reason
        reason: Option<String>,
    },

    /// The change set could not be created.
    #[error("change set '{change_set}' failed{}", reason_suffix(.reason))]
    ChangeSetFailed {
        /// Change set ID or name
        change_set: String,
        /// Provider status reason
        reason: Option<String>,
    },

    /// An operation kind that the engine does not know.
    #[error("internal error: unexpected stack operation '{0}'")]
    UnknownStackOperation(String),

    // ========================================================================
    // Lookup Errors
    // ========================================================================
    /// The account has no default VPC.
    #[error("account has no default VPC")]
    NoDefaultVpc,

    /// Cluster deletion did not leave the cluster inactive.
    #[error("failed to delete cluster '{cluster}', status: {status}")]
    ClusterNotDeleted {
        /// Cluster name
        cluster: String,
        /// Status returned by the provider
        status: String,
    },

    /// A provider response lacked a field the operation needs.
    #[error("{operation} response for '{resource}' has no {field}")]
    MissingField {
        /// Provider operation name
        operation: &'static str,
        /// Resource the call targeted
        resource: String,
        /// Missing field name
        field: &'static str,
    },

    // ========================================================================
    // Local Errors
    // ========================================================================
    /// Template could not be parsed or rendered.
    #[error("invalid template: {0}")]
    Template(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A background task panicked or was aborted.
    #[error("background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {}", reason),
        None => String::new(),
    }
}

impl Error {
    /// Wrap a provider failure with the operation and resource it belongs to.
    pub fn provider(
        operation: &'static str,
        resource: impl Into<String>,
        source: ProviderError,
    ) -> Self {
        Self::Provider {
            operation,
            resource: resource.into(),
            source,
        }
    }

    /// Create a cancellation error.
    pub fn cancelled(operation: &'static str, resource: impl Into<String>) -> Self {
        Self::Cancelled {
            operation,
            resource: resource.into(),
        }
    }

    /// Create a missing-field error.
    pub fn missing_field(
        operation: &'static str,
        resource: impl Into<String>,
        field: &'static str,
    ) -> Self {
        Self::MissingField {
            operation,
            resource: resource.into(),
            field,
        }
    }

    /// The provider failure behind this error, if any.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Check if this error came from a caller cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Check if a caller-side retry could succeed. Nothing in this crate
    /// retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { source, .. } => source.is_throttling() || source.code.is_none(),
            Self::WaitTimeout { .. } => true,
            _ => false,
        }
    }
}
