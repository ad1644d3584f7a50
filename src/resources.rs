//! Plain values returned by [`ResourceClient`](crate::aws::ResourceClient).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

/// Group prefix ECS puts in front of the service name of a task.
pub const SERVICE_GROUP_PREFIX: &str = "service:";

/// Attachment type carrying a task's network interface.
pub const ENI_ATTACHMENT_TYPE: &str = "ElasticNetworkInterface";

/// Attachment detail naming the network interface.
pub const ENI_DETAIL_NAME: &str = "networkInterfaceId";

/// A stored credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    /// Provider ARN
    pub id: String,
    pub name: String,
    pub description: String,
    /// Tags attached to the secret
    pub labels: BTreeMap<String, String>,
}

/// Input for creating a registry credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSpec {
    pub name: String,
    pub description: String,
    pub username: String,
    pub password: String,
    /// Stored as tags
    pub labels: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

impl SecretSpec {
    pub fn new(
        name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Secret string stored by the provider: `{"username":..,"password":..}`.
    pub fn credential_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&Credentials {
            username: &self.username,
            password: &self.password,
        })?)
    }
}

/// Runtime view of one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_arn: String,
    /// Last reported status (`RUNNING`, `STOPPED`, ...)
    pub state: String,
    /// Service the task belongs to, without the `service:` prefix
    pub service: String,
    /// ID of the attached network interface, empty when none
    pub network_interface: String,
}

/// Bare service name from an ECS task group.
///
/// Only a leading `service:` is removed, once.
pub fn service_name_from_group(group: &str) -> &str {
    group.strip_prefix(SERVICE_GROUP_PREFIX).unwrap_or(group)
}
