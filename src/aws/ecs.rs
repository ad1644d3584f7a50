//! ECS clusters and tasks.

use aws_sdk_ecs::types::{Attachment, Task};
use tracing::debug;

use super::{provider_error, ResourceClient};
use crate::error::{Error, Result};
use crate::resources::{service_name_from_group, TaskStatus, ENI_ATTACHMENT_TYPE, ENI_DETAIL_NAME};

const SERVICE: &str = "ecs";

/// Cluster status after a successful deletion.
const INACTIVE: &str = "INACTIVE";

impl ResourceClient {
    /// Whether a cluster with this name is known. Any returned cluster
    /// counts, including inactive ones.
    pub async fn cluster_exists(&self, name: &str) -> Result<bool> {
        debug!(cluster = name, "checking if cluster exists");
        let output = self
            .call("DescribeClusters", name, async {
                self.ecs
                    .describe_clusters()
                    .clusters(name)
                    .send()
                    .await
                    .map_err(|e| provider_error(SERVICE, e))
            })
            .await?;

        Ok(!output.clusters().is_empty())
    }

    /// Create a cluster and return its status.
    pub async fn create_cluster(&self, name: &str) -> Result<String> {
        debug!(cluster = name, "creating cluster");
        let output = self
            .call("CreateCluster", name, async {
                self.ecs
                    .create_cluster()
                    .cluster_name(name)
                    .send()
                    .await
                    .map_err(|e| provider_error(SERVICE, e))
            })
            .await?;

        output
            .cluster()
            .and_then(|c| c.status())
            .map(str::to_string)
            .ok_or_else(|| Error::missing_field("CreateCluster", name, "cluster status"))
    }

    /// Delete a cluster. Fails unless the cluster ends up `INACTIVE`.
    pub async fn delete_cluster(&self, name: &str) -> Result<()> {
        debug!(cluster = name, "deleting cluster");
        let output = self
            .call("DeleteCluster", name, async {
                self.ecs
                    .delete_cluster()
                    .cluster(name)
                    .send()
                    .await
                    .map_err(|e| provider_error(SERVICE, e))
            })
            .await?;

        let status = output.cluster().and_then(|c| c.status()).unwrap_or_default();
        if status == INACTIVE {
            Ok(())
        } else {
            Err(Error::ClusterNotDeleted {
                cluster: name.to_string(),
                status: status.to_string(),
            })
        }
    }

    /// ARNs of the tasks of `service` in `cluster`, across all pages.
    pub async fn list_tasks(&self, cluster: &str, service: &str) -> Result<Vec<String>> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .call("ListTasks", service, async {
                    self.ecs
                        .list_tasks()
                        .cluster(cluster)
                        .service_name(service)
                        .set_next_token(next_token.take())
                        .send()
                        .await
                        .map_err(|e| provider_error(SERVICE, e))
                })
                .await?;

            arns.extend(output.task_arns().iter().cloned());
            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(arns),
            }
        }
    }

    /// Runtime status of the given tasks.
    pub async fn describe_tasks(&self, cluster: &str, arns: &[String]) -> Result<Vec<TaskStatus>> {
        let output = self
            .call("DescribeTasks", cluster, async {
                self.ecs
                    .describe_tasks()
                    .cluster(cluster)
                    .set_tasks(Some(arns.to_vec()))
                    .send()
                    .await
                    .map_err(|e| provider_error(SERVICE, e))
            })
            .await?;

        Ok(output.tasks().iter().map(task_status).collect())
    }
}

fn task_status(task: &Task) -> TaskStatus {
    TaskStatus {
        task_arn: task.task_arn().unwrap_or_default().to_string(),
        state: task.last_status().unwrap_or_default().to_string(),
        service: service_name_from_group(task.group().unwrap_or_default()).to_string(),
        network_interface: network_interface_id(task.attachments())
            .unwrap_or_default()
            .to_string(),
    }
}

/// ENI ID from the network interface attachment, if the task has one.
fn network_interface_id(attachments: &[Attachment]) -> Option<&str> {
    attachments
        .iter()
        .filter(|a| a.r#type() == Some(ENI_ATTACHMENT_TYPE))
        .flat_map(|a| a.details())
        .filter(|detail| detail.name() == Some(ENI_DETAIL_NAME))
        .filter_map(|detail| detail.value())
        .last()
}
