//! Registry credentials in Secrets Manager.

use aws_sdk_secretsmanager::types::Tag;
use std::collections::BTreeMap;
use tracing::debug;

use super::{provider_error, ResourceClient};
use crate::error::{Error, Result};
use crate::resources::{Secret, SecretSpec};

const SERVICE: &str = "secretsmanager";

fn labels(tags: &[Tag]) -> BTreeMap<String, String> {
    tags.iter()
        .filter_map(|tag| Some((tag.key()?.to_string(), tag.value()?.to_string())))
        .collect()
}

impl ResourceClient {
    /// Store a credential and return its ARN.
    pub async fn create_secret(&self, spec: &SecretSpec) -> Result<String> {
        debug!(secret = %spec.name, "creating secret");
        let secret_string = spec.credential_string()?;
        let tags = spec
            .labels
            .iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build())
            .collect();

        let output = self
            .call("CreateSecret", &spec.name, async {
                self.secrets
                    .create_secret()
                    .name(&spec.name)
                    .description(&spec.description)
                    .secret_string(secret_string)
                    .set_tags(Some(tags))
                    .send()
                    .await
                    .map_err(|e| provider_error(SERVICE, e))
            })
            .await?;

        output
            .arn()
            .map(str::to_string)
            .ok_or_else(|| Error::missing_field("CreateSecret", &spec.name, "ARN"))
    }

    /// Metadata of a stored credential. The secret value is not read.
    pub async fn inspect_secret(&self, id: &str) -> Result<Secret> {
        debug!(secret = id, "inspecting secret");
        let output = self
            .call("DescribeSecret", id, async {
                self.secrets
                    .describe_secret()
                    .secret_id(id)
                    .send()
                    .await
                    .map_err(|e| provider_error(SERVICE, e))
            })
            .await?;

        Ok(Secret {
            id: output.arn().unwrap_or(id).to_string(),
            name: output.name().unwrap_or_default().to_string(),
            description: output.description().unwrap_or_default().to_string(),
            labels: labels(output.tags()),
        })
    }

    /// Every stored credential, across all pages.
    pub async fn list_secrets(&self) -> Result<Vec<Secret>> {
        debug!("listing secrets");
        let mut secrets = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .call("ListSecrets", "*", async {
                    self.secrets
                        .list_secrets()
                        .set_next_token(next_token.take())
                        .send()
                        .await
                        .map_err(|e| provider_error(SERVICE, e))
                })
                .await?;

            secrets.extend(output.secret_list().iter().map(|entry| Secret {
                id: entry.arn().unwrap_or_default().to_string(),
                name: entry.name().unwrap_or_default().to_string(),
                description: entry.description().unwrap_or_default().to_string(),
                labels: labels(entry.tags()),
            }));

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(secrets),
            }
        }
    }

    /// Delete a credential. With `recover` the secret stays restorable for
    /// the provider's recovery window; otherwise it is removed immediately.
    pub async fn delete_secret(&self, id: &str, recover: bool) -> Result<()> {
        debug!(secret = id, recover, "deleting secret");
        self.call("DeleteSecret", id, async {
            self.secrets
                .delete_secret()
                .secret_id(id)
                .force_delete_without_recovery(!recover)
                .send()
                .await
                .map_err(|e| provider_error(SERVICE, e))
        })
        .await?;
        Ok(())
    }
}
