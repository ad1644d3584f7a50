//! IAM role lookups.

use tracing::debug;

use super::{provider_error, ResourceClient, SdkField};
use crate::error::{Error, Result};

const SERVICE: &str = "iam";

impl ResourceClient {
    /// ARN of the named role.
    pub async fn role_arn(&self, name: &str) -> Result<String> {
        debug!(role = name, "retrieving role ARN");
        let output = self
            .call("GetRole", name, async {
                self.iam
                    .get_role()
                    .role_name(name)
                    .send()
                    .await
                    .map_err(|e| provider_error(SERVICE, e))
            })
            .await?;

        output
            .role()
            .field()
            .and_then(|role| role.arn().field())
            .map(str::to_string)
            .ok_or_else(|| Error::missing_field("GetRole", name, "role ARN"))
    }
}
