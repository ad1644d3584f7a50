//! Load balancer lookups.

use tracing::debug;

use super::{provider_error, ResourceClient};
use crate::error::{Error, Result};

const SERVICE: &str = "elasticloadbalancing";

/// Error code ELBv2 returns when no load balancer has the requested name.
const LOAD_BALANCER_NOT_FOUND: &str = "LoadBalancerNotFound";

impl ResourceClient {
    /// Whether a load balancer with this name exists. An unknown name is
    /// `false`; other errors are returned.
    pub async fn load_balancer_exists(&self, name: &str) -> Result<bool> {
        debug!(load_balancer = name, "checking if load balancer exists");
        match self.describe_load_balancer_arns(name).await {
            Ok(arns) => Ok(!arns.is_empty()),
            Err(e)
                if e
                    .provider_error()
                    .is_some_and(|p| p.has_code(LOAD_BALANCER_NOT_FOUND)) =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// ARN of the named load balancer.
    pub async fn load_balancer_arn(&self, name: &str) -> Result<String> {
        debug!(load_balancer = name, "retrieving load balancer ARN");
        self.describe_load_balancer_arns(name)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::missing_field("DescribeLoadBalancers", name, "load balancer"))
    }

    async fn describe_load_balancer_arns(&self, name: &str) -> Result<Vec<String>> {
        let output = self
            .call("DescribeLoadBalancers", name, async {
                self.elb
                    .describe_load_balancers()
                    .names(name)
                    .send()
                    .await
                    .map_err(|e| provider_error(SERVICE, e))
            })
            .await?;

        Ok(output
            .load_balancers()
            .iter()
            .filter_map(|lb| lb.load_balancer_arn())
            .map(str::to_string)
            .collect())
    }
}
