//! VPC, subnet and network interface lookups.

use aws_sdk_ec2::types::{Filter, NetworkInterface};
use std::collections::HashMap;
use tracing::debug;

use super::{provider_error, ResourceClient};
use crate::error::{Error, Result};

const SERVICE: &str = "ec2";

/// Error code EC2 returns for an unknown VPC ID.
const VPC_NOT_FOUND: &str = "InvalidVpcID.NotFound";

fn filter(name: &str, value: &str) -> Filter {
    Filter::builder().name(name).values(value).build()
}

impl ResourceClient {
    /// Whether the VPC exists. An unknown VPC ID is `false`; other errors
    /// are returned.
    pub async fn vpc_exists(&self, vpc_id: &str) -> Result<bool> {
        debug!(vpc = vpc_id, "checking if VPC exists");
        let result = self
            .call("DescribeVpcs", vpc_id, async {
                self.ec2
                    .describe_vpcs()
                    .vpc_ids(vpc_id)
                    .send()
                    .await
                    .map_err(|e| provider_error(SERVICE, e))
            })
            .await;

        match result {
            Ok(output) => Ok(!output.vpcs().is_empty()),
            Err(e) if e.provider_error().is_some_and(|p| p.has_code(VPC_NOT_FOUND)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// ID of the account's default VPC.
    pub async fn default_vpc(&self) -> Result<String> {
        debug!("retrieving default VPC");
        let output = self
            .call("DescribeVpcs", "default", async {
                self.ec2
                    .describe_vpcs()
                    .filters(filter("isDefault", "true"))
                    .send()
                    .await
                    .map_err(|e| provider_error(SERVICE, e))
            })
            .await?;

        output
            .vpcs()
            .first()
            .and_then(|vpc| vpc.vpc_id())
            .map(str::to_string)
            .ok_or(Error::NoDefaultVpc)
    }

    /// IDs of the default-for-AZ subnets of a VPC.
    pub async fn default_subnets(&self, vpc_id: &str) -> Result<Vec<String>> {
        debug!(vpc = vpc_id, "retrieving subnets");
        let output = self
            .call("DescribeSubnets", vpc_id, async {
                self.ec2
                    .describe_subnets()
                    .filters(filter("vpc-id", vpc_id))
                    .filters(filter("default-for-az", "true"))
                    .send()
                    .await
                    .map_err(|e| provider_error(SERVICE, e))
            })
            .await?;

        Ok(output
            .subnets()
            .iter()
            .filter_map(|subnet| subnet.subnet_id())
            .map(str::to_string)
            .collect())
    }

    /// Public IPs of the given network interfaces, keyed by interface ID.
    /// Interfaces without a public association are left out.
    pub async fn public_ips(&self, interfaces: &[String]) -> Result<HashMap<String, String>> {
        if interfaces.is_empty() {
            return Ok(HashMap::new());
        }

        let resource = interfaces.join(",");
        let output = self
            .call("DescribeNetworkInterfaces", &resource, async {
                self.ec2
                    .describe_network_interfaces()
                    .set_network_interface_ids(Some(interfaces.to_vec()))
                    .send()
                    .await
                    .map_err(|e| provider_error(SERVICE, e))
            })
            .await?;

        Ok(public_ip_map(output.network_interfaces()))
    }
}

fn public_ip_map(interfaces: &[NetworkInterface]) -> HashMap<String, String> {
    interfaces
        .iter()
        .filter_map(|eni| {
            let id = eni.network_interface_id()?;
            let ip = eni.association()?.public_ip()?;
            Some((id.to_string(), ip.to_string()))
        })
        .collect()
}
