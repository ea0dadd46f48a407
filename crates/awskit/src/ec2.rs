//! Fleet discovery from EC2 tags.
//!
//! An instance is eligible when it is running, tagged `AutoUpdate=True`
//! (or `true`) and tagged `Environment=<environment>`.

use crate::Client;
use crate::error::Result;
use rollout::{FleetDirectory, ManagedInstance};
use serde::Deserialize;

/// Tag marking an instance as eligible for automatic updates.
pub const AUTO_UPDATE_TAG: &str = "AutoUpdate";

/// Tag selecting the environment.
pub const ENVIRONMENT_TAG: &str = "Environment";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesOutput {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Instance {
    instance_id: String,
    private_ip_address: Option<String>,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Tag {
    key: String,
    value: String,
}

impl Client {
    /// Running instances tagged for automatic update in `environment`.
    pub fn describe_eligible_instances(&self, environment: &str) -> Result<Vec<ManagedInstance>> {
        let auto_update = format!("Name=tag:{AUTO_UPDATE_TAG},Values=True,true");
        let env = format!("Name=tag:{ENVIRONMENT_TAG},Values={environment}");
        let stdout = self.run_aws(&[
            "ec2",
            "describe-instances",
            "--filters",
            &auto_update,
            &env,
            "Name=instance-state-name,Values=running",
        ])?;
        parse_instances(&stdout)
    }
}

impl FleetDirectory for Client {
    fn list_eligible_instances(&self, environment: &str) -> rollout::Result<Vec<ManagedInstance>> {
        let instances = self
            .describe_eligible_instances(environment)
            .map_err(|e| e.into_backend(format!("list instances in {environment}")))?;
        for instance in &instances {
            log::info!("Found EC2 Instance: {instance}");
        }
        Ok(instances)
    }
}

/// Parse `describe-instances` output. Every instance of every reservation
/// is returned; instances without a private address are skipped.
fn parse_instances(json: &str) -> Result<Vec<ManagedInstance>> {
    let output: DescribeInstancesOutput = serde_json::from_str(json)?;

    let mut instances = Vec::new();
    for instance in output.reservations.into_iter().flat_map(|r| r.instances) {
        let Some(address) = instance.private_ip_address else {
            log::warn!(
                "Skipping instance [{}]: no private IP address",
                instance.instance_id
            );
            continue;
        };
        instances.push(ManagedInstance {
            id: instance.instance_id,
            address,
            tags: instance.tags.into_iter().map(|t| (t.key, t.value)).collect(),
        });
    }

    Ok(instances)
}
