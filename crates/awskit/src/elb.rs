//! Classic Elastic Load Balancer pool control.

use crate::Client;
use crate::error::Result;
use rollout::{DrainPolicy, HealthState, PoolControl};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeLoadBalancersOutput {
    #[serde(default)]
    load_balancer_descriptions: Vec<LoadBalancerDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoadBalancerDescription {
    load_balancer_name: String,
    #[serde(default)]
    instances: Vec<InstanceRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceRef {
    instance_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeAttributesOutput {
    load_balancer_attributes: LoadBalancerAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoadBalancerAttributes {
    connection_draining: Option<ConnectionDraining>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConnectionDraining {
    enabled: bool,
    #[serde(default)]
    timeout: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstanceHealthOutput {
    #[serde(default)]
    instance_states: Vec<InstanceHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceHealth {
    instance_id: String,
    state: String,
    #[serde(default)]
    description: Option<String>,
}

impl Client {
    /// Names of load balancers with `instance_id` registered.
    pub fn load_balancers_containing(&self, instance_id: &str) -> Result<Vec<String>> {
        let stdout = self.run_aws(&["elb", "describe-load-balancers"])?;
        parse_load_balancers_containing(&stdout, instance_id)
    }

    /// Connection draining attribute of `name`.
    pub fn drain_policy(&self, name: &str) -> Result<DrainPolicy> {
        let stdout = self.run_aws(&[
            "elb",
            "describe-load-balancer-attributes",
            "--load-balancer-name",
            name,
        ])?;
        parse_drain_policy(&stdout)
    }

    /// Health of `instance_id` in `name`.
    ///
    /// An instance the load balancer no longer knows about is out of
    /// service: after draining completes it disappears from the pool.
    pub fn instance_health(&self, name: &str, instance_id: &str) -> Result<HealthState> {
        let result = self.run_aws(&[
            "elb",
            "describe-instance-health",
            "--load-balancer-name",
            name,
            "--instances",
            instance_id,
        ]);
        match result {
            Ok(stdout) => parse_instance_health(&stdout, instance_id),
            Err(e) if e.is_not_registered() => Ok(HealthState::OutOfService),
            Err(e) => Err(e),
        }
    }

    /// Deregister `instance_id` from `name`. Not being registered is fine.
    pub fn deregister_instance(&self, name: &str, instance_id: &str) -> Result<()> {
        let result = self.run_aws(&[
            "elb",
            "deregister-instances-from-load-balancer",
            "--load-balancer-name",
            name,
            "--instances",
            instance_id,
        ]);
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_registered() => {
                log::debug!("[{instance_id}] was not registered in [{name}]");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Register `instance_id` with `name`.
    pub fn register_instance(&self, name: &str, instance_id: &str) -> Result<()> {
        self.run_aws(&[
            "elb",
            "register-instances-with-load-balancer",
            "--load-balancer-name",
            name,
            "--instances",
            instance_id,
        ])?;
        Ok(())
    }
}

impl PoolControl for Client {
    fn describe_pools_containing(&self, instance_id: &str) -> rollout::Result<Vec<String>> {
        self.load_balancers_containing(instance_id)
            .map_err(|e| e.into_backend(format!("describe load balancers for {instance_id}")))
    }

    fn describe_drain_policy(&self, pool: &str) -> rollout::Result<DrainPolicy> {
        self.drain_policy(pool)
            .map_err(|e| e.into_backend(format!("describe attributes of {pool}")))
    }

    fn deregister(&self, pool: &str, instance_id: &str) -> rollout::Result<()> {
        self.deregister_instance(pool, instance_id)
            .map_err(|e| e.into_backend(format!("deregister {instance_id} from {pool}")))
    }

    fn register(&self, pool: &str, instance_id: &str) -> rollout::Result<()> {
        self.register_instance(pool, instance_id)
            .map_err(|e| e.into_backend(format!("register {instance_id} with {pool}")))
    }

    fn describe_health(&self, pool: &str, instance_id: &str) -> rollout::Result<HealthState> {
        self.instance_health(pool, instance_id)
            .map_err(|e| e.into_backend(format!("describe health of {instance_id} in {pool}")))
    }
}

fn parse_load_balancers_containing(json: &str, instance_id: &str) -> Result<Vec<String>> {
    let output: DescribeLoadBalancersOutput = serde_json::from_str(json)?;
    Ok(output
        .load_balancer_descriptions
        .into_iter()
        .filter(|lb| lb.instances.iter().any(|i| i.instance_id == instance_id))
        .map(|lb| lb.load_balancer_name)
        .collect())
}

fn parse_drain_policy(json: &str) -> Result<DrainPolicy> {
    let output: DescribeAttributesOutput = serde_json::from_str(json)?;
    Ok(output
        .load_balancer_attributes
        .connection_draining
        .map(|cd| DrainPolicy {
            enabled: cd.enabled,
            timeout_seconds: cd.timeout,
        })
        .unwrap_or_default())
}

fn parse_instance_health(json: &str, instance_id: &str) -> Result<HealthState> {
    let output: DescribeInstanceHealthOutput = serde_json::from_str(json)?;
    let Some(health) = output
        .instance_states
        .into_iter()
        .find(|s| s.instance_id == instance_id)
    else {
        return Ok(HealthState::Unknown);
    };
    if let Some(description) = &health.description {
        log::debug!("[{instance_id}] {}: {description}", health.state);
    }
    Ok(HealthState::parse(&health.state))
}
