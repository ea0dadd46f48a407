//! Collaborator abstractions.
//!
//! The orchestrator only sees these traits:
//! - [`FleetDirectory`] lists the instances eligible for patching
//! - [`PoolControl`] drives the load balancer API
//! - [`RemoteExec`] runs shell commands on a target host
//!
//! Real implementations live in [`ssh`] and in the `awskit` crate; tests use
//! in-memory mocks.

pub mod ssh;

use crate::error::Result;
use crate::types::{DrainPolicy, HealthState, ManagedInstance};

/// Source of instances eligible for update.
pub trait FleetDirectory: Send + Sync {
    /// Instances marked for automatic update in `environment`.
    fn list_eligible_instances(&self, environment: &str) -> Result<Vec<ManagedInstance>>;
}

/// Load balancer pool control API.
///
/// Deregistering an instance that is not registered must be a no-op, so a
/// resumed run can repeat a drain safely.
pub trait PoolControl: Send + Sync {
    /// Names of every pool that currently has `instance_id` registered.
    fn describe_pools_containing(&self, instance_id: &str) -> Result<Vec<String>>;

    /// Connection draining settings of `pool`.
    fn describe_drain_policy(&self, pool: &str) -> Result<DrainPolicy>;

    /// Remove `instance_id` from `pool`.
    fn deregister(&self, pool: &str, instance_id: &str) -> Result<()>;

    /// Add `instance_id` to `pool`.
    fn register(&self, pool: &str, instance_id: &str) -> Result<()>;

    /// Health of `instance_id` in `pool`.
    fn describe_health(&self, pool: &str, instance_id: &str) -> Result<HealthState>;
}

/// Remote command transport.
pub trait RemoteExec: Send + Sync {
    /// Run `command` on `address` and return its combined output.
    ///
    /// Fails if the host is unreachable or the command exits non-zero.
    fn run_command(&self, address: &str, command: &str) -> Result<String>;
}
