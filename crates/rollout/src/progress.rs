//! Progress notifications from the orchestrator.
//!
//! The orchestrator does not print; a [`ProgressCallback`] decides how
//! state changes reach the operator.

use crate::orchestrator::InstanceReport;
use crate::types::{DrainOutcome, InstanceState, ManagedInstance, PoolMembership};

/// Receives progress updates during a run. All methods default to no-ops.
pub trait ProgressCallback {
    /// Membership resolved; processing of `instance` is about to start.
    fn on_instance_start(&mut self, _instance: &ManagedInstance, _membership: &PoolMembership) {}

    /// `instance` entered `state`.
    fn on_transition(&mut self, _instance: &ManagedInstance, _state: InstanceState) {}

    /// Drain from `pool` finished.
    fn on_drained(&mut self, _pool: &str, _instance: &ManagedInstance, _outcome: &DrainOutcome) {}

    /// Instance is healthy in `pool` after `polls` health checks.
    fn on_rejoined(&mut self, _pool: &str, _instance: &ManagedInstance, _polls: u64) {}

    /// Instance finished successfully.
    fn on_instance_complete(&mut self, _report: &InstanceReport) {}
}

/// No-op progress callback.
pub struct NoProgress;

impl ProgressCallback for NoProgress {}
