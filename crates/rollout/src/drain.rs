//! Connection draining.
//!
//! Health is checked exactly twice on the waiting path: right after
//! deregistration, then once after the pool's full drain timeout plus a
//! settle margin. There is no interval polling in between.

use crate::backend::PoolControl;
use crate::clock::Clock;
use crate::error::Result;
use crate::types::{DrainOutcome, HealthState};
use std::time::Duration;

/// Removes an instance from one pool and waits out connection draining.
pub struct DrainController<'a> {
    pools: &'a dyn PoolControl,
    clock: &'a dyn Clock,
    settle_margin: Duration,
}

impl<'a> DrainController<'a> {
    /// Create a controller; `settle_margin` is added after the drain timeout.
    pub fn new(pools: &'a dyn PoolControl, clock: &'a dyn Clock, settle_margin: Duration) -> Self {
        Self {
            pools,
            clock,
            settle_margin,
        }
    }

    /// Deregister `instance_id` from `pool` and wait for in-flight
    /// connections to finish.
    ///
    /// Never blocks longer than the pool's drain timeout plus the margin. An
    /// instance still in service afterwards is logged and reported as
    /// [`DrainOutcome::StillInService`], not as an error.
    pub fn drain(&self, pool: &str, instance_id: &str) -> Result<DrainOutcome> {
        // Read fresh: the policy can change between runs
        let policy = self.pools.describe_drain_policy(pool)?;
        let timeout = policy.effective_timeout();

        log::info!("Removing instance [{instance_id}] from pool [{pool}]...");
        self.pools.deregister(pool, instance_id)?;

        let state = self.pools.describe_health(pool, instance_id)?;
        log::debug!("Health of [{instance_id}] in [{pool}] after deregister: {state}");

        if timeout == 0 || state == HealthState::OutOfService {
            return Ok(DrainOutcome::Immediate { state });
        }

        log::info!("Waiting [{timeout}] seconds for connection draining to complete...");
        self.clock.sleep(Duration::from_secs(timeout));
        self.clock.sleep(self.settle_margin);

        let state = self.pools.describe_health(pool, instance_id)?;
        if state == HealthState::OutOfService {
            log::info!("Instance [{instance_id}] has been deregistered from pool [{pool}]");
            Ok(DrainOutcome::Drained)
        } else {
            log::warn!(
                "Instance [{instance_id}] is still [{state}] in pool [{pool}] after draining; continuing"
            );
            Ok(DrainOutcome::StillInService { state })
        }
    }
}
