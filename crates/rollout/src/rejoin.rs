//! Re-registration with health polling.

use crate::backend::PoolControl;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::types::HealthState;
use std::time::Duration;

/// Registers an instance in a pool and blocks until it is healthy.
pub struct RejoinController<'a> {
    pools: &'a dyn PoolControl,
    clock: &'a dyn Clock,
    poll_interval: Duration,
    max_polls: u64,
}

impl<'a> RejoinController<'a> {
    /// Create a controller that polls every `poll_interval`, at most
    /// `max_polls` times.
    pub fn new(
        pools: &'a dyn PoolControl,
        clock: &'a dyn Clock,
        poll_interval: Duration,
        max_polls: u64,
    ) -> Self {
        Self {
            pools,
            clock,
            poll_interval,
            max_polls: max_polls.max(1),
        }
    }

    /// Register `instance_id` in `pool` and wait for `InService`.
    ///
    /// Returns the number of polls it took. Running out of polls is fatal:
    /// a pool silently missing capacity is worse than stopping the run.
    pub fn rejoin(&self, pool: &str, instance_id: &str) -> Result<u64> {
        log::info!("Registering instance [{instance_id}] in pool [{pool}]...");
        self.pools.register(pool, instance_id)?;

        for poll in 1..=self.max_polls {
            self.clock.sleep(self.poll_interval);
            let state = self.pools.describe_health(pool, instance_id)?;
            log::debug!("Poll {poll}/{}: [{instance_id}] in [{pool}] is {state}", self.max_polls);

            if state == HealthState::InService {
                log::info!("Instance [{instance_id}] is now [{state}] in pool [{pool}]");
                return Ok(poll);
            }
        }

        let waited_secs = self.poll_interval.as_secs() * self.max_polls;
        log::error!(
            "Instance [{instance_id}] failed to become healthy in pool [{pool}] within [{waited_secs}] seconds!"
        );
        Err(Error::RejoinTimeout {
            pool: pool.to_string(),
            instance: instance_id.to_string(),
            waited_secs,
            polls: self.max_polls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, MockPools, PoolCall};

    const INTERVAL: Duration = Duration::from_secs(5);

    #[test]
    fn test_healthy_on_first_poll() {
        let pools = MockPools::new();
        let clock = ManualClock::new();

        let polls = RejoinController::new(&pools, &clock, INTERVAL, 60)
            .rejoin("web-a", "i-1")
            .unwrap();

        assert_eq!(polls, 1);
        assert!(pools.is_member("web-a", "i-1"));
        assert_eq!(clock.sleeps(), vec![INTERVAL]);
        assert_eq!(
            pools.calls()[0],
            PoolCall::Register("web-a".to_string(), "i-1".to_string())
        );
    }

    #[test]
    fn test_healthy_after_transitional_states() {
        let pools = MockPools::new().with_health_script(
            "web-a",
            "i-1",
            &[
                HealthState::OutOfService,
                HealthState::Unknown,
                HealthState::OutOfService,
                HealthState::InService,
            ],
        );
        let clock = ManualClock::new();

        let polls = RejoinController::new(&pools, &clock, INTERVAL, 60)
            .rejoin("web-a", "i-1")
            .unwrap();

        assert_eq!(polls, 4);
        assert_eq!(clock.elapsed(), Duration::from_secs(20));
    }

    #[test]
    fn test_timeout_after_max_polls() {
        let pools =
            MockPools::new().with_fixed_health("web-a", "i-1", HealthState::OutOfService);
        let clock = ManualClock::new();

        // 300s / 5s
        let err = RejoinController::new(&pools, &clock, INTERVAL, 60)
            .rejoin("web-a", "i-1")
            .unwrap_err();

        match err {
            Error::RejoinTimeout {
                pool,
                instance,
                waited_secs,
                polls,
            } => {
                assert_eq!(pool, "web-a");
                assert_eq!(instance, "i-1");
                assert_eq!(waited_secs, 300);
                assert_eq!(polls, 60);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(pools.health_queries("web-a", "i-1"), 60);
        assert_eq!(clock.sleeps().len(), 60);
    }

    #[test]
    fn test_register_failure_propagates() {
        let pools = MockPools::new().failing_register("web-a");
        let clock = ManualClock::new();

        let err = RejoinController::new(&pools, &clock, INTERVAL, 60)
            .rejoin("web-a", "i-1")
            .unwrap_err();

        assert!(matches!(err, Error::Backend { .. }));
        assert!(clock.sleeps().is_empty());
    }
}
