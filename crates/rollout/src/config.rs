//! Timing configuration passed to the orchestrator at construction.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeouts and buffers for a rollout.
///
/// Every field has a default, so a partial TOML table deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Upper bound on rejoin health polling
    pub max_rejoin_wait_seconds: u64,
    /// Spacing between rejoin health polls
    pub rejoin_poll_interval_seconds: u64,
    /// Extra wait after a pool's drain timeout
    pub drain_settle_margin_seconds: u64,
    /// Extra wait after scheduling the reboot
    pub reboot_buffer_seconds: u64,
    /// Minutes passed to `shutdown -r +N`
    pub reboot_delay_minutes: u64,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            max_rejoin_wait_seconds: 300,
            rejoin_poll_interval_seconds: 5,
            drain_settle_margin_seconds: 5,
            reboot_buffer_seconds: 10,
            reboot_delay_minutes: 0,
        }
    }
}

impl RolloutConfig {
    /// Check invariants that deserialization cannot.
    pub fn validate(&self) -> Result<(), String> {
        if self.rejoin_poll_interval_seconds == 0 {
            return Err("rejoin_poll_interval_seconds must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Number of health polls a rejoin may issue (at least one).
    pub fn max_rejoin_polls(&self) -> u64 {
        let interval = self.rejoin_poll_interval_seconds.max(1);
        (self.max_rejoin_wait_seconds / interval).max(1)
    }

    /// Spacing between rejoin polls.
    pub fn rejoin_poll_interval(&self) -> Duration {
        Duration::from_secs(self.rejoin_poll_interval_seconds)
    }

    /// Margin added after a drain timeout.
    pub fn drain_settle_margin(&self) -> Duration {
        Duration::from_secs(self.drain_settle_margin_seconds)
    }

    /// Total wait after the update sequence: reboot delay plus buffer.
    pub fn post_reboot_wait(&self) -> Duration {
        Duration::from_secs(
            self.reboot_delay_minutes
                .saturating_mul(60)
                .saturating_add(self.reboot_buffer_seconds),
        )
    }
}
