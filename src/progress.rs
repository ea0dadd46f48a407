//! Terminal progress for a rollout.

use crate::ui;
use rollout::{
    DrainOutcome, InstanceReport, InstanceState, ManagedInstance, PoolMembership, ProgressCallback,
};

/// Prints one step per instance and a line per pool operation.
pub struct TerminalProgress {
    quiet: bool,
    total: usize,
    current: usize,
}

impl TerminalProgress {
    pub fn new(total: usize, quiet: bool) -> Self {
        Self {
            quiet,
            total,
            current: 0,
        }
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_instance_start(&mut self, instance: &ManagedInstance, membership: &PoolMembership) {
        self.current += 1;
        if self.quiet {
            return;
        }
        println!();
        ui::step(self.current, self.total, &instance.to_string());
        if membership.is_empty() {
            ui::dim("not in any load balancer");
        } else {
            ui::kv("pools", &membership.to_string());
        }
    }

    fn on_transition(&mut self, instance: &ManagedInstance, state: InstanceState) {
        if self.quiet {
            return;
        }
        match state {
            InstanceState::Patched => ui::dim(&format!("patching {}", instance.address)),
            InstanceState::Rejoining => ui::dim("waiting for load balancers"),
            _ => {}
        }
    }

    fn on_drained(&mut self, pool: &str, _instance: &ManagedInstance, outcome: &DrainOutcome) {
        if self.quiet {
            return;
        }
        match outcome {
            DrainOutcome::Immediate { state } => ui::dim(&format!("{pool}: removed ({state})")),
            DrainOutcome::Drained => ui::dim(&format!("{pool}: drained")),
            DrainOutcome::StillInService { state } => {
                ui::warn(&format!("{pool}: still {state} after drain timeout"));
            }
        }
    }

    fn on_rejoined(&mut self, pool: &str, _instance: &ManagedInstance, polls: u64) {
        if !self.quiet {
            ui::dim(&format!("{pool}: InService after {}", ui::count(polls as usize, "check")));
        }
    }

    fn on_instance_complete(&mut self, report: &InstanceReport) {
        if !self.quiet {
            ui::success(&format!(
                "{} patched ({})",
                report.instance_id, report.patch.os_family
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_instances_even_when_quiet() {
        let mut progress = TerminalProgress::new(2, true);
        let instance = ManagedInstance::new("i-1", "10.0.0.1");
        progress.on_instance_start(&instance, &PoolMembership::new());
        progress.on_instance_start(&instance, &PoolMembership::new());
        assert_eq!(progress.current, 2);
    }
}
