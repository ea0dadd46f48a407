//! Per-instance state machine: drain → patch → rejoin.
//!
//! ```text
//! NotStarted ──► Draining ──► Patched ──► Rejoining ──► Done
//!     │              │            │            │
//!     └──────────────┴─── fatal ──┴────────────┘
//!                  (record left on disk)
//! ```
//!
//! The orchestrator is the only component that touches the [`StateStore`].
//! The record is written before the first deregistration and removed only
//! after every pool reports the instance healthy again. A fatal error
//! aborts the whole run and leaves the record as the recovery breadcrumb;
//! the next run unions it with live membership and starts over from
//! `Draining` (deregistering an absent member is a no-op).

use crate::backend::{FleetDirectory, PoolControl, RemoteExec};
use crate::clock::Clock;
use crate::config::RolloutConfig;
use crate::drain::DrainController;
use crate::error::{Error, Result};
use crate::patch::PatchExecutor;
use crate::progress::ProgressCallback;
use crate::rejoin::RejoinController;
use crate::resolver::MembershipResolver;
use crate::store::{Records, StateStore};
use crate::types::{InstanceState, ManagedInstance, PatchReport, PoolMembership};

/// Outcome of one fully processed instance.
#[derive(Debug, Clone)]
pub struct InstanceReport {
    /// Instance identifier
    pub instance_id: String,
    /// Pools it was drained from and rejoined to
    pub membership: PoolMembership,
    /// Pools where draining outlived the timeout
    pub drain_timeouts: Vec<String>,
    /// What the patch step did
    pub patch: PatchReport,
}

/// Totals for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Instances that reached `Done`
    pub instances_completed: usize,
    /// Drain operations issued
    pub pools_drained: usize,
    /// Drains that were still in service after the wait
    pub drain_timeouts: usize,
    /// Pools rejoined and healthy
    pub pools_rejoined: usize,
}

impl RunSummary {
    fn add(&mut self, report: &InstanceReport) {
        self.instances_completed += 1;
        self.pools_drained += report.membership.len();
        self.drain_timeouts += report.drain_timeouts.len();
        self.pools_rejoined += report.membership.len();
    }
}

/// What a run would do for one instance (dry run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePlan {
    /// The instance
    pub instance: ManagedInstance,
    /// Resolved pools (live ∪ persisted)
    pub membership: PoolMembership,
    /// Pools only known from a leftover record
    pub recovered: PoolMembership,
}

/// Tracks one instance through its states.
struct InstanceRun<'i> {
    instance: &'i ManagedInstance,
    state: InstanceState,
}

impl<'i> InstanceRun<'i> {
    fn new(instance: &'i ManagedInstance) -> Self {
        Self {
            instance,
            state: InstanceState::NotStarted,
        }
    }

    fn advance<P: ProgressCallback>(&mut self, to: InstanceState, progress: &mut P) -> Result<()> {
        if !self.state.can_advance_to(to) {
            return Err(Error::InvalidTransition {
                instance: self.instance.id.clone(),
                from: self.state,
                to,
            });
        }
        log::debug!("[{}] {} -> {}", self.instance.id, self.state, to);
        self.state = to;
        progress.on_transition(self.instance, to);
        Ok(())
    }

    /// Wrap a fatal error with where it happened.
    fn abort(&self, pool: Option<&str>, source: Error) -> Error {
        let err = Error::Aborted {
            instance: self.instance.id.clone(),
            state: self.state,
            pool: pool.map(str::to_string),
            source: Box::new(source),
        };
        log::error!("{err}");
        err
    }
}

/// Drives instances through drain → patch → rejoin, one at a time.
pub struct Orchestrator<'a> {
    pools: &'a dyn PoolControl,
    remote: &'a dyn RemoteExec,
    clock: &'a dyn Clock,
    store: StateStore,
    config: RolloutConfig,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator.
    pub fn new(
        pools: &'a dyn PoolControl,
        remote: &'a dyn RemoteExec,
        clock: &'a dyn Clock,
        store: StateStore,
        config: RolloutConfig,
    ) -> Self {
        Self {
            pools,
            remote,
            clock,
            store,
            config,
        }
    }

    /// The state store in use.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Eligible instances in `environment`.
    pub fn discover(
        &self,
        fleet: &dyn FleetDirectory,
        environment: &str,
    ) -> Result<Vec<ManagedInstance>> {
        log::info!("Finding updateable instances...");
        let instances = fleet.list_eligible_instances(environment)?;
        log::debug!("{} eligible instance(s) in {environment}", instances.len());
        Ok(instances)
    }

    /// List eligible instances in `environment` and process them all.
    pub fn run_environment<P: ProgressCallback>(
        &self,
        fleet: &dyn FleetDirectory,
        environment: &str,
        progress: &mut P,
    ) -> Result<RunSummary> {
        let instances = self.discover(fleet, environment)?;
        self.run(&instances, progress)
    }

    /// Process `instances` sequentially. Stops at the first fatal error.
    pub fn run<P: ProgressCallback>(
        &self,
        instances: &[ManagedInstance],
        progress: &mut P,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for instance in instances {
            let report = self.process(instance, progress)?;
            summary.add(&report);
        }
        log::info!("All done!");
        Ok(summary)
    }

    /// Drain, patch and rejoin one instance.
    pub fn process<P: ProgressCallback>(
        &self,
        instance: &ManagedInstance,
        progress: &mut P,
    ) -> Result<InstanceReport> {
        let mut run = InstanceRun::new(instance);

        // NotStarted: resolve and persist before touching any pool
        let persisted = self.store.get(&instance.id);
        let membership = MembershipResolver::new(self.pools)
            .resolve(&instance.id, persisted.as_ref())
            .map_err(|e| run.abort(None, e))?;
        self.store
            .upsert(&instance.id, &membership)
            .map_err(|e| run.abort(None, e))?;
        progress.on_instance_start(instance, &membership);

        run.advance(InstanceState::Draining, progress)?;
        let drain = DrainController::new(self.pools, self.clock, self.config.drain_settle_margin());
        let mut drain_timeouts = Vec::new();
        for pool in membership.iter() {
            let outcome = drain
                .drain(pool, &instance.id)
                .map_err(|e| run.abort(Some(pool), e))?;
            if outcome.timed_out() {
                drain_timeouts.push(pool.to_string());
            }
            progress.on_drained(pool, instance, &outcome);
        }

        // Every pool has been attempted; a stuck drain is not fatal
        run.advance(InstanceState::Patched, progress)?;
        let patch = PatchExecutor::new(
            self.remote,
            self.clock,
            self.config.reboot_delay_minutes,
            self.config.post_reboot_wait(),
        )
        .patch_and_reboot(&instance.address)
        .map_err(|e| run.abort(None, e))?;

        run.advance(InstanceState::Rejoining, progress)?;
        let rejoin = RejoinController::new(
            self.pools,
            self.clock,
            self.config.rejoin_poll_interval(),
            self.config.max_rejoin_polls(),
        );
        for pool in membership.iter() {
            let polls = rejoin
                .rejoin(pool, &instance.id)
                .map_err(|e| run.abort(Some(pool), e))?;
            progress.on_rejoined(pool, instance, polls);
        }

        self.store
            .remove(&instance.id)
            .map_err(|e| run.abort(None, e))?;
        run.advance(InstanceState::Done, progress)?;

        let report = InstanceReport {
            instance_id: instance.id.clone(),
            membership,
            drain_timeouts,
            patch,
        };
        progress.on_instance_complete(&report);
        Ok(report)
    }

    /// Resolve every instance's membership without changing anything.
    pub fn plan(&self, instances: &[ManagedInstance]) -> Result<Vec<InstancePlan>> {
        let resolver = MembershipResolver::new(self.pools);
        instances
            .iter()
            .map(|instance| {
                let persisted = self.store.get(&instance.id).unwrap_or_default();
                let live = resolver.resolve(&instance.id, None)?;
                let recovered = persisted.iter().filter(|p| !live.contains(p)).collect();
                Ok(InstancePlan {
                    instance: instance.clone(),
                    membership: live.union(&persisted),
                    recovered,
                })
            })
            .collect()
    }

    /// Records for instances not in `instances`.
    ///
    /// These belong to hosts that were interrupted mid-run and are no longer
    /// eligible (retagged, stopped, moved environment). Nothing in this run
    /// will re-admit them.
    pub fn orphaned_records(&self, instances: &[ManagedInstance]) -> Records {
        let mut records = self.store.records();
        records.retain(|id, _| !instances.iter().any(|i| &i.id == id));
        records
    }
}
