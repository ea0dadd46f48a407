//! In-memory backends and a virtual clock for unit tests.

use crate::backend::{FleetDirectory, PoolControl, RemoteExec};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::progress::ProgressCallback;
use crate::types::{DrainOutcome, DrainPolicy, HealthState, InstanceState, ManagedInstance};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// A recorded pool API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolCall {
    DescribePools(String),
    DescribeDrainPolicy(String),
    Deregister(String, String),
    Register(String, String),
    DescribeHealth(String, String),
}

#[derive(Default)]
struct PoolState {
    members: BTreeMap<String, BTreeSet<String>>,
    policies: HashMap<String, DrainPolicy>,
    scripted_health: HashMap<(String, String), VecDeque<HealthState>>,
    fixed_health: HashMap<(String, String), HealthState>,
    fail_register: BTreeSet<String>,
    calls: Vec<PoolCall>,
}

/// Pool API mock.
///
/// Health follows membership unless overridden: registered instances are
/// `InService`, others `OutOfService`. Scripted responses are consumed
/// first, then a fixed override, then membership.
#[derive(Default)]
pub struct MockPools {
    state: Mutex<PoolState>,
}

impl MockPools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(self, pool: &str, instance: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .members
            .entry(pool.to_string())
            .or_default()
            .insert(instance.to_string());
        self
    }

    pub fn with_policy(self, pool: &str, enabled: bool, timeout_seconds: u64) -> Self {
        self.state.lock().unwrap().policies.insert(
            pool.to_string(),
            DrainPolicy {
                enabled,
                timeout_seconds,
            },
        );
        self
    }

    pub fn with_health_script(self, pool: &str, instance: &str, states: &[HealthState]) -> Self {
        self.state
            .lock()
            .unwrap()
            .scripted_health
            .insert(key(pool, instance), states.iter().copied().collect());
        self
    }

    pub fn with_fixed_health(self, pool: &str, instance: &str, state: HealthState) -> Self {
        self.state
            .lock()
            .unwrap()
            .fixed_health
            .insert(key(pool, instance), state);
        self
    }

    pub fn failing_register(self, pool: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_register
            .insert(pool.to_string());
        self
    }

    pub fn calls(&self) -> Vec<PoolCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Only deregister/register calls, in order.
    pub fn membership_calls(&self) -> Vec<PoolCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, PoolCall::Deregister(..) | PoolCall::Register(..)))
            .collect()
    }

    pub fn health_queries(&self, pool: &str, instance: &str) -> usize {
        let wanted = PoolCall::DescribeHealth(pool.to_string(), instance.to_string());
        self.calls().iter().filter(|c| **c == wanted).count()
    }

    pub fn is_member(&self, pool: &str, instance: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .members
            .get(pool)
            .is_some_and(|m| m.contains(instance))
    }
}

fn key(pool: &str, instance: &str) -> (String, String) {
    (pool.to_string(), instance.to_string())
}

impl PoolControl for MockPools {
    fn describe_pools_containing(&self, instance_id: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(PoolCall::DescribePools(instance_id.to_string()));
        Ok(state
            .members
            .iter()
            .filter(|(_, members)| members.contains(instance_id))
            .map(|(pool, _)| pool.clone())
            .collect())
    }

    fn describe_drain_policy(&self, pool: &str) -> Result<DrainPolicy> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(PoolCall::DescribeDrainPolicy(pool.to_string()));
        Ok(state.policies.get(pool).copied().unwrap_or_default())
    }

    fn deregister(&self, pool: &str, instance_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(PoolCall::Deregister(pool.to_string(), instance_id.to_string()));
        if let Some(members) = state.members.get_mut(pool) {
            members.remove(instance_id);
        }
        Ok(())
    }

    fn register(&self, pool: &str, instance_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(PoolCall::Register(pool.to_string(), instance_id.to_string()));
        if state.fail_register.contains(pool) {
            return Err(Error::backend(
                format!("register {pool}"),
                "LoadBalancerNotFound",
            ));
        }
        state
            .members
            .entry(pool.to_string())
            .or_default()
            .insert(instance_id.to_string());
        Ok(())
    }

    fn describe_health(&self, pool: &str, instance_id: &str) -> Result<HealthState> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(PoolCall::DescribeHealth(pool.to_string(), instance_id.to_string()));

        let k = key(pool, instance_id);
        if let Some(next) = state.scripted_health.get_mut(&k).and_then(VecDeque::pop_front) {
            return Ok(next);
        }
        if let Some(fixed) = state.fixed_health.get(&k) {
            return Ok(*fixed);
        }
        let member = state
            .members
            .get(pool)
            .is_some_and(|m| m.contains(instance_id));
        Ok(if member {
            HealthState::InService
        } else {
            HealthState::OutOfService
        })
    }
}

#[derive(Default)]
struct RemoteState {
    release_id: String,
    failing_command: Option<String>,
    commands: Vec<(String, String)>,
}

/// Remote transport mock that answers `lsb_release -si` with a fixed id.
#[derive(Default)]
pub struct MockRemote {
    state: Mutex<RemoteState>,
}

impl MockRemote {
    pub fn new(release_id: &str) -> Self {
        Self {
            state: Mutex::new(RemoteState {
                release_id: release_id.to_string(),
                ..Default::default()
            }),
        }
    }

    /// Fail any command containing `fragment`.
    pub fn failing_on(self, fragment: &str) -> Self {
        self.state.lock().unwrap().failing_command = Some(fragment.to_string());
        self
    }

    pub fn commands(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().commands.clone()
    }
}

impl RemoteExec for MockRemote {
    fn run_command(&self, address: &str, command: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state
            .commands
            .push((address.to_string(), command.to_string()));

        if state
            .failing_command
            .as_deref()
            .is_some_and(|f| command.contains(f))
        {
            return Err(Error::RemoteCommand {
                address: address.to_string(),
                command: command.to_string(),
                message: "exit status 100".to_string(),
            });
        }

        if command == "lsb_release -si" {
            return Ok(state.release_id.clone());
        }
        Ok(format!("ran: {command}"))
    }
}

/// Virtual clock: records every requested sleep and returns at once.
#[derive(Default)]
pub struct ManualClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Clock for ManualClock {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Fleet mock returning a fixed list for one environment.
pub struct MockFleet {
    pub environment: String,
    pub instances: Vec<ManagedInstance>,
}

impl FleetDirectory for MockFleet {
    fn list_eligible_instances(&self, environment: &str) -> Result<Vec<ManagedInstance>> {
        if environment == self.environment {
            Ok(self.instances.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

/// Progress callback that records transitions.
#[derive(Default)]
pub struct RecordingProgress {
    pub transitions: Vec<(String, InstanceState)>,
    pub drains: Vec<(String, DrainOutcome)>,
    pub rejoins: Vec<(String, u64)>,
}

impl ProgressCallback for RecordingProgress {
    fn on_transition(&mut self, instance: &ManagedInstance, state: InstanceState) {
        self.transitions.push((instance.id.clone(), state));
    }

    fn on_drained(&mut self, pool: &str, _instance: &ManagedInstance, outcome: &DrainOutcome) {
        self.drains.push((pool.to_string(), *outcome));
    }

    fn on_rejoined(&mut self, pool: &str, _instance: &ManagedInstance, polls: u64) {
        self.rejoins.push((pool.to_string(), polls));
    }
}
