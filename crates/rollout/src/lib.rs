//! # rollout
//!
//! Rolling patch orchestration for servers behind load balancers.
//!
//! For each eligible instance the [`Orchestrator`]:
//! 1. Resolves every pool the instance belongs to (live pools plus any
//!    pools left over from an interrupted run)
//! 2. Persists that membership to the [`StateStore`]
//! 3. Drains the instance from every pool
//! 4. Patches and reboots the host
//! 5. Rejoins every pool and waits until the instance is healthy
//! 6. Clears the persisted record
//!
//! If the process dies or a fatal error occurs between steps 2 and 6, the
//! record stays on disk. The next run unions it with the live membership,
//! so an instance that was left deregistered still gets re-admitted.
//!
//! ## Example
//!
//! ```ignore
//! use rollout::backend::ssh::SshExec;
//! use rollout::{NoProgress, Orchestrator, RolloutConfig, StateStore, SystemClock};
//!
//! // Any PoolControl + FleetDirectory implementation, e.g. awskit::Client
//! let pools = awskit::Client::new()?;
//! let fleet = &pools;
//! let remote = SshExec::new();
//! let store = StateStore::new("updatetool.state");
//!
//! let orchestrator = Orchestrator::new(
//!     &pools,
//!     &remote,
//!     &SystemClock,
//!     store,
//!     RolloutConfig::default(),
//! );
//! let summary = orchestrator
//!     .run_environment(fleet, "stg", &mut NoProgress)?;
//! println!("{} instance(s) patched", summary.instances_completed);
//! ```
//!
//! ## Waiting
//!
//! All waits go through the [`Clock`] trait. [`SystemClock`] blocks the
//! calling thread; tests substitute a virtual clock.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod clock;
pub mod config;
pub mod drain;
pub mod error;
pub mod orchestrator;
pub mod patch;
pub mod progress;
pub mod rejoin;
pub mod resolver;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{FleetDirectory, PoolControl, RemoteExec};
pub use clock::{Clock, SystemClock};
pub use config::RolloutConfig;
pub use error::{Error, ErrorCategory, Result};
pub use orchestrator::{InstancePlan, InstanceReport, Orchestrator, RunSummary};
pub use progress::{NoProgress, ProgressCallback};
pub use store::StateStore;
pub use types::{
    DrainOutcome, DrainPolicy, HealthState, InstanceState, ManagedInstance, OsFamily,
    PatchReport, PoolMembership,
};
