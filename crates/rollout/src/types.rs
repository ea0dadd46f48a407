//! Common types for rolling patch operations.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Tag key holding an instance's human-readable name.
pub const NAME_TAG: &str = "Name";

/// A server eligible for patching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedInstance {
    /// Opaque instance identifier (e.g. `i-0abc123`)
    pub id: String,
    /// Address used for remote command execution
    pub address: String,
    /// Tags used for discovery filtering
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ManagedInstance {
    /// Create an instance with no tags.
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            tags: BTreeMap::new(),
        }
    }

    /// Add a tag (builder style).
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Value of the `Name` tag, or `NO_NAME_TAG`.
    pub fn display_name(&self) -> &str {
        self.tags
            .get(NAME_TAG)
            .map(String::as_str)
            .unwrap_or("NO_NAME_TAG")
    }
}

impl fmt::Display for ManagedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.display_name(), self.id, self.address)
    }
}

/// The set of pools an instance must be drained from and rejoined to.
///
/// Iteration order is lexicographic so runs are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolMembership(BTreeSet<String>);

impl PoolMembership {
    /// Create an empty membership.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pool. Returns false if it was already present.
    pub fn insert(&mut self, pool: impl Into<String>) -> bool {
        self.0.insert(pool.into())
    }

    /// Whether the pool is in the set.
    pub fn contains(&self, pool: &str) -> bool {
        self.0.contains(pool)
    }

    /// Union of two memberships.
    pub fn union(&self, other: &PoolMembership) -> PoolMembership {
        Self(self.0.union(&other.0).cloned().collect())
    }

    /// Whether the set has no pools.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of pools.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate pool names in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PoolMembership {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for PoolMembership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pools: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", pools.join(", "))
    }
}

/// Health of one instance in one pool, as reported by the pool API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Receiving traffic
    InService,
    /// Not receiving traffic
    OutOfService,
    /// Transitional or unreported
    Unknown,
}

impl HealthState {
    /// Parse the pool API's state string. Unrecognized values are `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "InService" => Self::InService,
            "OutOfService" => Self::OutOfService,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InService => "InService",
            Self::OutOfService => "OutOfService",
            Self::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

/// Connection draining settings of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainPolicy {
    /// Whether connection draining is enabled
    pub enabled: bool,
    /// Configured drain timeout
    pub timeout_seconds: u64,
}

impl DrainPolicy {
    /// Seconds to wait for draining; zero when draining is disabled.
    pub fn effective_timeout(&self) -> u64 {
        if self.enabled { self.timeout_seconds } else { 0 }
    }
}

/// Per-instance orchestration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InstanceState {
    /// Nothing done yet
    NotStarted,
    /// Membership persisted, deregistering from pools
    Draining,
    /// Update commands dispatched and reboot scheduled
    Patched,
    /// Registering back into pools
    Rejoining,
    /// Rejoined everywhere, record cleared
    Done,
}

impl InstanceState {
    /// The only state that may follow this one.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::Draining),
            Self::Draining => Some(Self::Patched),
            Self::Patched => Some(Self::Rejoining),
            Self::Rejoining => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Whether moving to `to` is a legal transition.
    pub fn can_advance_to(self, to: Self) -> bool {
        self.next() == Some(to)
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not started",
            Self::Draining => "draining",
            Self::Patched => "patched",
            Self::Rejoining => "rejoining",
            Self::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// OS families with a known update procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    /// Ubuntu (apt)
    Ubuntu,
    /// CentOS (yum)
    CentOs,
    /// Amazon Linux AMI (yum)
    AmazonAmi,
}

impl OsFamily {
    /// Parse `lsb_release -si` output.
    pub fn from_release_id(output: &str) -> Option<Self> {
        match output.trim() {
            "Ubuntu" => Some(Self::Ubuntu),
            "CentOS" => Some(Self::CentOs),
            "AmazonAMI" => Some(Self::AmazonAmi),
            _ => None,
        }
    }

    /// Commands that update the host and schedule a reboot.
    pub fn update_commands(self, reboot_delay_minutes: u64) -> Vec<String> {
        match self {
            Self::Ubuntu => vec![
                "sudo apt-get -y -q update".to_string(),
                "sudo apt-get -o Dpkg::Options::=\"--force-confdef\" -o Dpkg::Options::=\"--force-confold\" -y -q upgrade".to_string(),
                "sudo apt-get -o Dpkg::Options::=\"--force-confdef\" -o Dpkg::Options::=\"--force-confnew\" -y -q dist-upgrade".to_string(),
                format!("sudo /sbin/shutdown -r +{reboot_delay_minutes}"),
            ],
            Self::CentOs => vec![
                "sudo yum -y -q update".to_string(),
                format!("sudo /usr/sbin/shutdown -r +{reboot_delay_minutes}"),
            ],
            Self::AmazonAmi => vec![
                "sudo yum -y -q update".to_string(),
                format!("sudo /sbin/shutdown -r +{reboot_delay_minutes}"),
            ],
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ubuntu => "Ubuntu",
            Self::CentOs => "CentOS",
            Self::AmazonAmi => "Amazon Linux AMI",
        };
        write!(f, "{s}")
    }
}

/// Result of draining one instance from one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// No wait was needed (draining disabled, zero timeout, or already out)
    Immediate {
        /// Health reported right after deregistration
        state: HealthState,
    },
    /// Out of service after waiting for the drain timeout
    Drained,
    /// Still reported in service after the wait; the run continues anyway
    StillInService {
        /// Health reported after the wait
        state: HealthState,
    },
}

impl DrainOutcome {
    /// Whether the drain outlived its timeout.
    pub fn timed_out(&self) -> bool {
        matches!(self, Self::StillInService { .. })
    }
}

/// Result of patching one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    /// Detected OS family
    pub os_family: OsFamily,
    /// Commands dispatched, in order
    pub commands_run: Vec<String>,
}
