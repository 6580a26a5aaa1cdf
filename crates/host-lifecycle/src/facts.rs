//! Host fact snapshots
//!
//! Facts are captured once, before rule evaluation, and handed to the engine
//! as an immutable [`HostFacts`]. Conditions never fetch facts themselves.

use crate::error::{FactError, FactIssue};
use crate::host::Host;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::warn;

/// An observable boolean property of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fact {
    /// Host has checked in recently
    Connected,
    /// Host has reported a hardware inventory
    HasInventory,
    /// Host has enough eligible disks
    HasMinValidDisks,
    /// Host has enough CPU cores
    HasMinCpuCores,
    /// Host has enough memory
    HasMinMemory,
    /// Host runs on a supported platform
    PlatformValid,
}

impl Fact {
    /// Hardware checks, in the order failures are reported.
    pub const HARDWARE: [Fact; 4] = [
        Fact::HasMinValidDisks,
        Fact::HasMinCpuCores,
        Fact::HasMinMemory,
        Fact::PlatformValid,
    ];

    /// Message used when this fact is false.
    #[must_use]
    pub fn failure_reason(&self) -> &'static str {
        match self {
            Self::Connected => "host is not connected",
            Self::HasInventory => "host has not reported its inventory",
            Self::HasMinValidDisks => "insufficient number of valid disks",
            Self::HasMinCpuCores => "insufficient CPU cores",
            Self::HasMinMemory => "insufficient memory",
            Self::PlatformValid => "platform is not supported",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Connected => 0,
            Self::HasInventory => 1,
            Self::HasMinValidDisks => 2,
            Self::HasMinCpuCores => 3,
            Self::HasMinMemory => 4,
            Self::PlatformValid => 5,
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connected => "connected",
            Self::HasInventory => "has-inventory",
            Self::HasMinValidDisks => "has-min-valid-disks",
            Self::HasMinCpuCores => "has-min-cpu-cores",
            Self::HasMinMemory => "has-min-memory",
            Self::PlatformValid => "platform-valid",
        };
        f.write_str(name)
    }
}

/// Immutable snapshot of a host's facts, valid for one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFacts {
    values: [bool; 6],
    issues: Vec<FactIssue>,
    observed_at: DateTime<Utc>,
}

impl Default for HostFacts {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl HostFacts {
    /// Creates a snapshot with every fact `false`.
    #[must_use]
    pub fn new(observed_at: DateTime<Utc>) -> Self {
        Self {
            values: [false; 6],
            issues: Vec::new(),
            observed_at,
        }
    }

    /// Snapshot with every fact set to `value`.
    #[must_use]
    pub fn all(value: bool) -> Self {
        Self {
            values: [value; 6],
            ..Self::default()
        }
    }

    /// Snapshot for a host whose fact source could not be read at all.
    ///
    /// Every fact is `false` with an issue recorded against it, which routes
    /// refresh to `disconnected`.
    #[must_use]
    pub fn unavailable(reason: &str) -> Self {
        let mut facts = Self::default();
        for fact in [Fact::Connected, Fact::HasInventory]
            .into_iter()
            .chain(Fact::HARDWARE)
        {
            facts.issues.push(FactIssue {
                fact,
                reason: reason.to_string(),
            });
        }
        facts
    }

    /// Returns the snapshot with `fact` set to `value`.
    #[must_use]
    pub fn with(mut self, fact: Fact, value: bool) -> Self {
        self.values[fact.index()] = value;
        self
    }

    /// Records the outcome of determining `fact`.
    ///
    /// An error is stored as `false` and kept as a [`FactIssue`].
    pub fn record(&mut self, fact: Fact, outcome: Result<bool, FactError>) {
        match outcome {
            Ok(value) => self.values[fact.index()] = value,
            Err(e) => {
                warn!("Could not determine fact {}: {}", fact, e);
                self.values[fact.index()] = false;
                self.issues.push(FactIssue {
                    fact,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Value of a single fact.
    #[must_use]
    pub fn get(&self, fact: Fact) -> bool {
        self.values[fact.index()]
    }

    /// Hardware checks that are `false`, in reporting order.
    #[must_use]
    pub fn failing_hardware(&self) -> Vec<Fact> {
        Fact::HARDWARE
            .into_iter()
            .filter(|fact| !self.get(*fact))
            .collect()
    }

    /// Facts that could not be determined.
    #[must_use]
    pub fn issues(&self) -> &[FactIssue] {
        &self.issues
    }

    /// Issue recorded for `fact`, if any.
    #[must_use]
    pub fn issue_for(&self, fact: Fact) -> Option<&FactIssue> {
        self.issues.iter().find(|issue| issue.fact == fact)
    }

    /// Time the snapshot was taken
    #[must_use]
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

/// Supplies fact snapshots to the caller of the engine.
///
/// Called once per evaluation, before rule matching. Implementations may
/// perform I/O; a fact that cannot be determined must be reported as `false`
/// with an issue on the snapshot rather than as an error.
#[async_trait::async_trait]
pub trait FactProvider: Send + Sync {
    /// Captures the current facts for `host`.
    async fn snapshot(&self, host: &Host) -> HostFacts;
}
