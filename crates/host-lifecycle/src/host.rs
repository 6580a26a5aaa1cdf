//! Host entity
//!
//! A host's `state` is only ever changed by the state machine engine and its
//! `status_info` only by a post-transition handler.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique, immutable host identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(Uuid);

impl HostId {
    /// Generates a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for HostId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for HostId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state of a pool host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HostStatus {
    /// Never registered
    #[default]
    #[serde(rename = "")]
    Initial,

    /// Registered, waiting for hardware details
    Discovering,

    /// Stopped checking in
    Disconnected,

    /// Hardware below the pool minimums
    Insufficient,

    /// Eligible to be moved into a cluster
    ReadyToBeMoved,

    /// Manually disabled
    Disabled,
}

impl HostStatus {
    /// All states, in declaration order.
    pub const ALL: [HostStatus; 6] = [
        HostStatus::Initial,
        HostStatus::Discovering,
        HostStatus::Disconnected,
        HostStatus::Insufficient,
        HostStatus::ReadyToBeMoved,
        HostStatus::Disabled,
    ];

    /// Wire name of the state (empty for [`HostStatus::Initial`]).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "",
            Self::Discovering => "discovering",
            Self::Disconnected => "disconnected",
            Self::Insufficient => "insufficient",
            Self::ReadyToBeMoved => "ready-to-be-moved",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => f.write_str("<initial>"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A bare-metal host under lifecycle management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    id: HostId,
    state: HostStatus,
    #[serde(default)]
    status_info: String,
    /// State left by a transition whose event has not been delivered yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unreported_from: Option<HostStatus>,
}

impl Host {
    /// Creates a host that has not been registered yet.
    #[must_use]
    pub fn new(id: HostId) -> Self {
        Self {
            id,
            state: HostStatus::Initial,
            status_info: String::new(),
            unreported_from: None,
        }
    }

    /// Rebuilds a host from a persisted state and status message.
    #[must_use]
    pub fn restore(id: HostId, state: HostStatus, status_info: impl Into<String>) -> Self {
        Self {
            id,
            state,
            status_info: status_info.into(),
            unreported_from: None,
        }
    }

    /// Host identifier
    #[must_use]
    pub fn id(&self) -> HostId {
        self.id
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> HostStatus {
        self.state
    }

    /// Explanation of the current state
    #[must_use]
    pub fn status_info(&self) -> &str {
        &self.status_info
    }

    pub(crate) fn set_state(&mut self, state: HostStatus) {
        self.state = state;
    }

    /// Source state of a transition that was applied but not yet reported.
    #[must_use]
    pub fn unreported_from(&self) -> Option<HostStatus> {
        self.unreported_from
    }

    pub(crate) fn set_unreported_from(&mut self, state: Option<HostStatus>) {
        self.unreported_from = state;
    }

    /// Updates the status message, returning whether it changed.
    pub(crate) fn set_status_info(&mut self, status_info: String) -> bool {
        if self.status_info == status_info {
            return false;
        }
        self.status_info = status_info;
        true
    }
}
