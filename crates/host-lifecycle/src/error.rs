//! Host lifecycle errors
//!
//! Rule-matching failures, handler failures and fact failures are kept
//! apart so a caller can tell a stuck host from a transient one.

use crate::host::{HostId, HostStatus};
use crate::facts::Fact;
use crate::rules::TransitionType;
use thiserror::Error;

/// Errors returned by [`StateMachine::run`](crate::engine::StateMachine::run).
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// No registered rule matched the event and the host's state and facts.
    ///
    /// The host state is left untouched.
    #[error("No transition defined for {transition} in state {state}")]
    NoMatchingTransition {
        /// Event presented to the engine
        transition: TransitionType,
        /// State the host was in
        state: HostStatus,
    },

    /// A rule matched but its post-transition handler failed.
    ///
    /// `destination` has already been written to the host.
    #[error("Post-transition handler for {transition} into {destination} failed: {source}")]
    Handler {
        /// Event presented to the engine
        transition: TransitionType,
        /// State selected by the matching rule
        destination: HostStatus,
        /// Underlying handler failure
        #[source]
        source: HandlerError,
    },

    /// The host is not known to the manager
    #[error("Host {0} not found")]
    HostNotFound(HostId),
}

impl LifecycleError {
    /// Returns `true` when a rule matched and only the handler failed.
    #[must_use]
    pub fn is_handler_failure(&self) -> bool {
        matches!(self, Self::Handler { .. })
    }

    /// State selected before the handler failed, if any.
    #[must_use]
    pub fn selected_state(&self) -> Option<HostStatus> {
        match self {
            Self::Handler { destination, .. } => Some(*destination),
            Self::NoMatchingTransition { .. } | Self::HostNotFound(_) => None,
        }
    }
}

/// Errors raised by post-transition handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The event sink rejected or failed to deliver an event
    #[error("Event emission failed: {0}")]
    EventSink(String),

    /// Status message template could not be rendered
    #[error("Status template error: {0}")]
    Template(String),
}

/// A single fact that could not be determined.
///
/// Facts that fail are evaluated as `false`; the failure itself is recorded
/// on the snapshot and logged.
#[derive(Debug, Clone, Error)]
pub enum FactError {
    /// The host has never checked in
    #[error("host has no recorded check-in")]
    MissingCheckIn,

    /// Inventory text is not valid inventory JSON
    #[error("malformed inventory: {0}")]
    MalformedInventory(String),

    /// Inventory is valid but lacks the section a fact needs
    #[error("inventory has no {0} section")]
    MissingSection(&'static str),

    /// The fact source could not be reached
    #[error("fact source unavailable: {0}")]
    Unavailable(String),
}

/// Record of a fact that evaluated to `false` because it could not be determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactIssue {
    /// Fact affected
    pub fact: Fact,
    /// Rendered failure reason
    pub reason: String,
}
