//! Host Lifecycle
//!
//! Rule-driven lifecycle management for bare-metal hosts waiting in a pool.
//!
//! A host moves between a small set of states (`discovering`,
//! `disconnected`, `insufficient`, `ready-to-be-moved`, `disabled`) in
//! response to register, enable, disable and refresh events. Transitions are
//! declared in an ordered [`RuleTable`]; the [`StateMachine`] picks the first
//! rule whose source states contain the host's state and whose
//! [`Condition`] holds for a [`HostFacts`] snapshot, writes the destination
//! state and runs the rule's post-transition handler.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use host_lifecycle::{
//!     HostFacts, Host, HostId, HostStatus, HostTransitionHandler, StateMachine,
//!     TracingEventSink, TransitionType, pool_host_rule_table,
//! };
//!
//! # async fn example() -> Result<(), host_lifecycle::LifecycleError> {
//! let machine = StateMachine::new(
//!     Arc::new(pool_host_rule_table()),
//!     Arc::new(HostTransitionHandler::new(Arc::new(TracingEventSink))),
//! );
//!
//! let mut host = Host::new(HostId::new());
//! let state = machine
//!     .run(TransitionType::RegisterHost, &mut host, &HostFacts::default())
//!     .await?;
//! assert_eq!(state, HostStatus::Discovering);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - **condition**: Predicate combinators over host facts
//! - **rules**: Transition rules and the ordered rule table
//! - **engine**: Rule matching and application
//! - **handler**: Post-transition status messages and events
//! - **inventory**: Facts derived from host check-ins and hardware inventory
//! - **manager**: Per-host serialized evaluation for many hosts

pub mod condition;
pub mod engine;
pub mod error;
pub mod events;
pub mod facts;
pub mod handler;
pub mod host;
pub mod inventory;
pub mod manager;
pub mod pool;
pub mod rules;
pub mod status;


pub use condition::Condition;
pub use engine::StateMachine;
pub use error::{FactError, FactIssue, HandlerError, LifecycleError};
pub use events::{EventSeverity, EventSink, HostEvent, TracingEventSink};
#[cfg(any(test, feature = "test-util"))]
pub use events::RecordingEventSink;
pub use facts::{Fact, FactProvider, HostFacts};
pub use handler::{HostTransitionHandler, TransitionContext, TransitionHandler};
pub use host::{Host, HostId, HostStatus};
pub use inventory::{
    HardwareRequirements, Inventory, InventoryFactProvider, InventoryRecord, InventorySource,
    MemoryInventoryStore,
};
pub use manager::{HostManager, HostRecord, RefreshOutcome};
pub use pool::pool_host_rule_table;
pub use rules::{PostTransition, RuleTable, TransitionRule, TransitionType};
