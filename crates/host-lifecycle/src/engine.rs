//! State machine engine
//!
//! Matches an event against a host's state and fact snapshot using a
//! [`RuleTable`], writes the destination state and runs the rule's
//! post-transition handler.
//!
//! The engine holds no per-host state. One [`StateMachine`] can serve any
//! number of hosts concurrently; callers serialize evaluations of the same
//! host (see [`HostManager`](crate::manager::HostManager)).

use crate::error::LifecycleError;
use crate::facts::HostFacts;
use crate::handler::{TransitionContext, TransitionHandler};
use crate::host::{Host, HostStatus};
use crate::rules::{PostTransition, RuleTable, TransitionRule, TransitionType};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rule-driven host state machine.
#[derive(Clone)]
pub struct StateMachine {
    table: Arc<RuleTable>,
    handler: Arc<dyn TransitionHandler>,
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("rules", &self.table.len())
            .finish_non_exhaustive()
    }
}

impl StateMachine {
    /// Creates an engine over an immutable rule table.
    pub fn new(table: Arc<RuleTable>, handler: Arc<dyn TransitionHandler>) -> Self {
        Self { table, handler }
    }

    /// Rule table this engine evaluates
    #[must_use]
    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Selects the rule that applies, without touching the host.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NoMatchingTransition`] when no rule applies.
    pub fn select(
        &self,
        transition_type: TransitionType,
        state: HostStatus,
        facts: &HostFacts,
    ) -> Result<&TransitionRule, LifecycleError> {
        self.table
            .find(transition_type, state, facts)
            .ok_or(LifecycleError::NoMatchingTransition {
                transition: transition_type,
                state,
            })
    }

    /// Applies `transition_type` to `host` and returns its new state.
    ///
    /// At most one rule is applied and its handler is invoked at most once.
    /// When no rule matches the host is not modified. When the handler fails
    /// the selected state has already been written and is reported on the
    /// error.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::NoMatchingTransition`] if no rule applies
    /// - [`LifecycleError::Handler`] if the post-transition handler fails
    pub async fn run(
        &self,
        transition_type: TransitionType,
        host: &mut Host,
        facts: &HostFacts,
    ) -> Result<HostStatus, LifecycleError> {
        let source_state = host.state();
        let rule = match self.select(transition_type, source_state, facts) {
            Ok(rule) => rule,
            Err(e) => {
                warn!("Host {}: {}", host.id(), e);
                return Err(e);
            }
        };

        let destination_state = rule.destination_state();
        host.set_state(destination_state);
        if source_state == destination_state {
            debug!("Host {} stays in {} on {}", host.id(), destination_state, transition_type);
        } else {
            info!(
                "Host {} moved from {} to {} on {}",
                host.id(),
                source_state,
                destination_state,
                transition_type
            );
        }

        let Some(post_transition) = rule.post_transition() else {
            return Ok(destination_state);
        };

        let ctx = TransitionContext {
            transition_type,
            source_state,
            destination_state,
            facts,
        };
        let result = match post_transition {
            PostTransition::RegisterHost => self.handler.post_register_host(host, &ctx).await,
            PostTransition::DisableHost => self.handler.post_disable_host(host, &ctx).await,
            PostTransition::EnableHost => self.handler.post_enable_host(host, &ctx).await,
            PostTransition::RefreshHost(template) => {
                self.handler.post_refresh_host(host, &ctx, template).await
            }
        };

        result.map_err(|source| {
            warn!(
                "Host {}: post-transition handler into {} failed: {}",
                host.id(),
                destination_state,
                source
            );
            LifecycleError::Handler {
                transition: transition_type,
                destination: destination_state,
                source,
            }
        })?;

        Ok(host.state())
    }
}
