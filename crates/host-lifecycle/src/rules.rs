//! Transition rule table
//!
//! Rules are registered once, in order, and the resulting [`RuleTable`] is
//! read-only. Within one transition type the first matching rule wins, so
//! registration order is part of the table's meaning.

use crate::condition::Condition;
use crate::facts::HostFacts;
use crate::host::HostStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Category of trigger presented to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionType {
    /// Host agent registered (or re-registered)
    RegisterHost,
    /// Operator enabled the host
    EnableHost,
    /// Operator disabled the host
    DisableHost,
    /// Periodic re-evaluation
    Refresh,
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RegisterHost => "RegisterHost",
            Self::EnableHost => "EnableHost",
            Self::DisableHost => "DisableHost",
            Self::Refresh => "RefreshStatus",
        };
        f.write_str(name)
    }
}

/// Side effect run after a rule has selected its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostTransition {
    /// See [`TransitionHandler::post_register_host`](crate::handler::TransitionHandler::post_register_host)
    RegisterHost,
    /// See [`TransitionHandler::post_disable_host`](crate::handler::TransitionHandler::post_disable_host)
    DisableHost,
    /// See [`TransitionHandler::post_enable_host`](crate::handler::TransitionHandler::post_enable_host)
    EnableHost,
    /// Refresh with the status template tied to the destination state
    RefreshHost(&'static str),
}

/// A single registered transition.
#[derive(Debug, Clone)]
pub struct TransitionRule {
    transition_type: TransitionType,
    source_states: Vec<HostStatus>,
    condition: Option<Condition>,
    destination_state: HostStatus,
    post_transition: Option<PostTransition>,
}

impl TransitionRule {
    /// Creates an unconditional rule without a handler.
    pub fn new(
        transition_type: TransitionType,
        source_states: impl IntoIterator<Item = HostStatus>,
        destination_state: HostStatus,
    ) -> Self {
        Self {
            transition_type,
            source_states: source_states.into_iter().collect(),
            condition: None,
            destination_state,
            post_transition: None,
        }
    }

    /// Guards the rule with `condition`.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Attaches a post-transition handler.
    #[must_use]
    pub fn with_post_transition(mut self, post_transition: PostTransition) -> Self {
        self.post_transition = Some(post_transition);
        self
    }

    /// Transition type this rule responds to
    #[must_use]
    pub fn transition_type(&self) -> TransitionType {
        self.transition_type
    }

    /// States from which this rule is eligible
    #[must_use]
    pub fn source_states(&self) -> &[HostStatus] {
        &self.source_states
    }

    /// State the host moves to when this rule is applied
    #[must_use]
    pub fn destination_state(&self) -> HostStatus {
        self.destination_state
    }

    /// Handler to run after the state is chosen
    #[must_use]
    pub fn post_transition(&self) -> Option<PostTransition> {
        self.post_transition
    }

    /// Whether the rule is eligible for `state` (ignoring the condition).
    #[must_use]
    pub fn accepts(&self, transition_type: TransitionType, state: HostStatus) -> bool {
        self.transition_type == transition_type && self.source_states.contains(&state)
    }

    /// Whether the rule applies. An absent condition always holds.
    #[must_use]
    pub fn matches(&self, transition_type: TransitionType, state: HostStatus, facts: &HostFacts) -> bool {
        self.accepts(transition_type, state)
            && self.condition.as_ref().is_none_or(|c| c.evaluate(facts))
    }
}

/// Ordered, immutable collection of transition rules.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<TransitionRule>,
}

impl RuleTable {
    /// Starts building a table.
    #[must_use]
    pub fn builder() -> RuleTableBuilder {
        RuleTableBuilder::default()
    }

    /// First rule, in registration order, that applies.
    #[must_use]
    pub fn find(
        &self,
        transition_type: TransitionType,
        state: HostStatus,
        facts: &HostFacts,
    ) -> Option<&TransitionRule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(transition_type, state, facts))
    }

    /// All rules, in registration order.
    #[must_use]
    pub fn rules(&self) -> &[TransitionRule] {
        &self.rules
    }

    /// Number of registered rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Collects rules in registration order.
#[derive(Debug, Default)]
pub struct RuleTableBuilder {
    rules: Vec<TransitionRule>,
}

impl RuleTableBuilder {
    /// Appends a rule. Earlier rules take priority.
    pub fn register_rule(&mut self, rule: TransitionRule) -> &mut Self {
        debug!(
            "Registering {} rule {:?} -> {}",
            rule.transition_type, rule.source_states, rule.destination_state
        );
        self.rules.push(rule);
        self
    }

    /// Freezes the table.
    #[must_use]
    pub fn build(self) -> RuleTable {
        RuleTable { rules: self.rules }
    }
}
