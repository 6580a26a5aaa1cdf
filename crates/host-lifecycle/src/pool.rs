//! Rule table for hosts waiting in the pool
//!
//! Hosts in the pool are discovered, checked against the hardware minimums
//! and, once they pass, marked ready to be moved into a cluster.

use crate::condition::{Condition, and, fact, not};
use crate::facts::Fact;
use crate::host::HostStatus;
use crate::rules::{PostTransition, RuleTable, TransitionRule, TransitionType};
use crate::status::{
    STATUS_INFO_DISCONNECTED, STATUS_INFO_DISCOVERING, STATUS_INFO_INSUFFICIENT_HARDWARE,
    STATUS_INFO_READY_TO_BE_MOVED,
};

/// Disks, CPU, memory and platform all meet the pool minimums.
#[must_use]
pub fn has_min_required_hardware() -> Condition {
    and(Fact::HARDWARE.into_iter().map(fact))
}

/// Builds the pool host rule table.
///
/// Refresh rules are ordered so connectivity is decided before inventory and
/// inventory before hardware.
#[must_use]
pub fn pool_host_rule_table() -> RuleTable {
    use HostStatus::{Disabled, Disconnected, Discovering, Initial, Insufficient, ReadyToBeMoved};

    let mut table = RuleTable::builder();

    // Register host
    table.register_rule(
        TransitionRule::new(
            TransitionType::RegisterHost,
            [Initial, Discovering, Disconnected, Insufficient, ReadyToBeMoved],
            Discovering,
        )
        .with_post_transition(PostTransition::RegisterHost),
    );

    // A disabled host that boots again registers without leaving disabled
    table.register_rule(TransitionRule::new(
        TransitionType::RegisterHost,
        [Disabled],
        Disabled,
    ));

    // Disable host
    table.register_rule(
        TransitionRule::new(
            TransitionType::DisableHost,
            [Disconnected, Discovering, Insufficient, ReadyToBeMoved],
            Disabled,
        )
        .with_post_transition(PostTransition::DisableHost),
    );

    // Enable host
    table.register_rule(
        TransitionRule::new(TransitionType::EnableHost, [Disabled], Discovering)
            .with_post_transition(PostTransition::EnableHost),
    );

    // Refresh host
    table.register_rule(
        TransitionRule::new(
            TransitionType::Refresh,
            [Discovering, Insufficient, ReadyToBeMoved, Disconnected],
            Disconnected,
        )
        .with_condition(not(fact(Fact::Connected)))
        .with_post_transition(PostTransition::RefreshHost(STATUS_INFO_DISCONNECTED)),
    );

    table.register_rule(
        TransitionRule::new(TransitionType::Refresh, [Disconnected, Discovering], Discovering)
            .with_condition(and([fact(Fact::Connected), not(fact(Fact::HasInventory))]))
            .with_post_transition(PostTransition::RefreshHost(STATUS_INFO_DISCOVERING)),
    );

    // Fires when at least one hardware minimum is not met
    table.register_rule(
        TransitionRule::new(
            TransitionType::Refresh,
            [Disconnected, Discovering, Insufficient, ReadyToBeMoved],
            Insufficient,
        )
        .with_condition(and([
            fact(Fact::Connected),
            fact(Fact::HasInventory),
            not(has_min_required_hardware()),
        ]))
        .with_post_transition(PostTransition::RefreshHost(STATUS_INFO_INSUFFICIENT_HARDWARE)),
    );

    // Noop transitions
    for state in [Disabled] {
        table.register_rule(TransitionRule::new(TransitionType::Refresh, [state], state));
    }

    table.register_rule(
        TransitionRule::new(
            TransitionType::Refresh,
            [Disconnected, Discovering, Insufficient, ReadyToBeMoved],
            ReadyToBeMoved,
        )
        .with_condition(and([
            fact(Fact::Connected),
            fact(Fact::HasInventory),
            has_min_required_hardware(),
        ]))
        .with_post_transition(PostTransition::RefreshHost(STATUS_INFO_READY_TO_BE_MOVED)),
    );

    table.build()
}
