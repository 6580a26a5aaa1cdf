//! Condition algebra over host facts
//!
//! A [`Condition`] is an opaque, pure predicate over a [`HostFacts`] snapshot.
//! Conditions compose with [`not`], [`and`] and [`or`]; callers only ever see
//! [`Condition::evaluate`].

use crate::facts::{Fact, HostFacts};
use std::fmt;
use std::sync::Arc;

type Predicate = dyn Fn(&HostFacts) -> bool + Send + Sync;

/// Pure boolean predicate over a host's facts.
#[derive(Clone)]
pub struct Condition(Arc<Predicate>);

impl Condition {
    /// Wraps an arbitrary predicate.
    ///
    /// The predicate must not block or perform I/O.
    pub fn from_fn<F>(predicate: F) -> Self
    where
        F: Fn(&HostFacts) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// Condition that always holds.
    #[must_use]
    pub fn always() -> Self {
        Self::from_fn(|_| true)
    }

    /// Evaluates the condition against a snapshot.
    #[must_use]
    pub fn evaluate(&self, facts: &HostFacts) -> bool {
        (self.0)(facts)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Condition(..)")
    }
}

/// Condition holding when `fact` is true.
#[must_use]
pub fn fact(fact: Fact) -> Condition {
    Condition::from_fn(move |facts| facts.get(fact))
}

/// Negation of `condition`.
#[must_use]
pub fn not(condition: Condition) -> Condition {
    Condition::from_fn(move |facts| !condition.evaluate(facts))
}

/// Conjunction; stops at the first operand that is false.
///
/// An empty conjunction holds.
pub fn and(conditions: impl IntoIterator<Item = Condition>) -> Condition {
    let conditions: Vec<Condition> = conditions.into_iter().collect();
    Condition::from_fn(move |facts| conditions.iter().all(|c| c.evaluate(facts)))
}

/// Disjunction; stops at the first operand that is true.
///
/// An empty disjunction does not hold.
pub fn or(conditions: impl IntoIterator<Item = Condition>) -> Condition {
    let conditions: Vec<Condition> = conditions.into_iter().collect();
    Condition::from_fn(move |facts| conditions.iter().any(|c| c.evaluate(facts)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn constant(value: bool) -> Condition {
        Condition::from_fn(move |_| value)
    }

    fn probe(value: bool, calls: &Arc<AtomicUsize>) -> Condition {
        let calls = Arc::clone(calls);
        Condition::from_fn(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            value
        })
    }

    #[test]
    fn test_truth_table() {
        let facts = HostFacts::default();
        for a in [false, true] {
            assert_eq!(not(constant(a)).evaluate(&facts), !a);
            for b in [false, true] {
                assert_eq!(and([constant(a), constant(b)]).evaluate(&facts), a && b);
                assert_eq!(or([constant(a), constant(b)]).evaluate(&facts), a || b);
            }
        }
    }

    #[test]
    fn test_empty_combinators() {
        let facts = HostFacts::default();
        assert!(and(Vec::new()).evaluate(&facts));
        assert!(!or(Vec::new()).evaluate(&facts));
        assert!(Condition::always().evaluate(&facts));
    }

    #[test]
    fn test_and_short_circuits_on_first_false() {
        let calls = Arc::new(AtomicUsize::new(0));
        let condition = and([constant(true), constant(false), probe(true, &calls)]);

        assert!(!condition.evaluate(&HostFacts::default()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_or_short_circuits_on_first_true() {
        let calls = Arc::new(AtomicUsize::new(0));
        let condition = or([constant(false), constant(true), probe(false, &calls)]);

        assert!(condition.evaluate(&HostFacts::default()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_operands_evaluated_until_determined() {
        let calls = Arc::new(AtomicUsize::new(0));
        let condition = and([probe(true, &calls), probe(true, &calls), probe(false, &calls)]);

        assert!(!condition.evaluate(&HostFacts::default()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_fact_reads_snapshot() {
        let facts = HostFacts::default().with(Fact::Connected, true);
        assert!(fact(Fact::Connected).evaluate(&facts));
        assert!(!fact(Fact::HasInventory).evaluate(&facts));
        assert!(and([fact(Fact::Connected), not(fact(Fact::HasInventory))]).evaluate(&facts));
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let condition = or([fact(Fact::HasMinMemory), not(fact(Fact::Connected))]);
        let facts = HostFacts::all(false);
        let first = condition.evaluate(&facts);
        for _ in 0..5 {
            assert_eq!(condition.evaluate(&facts), first);
        }
    }
}
