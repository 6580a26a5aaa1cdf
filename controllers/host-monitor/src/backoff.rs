//! Per-host refresh backoff.
//!
//! Backoff is counted in refresh cycles rather than wall-clock time: after a
//! failed evaluation the host sits out the next N cycles, with N following
//! 1, 1, 2, 3, 5, 8, ... up to a configured cap. A successful evaluation
//! starts the sequence over.

/// Backoff state for one host
#[derive(Debug, Clone)]
pub struct BackoffState {
    /// Cycles to skip after the next failure
    next_skip: u64,
    /// Skip length used for the failure before that
    prev_skip: u64,
    max_cycles: u64,
    error_count: u32,
    skip_remaining: u64,
}

impl BackoffState {
    /// Fresh state with no errors recorded.
    #[must_use]
    pub fn new(max_cycles: u64) -> Self {
        Self {
            next_skip: 1,
            prev_skip: 0,
            max_cycles: max_cycles.max(1),
            error_count: 0,
            skip_remaining: 0,
        }
    }

    /// Records a failed evaluation and schedules the next attempt.
    pub fn increment_error(&mut self) {
        self.error_count += 1;
        self.skip_remaining = self.next_skip;

        let following = self.prev_skip.saturating_add(self.next_skip).min(self.max_cycles);
        self.prev_skip = self.next_skip;
        self.next_skip = following;
    }

    /// Clears errors after a successful evaluation.
    pub fn reset(&mut self) {
        self.next_skip = 1;
        self.prev_skip = 0;
        self.error_count = 0;
        self.skip_remaining = 0;
    }

    /// Consumes one cycle; returns `true` if the host should be skipped this cycle.
    pub fn should_skip(&mut self) -> bool {
        if self.skip_remaining == 0 {
            return false;
        }
        self.skip_remaining -= 1;
        true
    }

    /// Consecutive failed evaluations
    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.error_count
    }
}
