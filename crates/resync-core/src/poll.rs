//! # Poll Loop Decisions
//!
//! Decides what happens after each status poll, without performing the wait.
//!
//! ## Decision Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        One Poll Iteration                               │
//! │                                                                         │
//! │   status call (engine) ──► observed ResyncState                         │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                         PollTracker::observe                            │
//! │                                   │                                     │
//! │          ┌────────────────────────┼────────────────────────┐            │
//! │          ▼                        ▼                        ▼            │
//! │      Complete               Wait(interval)             Exhausted        │
//! │   (no more waits)      (engine suspends, polls     (budget spent,       │
//! │                             again)                  run times out)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine owns the clock; this module owns the counting. Keeping them
//! apart lets tests drive the loop with a scripted status sequence and a fake
//! pacer.
//!
//! A poll that fails or reports an unrecognized state is observed as
//! `InProgress` and consumes one unit of budget like any other poll. No wait
//! is scheduled after the final poll of the budget.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::ResyncState;
use crate::{DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL_SECS};

// =============================================================================
// Policy
// =============================================================================

/// Poll budget and interval for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Maximum number of status calls.
    pub max_retries: u32,

    /// Suspension between two status calls.
    pub interval: Duration,
}

impl PollPolicy {
    pub const fn new(max_retries: u32, interval: Duration) -> Self {
        PollPolicy {
            max_retries,
            interval,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy::new(
            DEFAULT_MAX_RETRIES,
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        )
    }
}

// =============================================================================
// Tracker
// =============================================================================

/// What the engine should do after a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    /// The remote job completed. Stop without waiting.
    Complete,

    /// Suspend for the given duration, then poll again.
    Wait(Duration),

    /// The budget is spent without completion.
    ///
    /// No wait follows the exhausting poll, so a budget of `N` polls ends
    /// after `N - 1` waits. Do not add a trailing wait: it only delays the
    /// resume of a run that has already timed out.
    Exhausted,
}

/// Counts polls against a [`PollPolicy`].
#[derive(Debug, Clone)]
pub struct PollTracker {
    policy: PollPolicy,
    polls: u32,
    waits: u32,
    completed: bool,
}

impl PollTracker {
    pub fn new(policy: PollPolicy) -> Self {
        PollTracker {
            policy,
            polls: 0,
            waits: 0,
            completed: false,
        }
    }

    /// Returns true if another status call is allowed.
    pub fn can_poll(&self) -> bool {
        !self.completed && self.polls < self.policy.max_retries
    }

    /// Records the state observed by one status call.
    ///
    /// Once a terminal decision has been returned, further observations are
    /// not counted and return the same decision.
    pub fn observe(&mut self, observed: ResyncState) -> PollDecision {
        if !self.can_poll() {
            return self.terminal_decision();
        }

        self.polls += 1;

        if observed == ResyncState::Completed {
            self.completed = true;
            return PollDecision::Complete;
        }

        if self.polls >= self.policy.max_retries {
            return PollDecision::Exhausted;
        }

        self.waits += 1;
        PollDecision::Wait(self.policy.interval)
    }

    /// State the run ends in once polling stops.
    pub fn final_state(&self) -> ResyncState {
        if self.completed {
            ResyncState::Completed
        } else {
            ResyncState::TimedOut
        }
    }

    /// Number of status calls recorded.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Number of waits requested.
    pub fn waits(&self) -> u32 {
        self.waits
    }

    fn terminal_decision(&self) -> PollDecision {
        if self.completed {
            PollDecision::Complete
        } else {
            PollDecision::Exhausted
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(max: u32) -> PollTracker {
        PollTracker::new(PollPolicy::new(max, Duration::from_secs(10)))
    }

    #[test]
    fn test_default_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.max_retries, 12);
        assert_eq!(policy.interval, Duration::from_secs(10));
    }

    #[test]
    fn test_complete_on_first_poll() {
        let mut t = tracker(12);
        assert_eq!(t.observe(ResyncState::Completed), PollDecision::Complete);
        assert_eq!(t.polls(), 1);
        assert_eq!(t.waits(), 0);
        assert_eq!(t.final_state(), ResyncState::Completed);
        assert!(!t.can_poll());
    }

    #[test]
    fn test_completes_on_third_poll() {
        let mut t = tracker(12);
        assert_eq!(t.observe(ResyncState::InProgress), PollDecision::Wait(Duration::from_secs(10)));
        assert_eq!(t.observe(ResyncState::InProgress), PollDecision::Wait(Duration::from_secs(10)));
        assert_eq!(t.observe(ResyncState::Completed), PollDecision::Complete);
        assert_eq!(t.polls(), 3);
        assert_eq!(t.waits(), 2);
    }

    #[test]
    fn test_budget_exhausted() {
        let mut t = tracker(12);
        let mut decisions = Vec::new();
        while t.can_poll() {
            decisions.push(t.observe(ResyncState::InProgress));
        }

        assert_eq!(t.polls(), 12);
        assert_eq!(t.waits(), 11);
        assert_eq!(decisions.last(), Some(&PollDecision::Exhausted));
        assert_eq!(t.final_state(), ResyncState::TimedOut);
    }

    #[test]
    fn test_exhausting_poll_requests_no_wait() {
        let mut t = tracker(3);
        let decisions: Vec<_> = (0..3).map(|_| t.observe(ResyncState::InProgress)).collect();

        assert!(matches!(decisions[0], PollDecision::Wait(_)));
        assert!(matches!(decisions[1], PollDecision::Wait(_)));
        assert_eq!(decisions[2], PollDecision::Exhausted);
        assert_eq!(t.waits(), 2);
    }

    #[test]
    fn test_observe_after_terminal_is_not_counted() {
        let mut t = tracker(1);
        assert_eq!(t.observe(ResyncState::InProgress), PollDecision::Exhausted);
        assert_eq!(t.observe(ResyncState::Completed), PollDecision::Exhausted);
        assert_eq!(t.polls(), 1);
    }

    #[test]
    fn test_zero_budget_never_polls() {
        let t = tracker(0);
        assert!(!t.can_poll());
        assert_eq!(t.final_state(), ResyncState::TimedOut);
    }
}
