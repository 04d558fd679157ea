//! # Fleet Report
//!
//! Aggregate of every deploy and resync outcome in one orchestrator run, and
//! the process exit status derived from it.
//!
//! ## Exit Status
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  0  every endpoint completed or was skipped, every deploy succeeded    │
//! │  1  at least one timeout, cancellation, remote or deploy failure       │
//! │  2  at least one endpoint may be left paused (takes precedence)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{ResyncState, RunOutcome};

/// Exit status when everything succeeded.
pub const EXIT_OK: i32 = 0;

/// Exit status when at least one endpoint or deploy failed.
pub const EXIT_FAILED: i32 = 1;

/// Exit status when an endpoint may still be paused.
pub const EXIT_LEFT_PAUSED: i32 = 2;

// =============================================================================
// Deploy Outcome
// =============================================================================

/// Result of publishing one access-control function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployOutcome {
    pub endpoint: String,
    pub scope: String,
    pub collection: String,
    pub deployed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeployOutcome {
    pub fn deployed(endpoint: &str, scope: &str, collection: &str) -> Self {
        DeployOutcome {
            endpoint: endpoint.to_string(),
            scope: scope.to_string(),
            collection: collection.to_string(),
            deployed: true,
            error: None,
        }
    }

    pub fn failed(endpoint: &str, scope: &str, collection: &str, error: impl Into<String>) -> Self {
        DeployOutcome {
            endpoint: endpoint.to_string(),
            scope: scope.to_string(),
            collection: collection.to_string(),
            deployed: false,
            error: Some(error.into()),
        }
    }
}

// =============================================================================
// Fleet Report
// =============================================================================

/// Every outcome of one orchestrator run, in processing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    #[serde(default)]
    pub deploys: Vec<DeployOutcome>,

    pub outcomes: Vec<RunOutcome>,
}

impl FleetReport {
    pub fn new(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        deploys: Vec<DeployOutcome>,
        outcomes: Vec<RunOutcome>,
    ) -> Self {
        FleetReport {
            started_at,
            finished_at,
            deploys,
            outcomes,
        }
    }

    /// Wall-clock time from start to finish.
    pub fn elapsed(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Outcomes that completed their resync.
    pub fn completed(&self) -> impl Iterator<Item = &RunOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.state == ResyncState::Completed)
    }

    /// Outcomes that are not a success.
    pub fn failed(&self) -> impl Iterator<Item = &RunOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Outcomes whose endpoint may still be paused.
    pub fn left_paused(&self) -> impl Iterator<Item = &RunOutcome> {
        self.outcomes.iter().filter(|o| o.left_paused())
    }

    /// Deploys that did not go through.
    pub fn failed_deploys(&self) -> impl Iterator<Item = &DeployOutcome> {
        self.deploys.iter().filter(|d| !d.deployed)
    }

    /// Returns true if every deploy and every run succeeded.
    pub fn is_success(&self) -> bool {
        self.failed().next().is_none() && self.failed_deploys().next().is_none()
    }

    /// Process exit status for this report.
    pub fn exit_code(&self) -> i32 {
        if self.left_paused().next().is_some() {
            EXIT_LEFT_PAUSED
        } else if self.is_success() {
            EXIT_OK
        } else {
            EXIT_FAILED
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn outcome(name: &str, state: ResyncState, resumed: bool) -> RunOutcome {
        let now = Utc::now();
        RunOutcome {
            run_id: Uuid::new_v4(),
            endpoint_name: name.to_string(),
            state,
            attempts: 1,
            duration: Duration::from_secs(1),
            started_at: now,
            finished_at: now,
            pause_attempted: state != ResyncState::Skipped,
            resumed,
            failures: Vec::new(),
        }
    }

    fn report(outcomes: Vec<RunOutcome>, deploys: Vec<DeployOutcome>) -> FleetReport {
        let now = Utc::now();
        FleetReport::new(now, now, deploys, outcomes)
    }

    #[test]
    fn test_all_success() {
        let r = report(
            vec![
                outcome("lite", ResyncState::Completed, true),
                outcome("grande", ResyncState::Skipped, false),
            ],
            vec![DeployOutcome::deployed("lite", "data", "UserInfo")],
        );
        assert!(r.is_success());
        assert_eq!(r.exit_code(), EXIT_OK);
        assert_eq!(r.completed().count(), 1);
    }

    #[test]
    fn test_timeout_fails() {
        let r = report(
            vec![
                outcome("lite", ResyncState::TimedOut, true),
                outcome("grande", ResyncState::Completed, true),
            ],
            Vec::new(),
        );
        assert_eq!(r.failed().count(), 1);
        assert_eq!(r.exit_code(), EXIT_FAILED);
    }

    #[test]
    fn test_failed_deploy_fails() {
        let r = report(
            vec![outcome("lite", ResyncState::Completed, true)],
            vec![DeployOutcome::failed("lite", "data", "UserInfo", "HTTP 500")],
        );
        assert_eq!(r.exit_code(), EXIT_FAILED);
    }

    #[test]
    fn test_left_paused_takes_precedence() {
        let r = report(
            vec![
                outcome("lite", ResyncState::TimedOut, true),
                outcome("grande", ResyncState::Completed, false),
            ],
            Vec::new(),
        );
        assert_eq!(r.left_paused().count(), 1);
        assert_eq!(r.exit_code(), EXIT_LEFT_PAUSED);
    }
}
