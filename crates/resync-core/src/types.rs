//! # Domain Types
//!
//! Core types shared by the state machine, the orchestrator and the CLI.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────────┐   ┌─────────────────┐   ┌─────────────────┐   │
//! │  │ EndpointDescriptor  │   │   ResyncState   │   │   RunOutcome    │   │
//! │  │  ─────────────────  │   │  ─────────────  │   │  ─────────────  │   │
//! │  │  name               │   │  NotStarted     │   │  run_id (UUID)  │   │
//! │  │  scope              │   │  InProgress     │   │  state          │   │
//! │  │  collections        │   │  Completed      │   │  attempts       │   │
//! │  └─────────────────────┘   │  TimedOut       │   │  duration       │   │
//! │                            │  Cancelled      │   │  resumed        │   │
//! │  ┌─────────────────────┐   │  Skipped        │   │  failures       │   │
//! │  │ RunFailure          │   └─────────────────┘   └─────────────────┘   │
//! │  │  kind, operation    │                                                │
//! │  │  message            │                                                │
//! │  └─────────────────────┘                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::validation;
use crate::COMPLETED_STATE;

// =============================================================================
// Endpoint Descriptor
// =============================================================================

/// One replication endpoint and the collections to resync on it.
///
/// An empty `collections` list is valid and means "nothing to resync".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Endpoint name, used in every remote path and every log line.
    pub name: String,

    /// Scope the collections live under.
    pub scope: String,

    /// Collections to resync, in the order they were configured.
    #[serde(default)]
    pub collections: Vec<String>,
}

impl EndpointDescriptor {
    /// Creates a descriptor.
    pub fn new(
        name: impl Into<String>,
        scope: impl Into<String>,
        collections: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        EndpointDescriptor {
            name: name.into(),
            scope: scope.into(),
            collections: collections.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if there is at least one collection to resync.
    pub fn has_work(&self) -> bool {
        !self.collections.is_empty()
    }

    /// Name and scope are required whenever there is something to resync,
    /// and no collection may be listed twice.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.has_work() {
            return Ok(());
        }

        validation::validate_identifier("endpoint name", &self.name)?;
        validation::validate_identifier("scope", &self.scope)?;
        validation::validate_collections(&self.collections)
    }
}

// =============================================================================
// Resync State
// =============================================================================

/// State of one endpoint's resync run.
///
/// `Completed`, `TimedOut`, `Cancelled` and `Skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResyncState {
    /// Nothing has been sent to the remote side yet.
    NotStarted,

    /// Resync was requested and has not been observed as completed.
    InProgress,

    /// The remote job reported `"completed"`.
    Completed,

    /// The poll budget ran out before completion.
    TimedOut,

    /// An external cancellation stopped the run.
    Cancelled,

    /// The endpoint had no collections; no remote call was made.
    Skipped,
}

impl ResyncState {
    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResyncState::Completed
                | ResyncState::TimedOut
                | ResyncState::Cancelled
                | ResyncState::Skipped
        )
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: ResyncState) -> bool {
        use ResyncState::*;
        matches!(
            (self, next),
            (NotStarted, InProgress)
                | (NotStarted, Skipped)
                | (NotStarted, Cancelled)
                | (InProgress, Completed)
                | (InProgress, TimedOut)
                | (InProgress, Cancelled)
        )
    }

    /// Returns `next` if the transition is legal.
    pub fn transition(self, next: ResyncState) -> CoreResult<ResyncState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Interprets the `state` field of a remote status response.
    ///
    /// Only the literal `"completed"` counts as done. A missing or
    /// unrecognized value keeps the run in progress.
    pub fn from_remote(state: Option<&str>) -> ResyncState {
        match state {
            Some(s) if s == COMPLETED_STATE => ResyncState::Completed,
            _ => ResyncState::InProgress,
        }
    }
}

impl fmt::Display for ResyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResyncState::NotStarted => "not-started",
            ResyncState::InProgress => "in-progress",
            ResyncState::Completed => "completed",
            ResyncState::TimedOut => "timed-out",
            ResyncState::Cancelled => "cancelled",
            ResyncState::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Remote Operations & Failures
// =============================================================================

/// Calls made against the remote control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteOperation {
    Pause,
    Resume,
    StartResync,
    ResyncStatus,
    PublishFunction,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoteOperation::Pause => "pause",
            RemoteOperation::Resume => "resume",
            RemoteOperation::StartResync => "start resync",
            RemoteOperation::ResyncStatus => "resync status",
            RemoteOperation::PublishFunction => "publish function",
        };
        f.write_str(s)
    }
}

/// Failure categories an operator has to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A remote call failed at the transport or HTTP level.
    RemoteCallFailed,

    /// The poll budget ran out without a `"completed"` state.
    ResyncTimedOut,

    /// The cleanup resume failed; the endpoint may still be paused.
    ResumeFailed,
}

/// A failure recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,

    /// The remote call involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<RemoteOperation>,

    pub message: String,
}

impl RunFailure {
    pub fn new(
        kind: FailureKind,
        operation: Option<RemoteOperation>,
        message: impl Into<String>,
    ) -> Self {
        RunFailure {
            kind,
            operation,
            message: message.into(),
        }
    }
}

// =============================================================================
// Run Outcome
// =============================================================================

/// What happened to one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: Uuid,

    pub endpoint_name: String,

    /// Final state of the run.
    pub state: ResyncState,

    /// Number of status calls made.
    pub attempts: u32,

    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    /// Whether a pause call was issued (and therefore a resume was owed).
    pub pause_attempted: bool,

    /// Whether the cleanup resume was confirmed by the remote side.
    pub resumed: bool,

    #[serde(default)]
    pub failures: Vec<RunFailure>,
}

impl RunOutcome {
    /// Returns true if the resync finished (or had nothing to do) and the
    /// endpoint is not left paused.
    pub fn is_success(&self) -> bool {
        matches!(self.state, ResyncState::Completed | ResyncState::Skipped) && !self.left_paused()
    }

    /// Returns true if a pause was issued but no resume was confirmed.
    pub fn left_paused(&self) -> bool {
        self.pause_attempted && !self.resumed
    }

    /// Returns true if a failure of the given kind was recorded.
    pub fn has_failure(&self, kind: FailureKind) -> bool {
        self.failures.iter().any(|f| f.kind == kind)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} after {} poll(s) in {:.1}s",
            self.endpoint_name,
            self.state,
            self.attempts,
            self.duration.as_secs_f64()
        )?;

        if self.left_paused() {
            write!(f, ", ENDPOINT MAY BE LEFT PAUSED")?;
        } else if self.resumed {
            write!(f, ", resumed")?;
        }

        for failure in &self.failures {
            write!(f, "\n    - {}", failure.message)?;
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(state: ResyncState, pause_attempted: bool, resumed: bool) -> RunOutcome {
        let now = Utc::now();
        RunOutcome {
            run_id: Uuid::new_v4(),
            endpoint_name: "lite".to_string(),
            state,
            attempts: 3,
            duration: Duration::from_millis(20_500),
            started_at: now,
            finished_at: now,
            pause_attempted,
            resumed,
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_remote_state_fails_closed() {
        assert_eq!(ResyncState::from_remote(Some("completed")), ResyncState::Completed);
        assert_eq!(ResyncState::from_remote(Some("running")), ResyncState::InProgress);
        assert_eq!(ResyncState::from_remote(Some("COMPLETED")), ResyncState::InProgress);
        assert_eq!(ResyncState::from_remote(Some("")), ResyncState::InProgress);
        assert_eq!(ResyncState::from_remote(None), ResyncState::InProgress);
    }

    #[test]
    fn test_terminal_states_have_no_exit() {
        let all = [
            ResyncState::NotStarted,
            ResyncState::InProgress,
            ResyncState::Completed,
            ResyncState::TimedOut,
            ResyncState::Cancelled,
            ResyncState::Skipped,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_transition() {
        assert_eq!(
            ResyncState::NotStarted.transition(ResyncState::InProgress).unwrap(),
            ResyncState::InProgress
        );
        assert!(ResyncState::NotStarted
            .transition(ResyncState::Completed)
            .is_err());
    }

    #[test]
    fn test_descriptor_validation() {
        assert!(EndpointDescriptor::new("lite", "data", ["UserInfo"]).validate().is_ok());

        // Nothing to resync: name and scope are not required.
        assert!(EndpointDescriptor::new("", "", Vec::<String>::new()).validate().is_ok());

        assert!(EndpointDescriptor::new("", "data", ["UserInfo"]).validate().is_err());
        assert!(EndpointDescriptor::new("lite", " ", ["UserInfo"]).validate().is_err());
        assert!(EndpointDescriptor::new("lite", "data", ["A", "A"]).validate().is_err());
    }

    #[test]
    fn test_outcome_success_and_paused() {
        assert!(outcome(ResyncState::Completed, true, true).is_success());
        assert!(outcome(ResyncState::Skipped, false, false).is_success());

        let stuck = outcome(ResyncState::Completed, true, false);
        assert!(stuck.left_paused());
        assert!(!stuck.is_success());

        assert!(!outcome(ResyncState::TimedOut, true, true).is_success());
    }

    #[test]
    fn test_outcome_display() {
        let text = outcome(ResyncState::Completed, true, true).to_string();
        assert_eq!(text, "[lite] completed after 3 poll(s) in 20.5s, resumed");

        let text = outcome(ResyncState::TimedOut, true, false).to_string();
        assert!(text.contains("MAY BE LEFT PAUSED"));
    }

    #[test]
    fn test_outcome_serializes_duration_in_millis() {
        let json = serde_json::to_value(outcome(ResyncState::TimedOut, true, true)).unwrap();
        assert_eq!(json["duration_ms"], 20_500);
        assert_eq!(json["state"], "timed-out");
    }
}
