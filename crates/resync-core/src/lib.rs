//! # resync-core: Pure Types and Decisions for Endpoint Resync
//!
//! This crate holds everything about a pause → resync → poll → resume cycle
//! that can be decided without touching the network or a clock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Resync Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    resync CLI (apps/resync-cli)                 │   │
//! │  │    args ──► config ──► deploy ──► fleet resync ──► exit code    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    resync-engine                                │   │
//! │  │    HTTP client, state machine, orchestrator, config            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ resync-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   poll    │  │  report   │  │ validation│  │   │
//! │  │   │ Endpoint  │  │ Tracker   │  │ Fleet     │  │   rules   │  │   │
//! │  │   │ Outcome   │  │ Decision  │  │ Report    │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Endpoint descriptors, states, run outcomes, failures
//! - [`poll`] - Poll-loop decisions, separated from the act of waiting
//! - [`report`] - Aggregate fleet report and exit status
//! - [`error`] - Domain error types
//! - [`validation`] - Descriptor and identifier validation
//!
//! ## Example Usage
//!
//! ```rust
//! use resync_core::poll::{PollDecision, PollPolicy, PollTracker};
//! use resync_core::ResyncState;
//! use std::time::Duration;
//!
//! let mut tracker = PollTracker::new(PollPolicy::new(12, Duration::from_secs(10)));
//!
//! assert_eq!(
//!     tracker.observe(ResyncState::InProgress),
//!     PollDecision::Wait(Duration::from_secs(10))
//! );
//! assert_eq!(tracker.observe(ResyncState::Completed), PollDecision::Complete);
//! assert_eq!(tracker.polls(), 2);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod poll;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use poll::{PollDecision, PollPolicy, PollTracker};
pub use report::{DeployOutcome, FleetReport};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Number of status polls allowed before a run is declared timed out.
pub const DEFAULT_MAX_RETRIES: u32 = 12;

/// Seconds between two status polls.
///
/// Some deployments poll every second; this is only the default and is
/// overridable in configuration.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// The only remote job state treated as terminal success.
pub const COMPLETED_STATE: &str = "completed";
