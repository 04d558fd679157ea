//! # Error Types
//!
//! Domain-specific error types for resync-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  resync-core errors (this file)                                        │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  resync-engine errors (separate crate)                                 │
//! │  └── EngineError      - Remote calls, config, timeouts                 │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → RunFailure          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::ResyncState;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Two endpoints in one fleet share a name.
    #[error("Endpoint '{0}' is listed more than once")]
    DuplicateEndpoint(String),

    /// An endpoint was requested that the fleet does not contain.
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// A run tried to move between two states that are not connected.
    ///
    /// ## Allowed Transitions
    /// ```text
    /// NotStarted ──► InProgress ──► Completed
    ///     │              ├────────► TimedOut
    ///     │              └────────► Cancelled
    ///     ├──► Skipped
    ///     └──► Cancelled
    /// ```
    #[error("Invalid resync transition from {from} to {to}")]
    InvalidTransition { from: ResyncState, to: ResyncState },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: u64, max: u64 },

    /// Invalid format (e.g., control characters in an identifier).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., the same collection listed twice).
    #[error("{field} '{value}' is listed more than once")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
