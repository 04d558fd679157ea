//! # Engine Error Types
//!
//! Error types for remote calls, configuration and the resync cycle.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Remote calls  │  │     Resync cycle        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  RemoteCall-    │  │  ResyncTimedOut         │ │
//! │  │  InvalidUrl     │  │  Failed         │  │  ResumeFailed           │ │
//! │  │  ConfigLoad/    │  │                 │  │                         │ │
//! │  │  SaveFailed     │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Inside a run every error becomes a RunFailure in the RunOutcome.      │
//! │  Nothing here escapes ResyncStateMachine::run as an Err.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use thiserror::Error;

use resync_core::{CoreError, FailureKind, RemoteOperation, RunFailure, ValidationError};

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid control-plane URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// Input validation failed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Domain rule violation (duplicate or unknown endpoint).
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Remote Call Errors
    // =========================================================================
    /// A remote call failed at the transport or HTTP level.
    ///
    /// `status` is set when the control plane answered with a non-2xx code.
    #[error("{operation} failed for endpoint '{endpoint}': {message}")]
    RemoteCallFailed {
        operation: RemoteOperation,
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    // =========================================================================
    // Resync Cycle Errors
    // =========================================================================
    /// The poll budget ran out without a `"completed"` state.
    #[error("Resync for '{endpoint}' did not complete after {attempts} status poll(s)")]
    ResyncTimedOut { endpoint: String, attempts: u32 },

    /// Resume failed after a pause was attempted.
    #[error("Endpoint '{endpoint}' may be left paused, resume failed: {reason}")]
    ResumeFailed { endpoint: String, reason: String },

    // =========================================================================
    // Deploy Errors
    // =========================================================================
    /// An access-control function source could not be read.
    #[error("Cannot read function source {}: {reason}", path.display())]
    FunctionSourceUnreadable { path: PathBuf, reason: String },
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<url::ParseError> for EngineError {
    fn from(err: url::ParseError) -> Self {
        EngineError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl EngineError {
    /// Builds a `RemoteCallFailed` from a reqwest error.
    pub fn remote(operation: RemoteOperation, endpoint: &str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };

        EngineError::RemoteCallFailed {
            operation,
            endpoint: endpoint.to_string(),
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }

    /// Returns true if the failure is transient and the next poll may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::RemoteCallFailed { status, .. } => match status {
                None => true,
                Some(code) => *code == 408 || *code == 429 || *code >= 500,
            },
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidConfig(_)
                | EngineError::InvalidUrl(_)
                | EngineError::ConfigLoadFailed(_)
                | EngineError::ConfigSaveFailed(_)
                | EngineError::Validation(_)
                | EngineError::Core(_)
        )
    }

    /// Converts the error into the failure record kept in a run outcome.
    pub fn to_failure(&self) -> RunFailure {
        match self {
            EngineError::RemoteCallFailed { operation, .. } => RunFailure::new(
                FailureKind::RemoteCallFailed,
                Some(*operation),
                self.to_string(),
            ),
            EngineError::ResyncTimedOut { .. } => {
                RunFailure::new(FailureKind::ResyncTimedOut, None, self.to_string())
            }
            EngineError::ResumeFailed { .. } => RunFailure::new(
                FailureKind::ResumeFailed,
                Some(RemoteOperation::Resume),
                self.to_string(),
            ),
            other => RunFailure::new(FailureKind::RemoteCallFailed, None, other.to_string()),
        }
    }
}
