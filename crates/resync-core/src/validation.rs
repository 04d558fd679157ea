//! # Validation Module
//!
//! Input validation for endpoint descriptors and poll settings.
//!
//! Identifiers end up as path segments of remote URLs. They are escaped when
//! the URL is built, so validation only rejects values that can never be a
//! real identifier: empty, overlong, or carrying control characters.

use std::collections::HashSet;

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest identifier accepted for an endpoint, scope or collection.
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// Upper bound for the poll budget.
pub const MAX_POLL_RETRIES: u64 = 10_000;

/// Upper bound for the poll interval, in seconds.
pub const MAX_POLL_INTERVAL_SECS: u64 = 3_600;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an identifier used in a remote path.
///
/// ## Example
/// ```rust
/// use resync_core::validation::validate_identifier;
///
/// assert!(validate_identifier("scope", "data").is_ok());
/// assert!(validate_identifier("scope", "  ").is_err());
/// ```
pub fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }

    if value.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "contains control characters".to_string(),
        });
    }

    Ok(())
}

/// Validates a collection list: every entry is a valid identifier and none
/// appears twice.
pub fn validate_collections(collections: &[String]) -> ValidationResult<()> {
    let mut seen = HashSet::with_capacity(collections.len());

    for collection in collections {
        validate_identifier("collection", collection)?;

        if !seen.insert(collection.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "collection".to_string(),
                value: collection.clone(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the poll budget (number of status calls).
pub fn validate_max_retries(max_retries: u32) -> ValidationResult<()> {
    check_range("max_retries", max_retries as u64, 1, MAX_POLL_RETRIES)
}

/// Validates the poll interval in seconds.
pub fn validate_poll_interval_secs(secs: u64) -> ValidationResult<()> {
    check_range("interval_secs", secs, 1, MAX_POLL_INTERVAL_SECS)
}

fn check_range(field: &str, value: u64, min: u64, max: u64) -> ValidationResult<()> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
