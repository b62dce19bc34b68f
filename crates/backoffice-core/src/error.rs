//! # Error Types
//!
//! Domain-specific error types for backoffice-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  backoffice-core errors (this file)                                    │
//! │  ├── CoreError        - Business rule rejections                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  backoffice-db errors (separate crate)                                 │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── ServiceError     - What callers see (code + message)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → UI                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant is a blocking rejection: it is raised before any write, or
//! the surrounding transaction is rolled back. Messages are shown to users
//! as-is, so each one names what went wrong.

use thiserror::Error;

use crate::types::{NeedRequestStatus, TravelClass};

// =============================================================================
// Core Error
// =============================================================================

/// Business rule rejections.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No active rule of the airline matches the route, class and date.
    ///
    /// ## When This Occurs
    /// - The airline has no rule covering the route
    /// - Every matching rule is outside its activation window
    /// - Every matching rule is restricted to another travel class
    #[error("No applicable commission rule for airline {airline} on route {route} ({travel_class})")]
    NoApplicableRule {
        airline: String,
        route: String,
        travel_class: TravelClass,
    },

    /// The airline's override formula needs a real base fare.
    #[error("A base fare is required for airline {airline_code} tickets")]
    MissingRequiredBaseFare { airline_code: String },

    /// An OUT movement would drive the item's quantity below zero.
    ///
    /// ## User Workflow
    /// ```text
    /// Post OUT 100 "Ramette A4"
    ///      │
    ///      ▼
    /// Check stock: available=65
    ///      │
    ///      ▼
    /// InsufficientStock { item: "Ramette A4 ...", available: 65, requested: 100 }
    /// ```
    #[error("Insufficient stock for this withdrawal of {item}: available {available}, requested {requested}")]
    InsufficientStock {
        item: String,
        available: i64,
        requested: i64,
    },

    /// OUT movement against an item that was never received.
    #[error("Cannot remove stock for an item that has never been received: {item}")]
    ItemNeverReceived { item: String },

    /// A movement references a procurement request that is not approved.
    #[error("Request {request_id} is {status}: it must be approved before a stock movement can reference it")]
    RequestNotApproved {
        request_id: String,
        status: NeedRequestStatus,
    },

    /// Procurement request transition outside the state machine.
    #[error("Cannot {action} a request that is {from}")]
    InvalidRequestTransition {
        from: NeedRequestStatus,
        action: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. malformed currency code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            item: "Ramette A4".to_string(),
            available: 30,
            requested: 50,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for this withdrawal of Ramette A4: available 30, requested 50"
        );

        let err = CoreError::RequestNotApproved {
            request_id: "req-1".to_string(),
            status: NeedRequestStatus::Submitted,
        };
        assert_eq!(
            err.to_string(),
            "Request req-1 is SUBMITTED: it must be approved before a stock movement can reference it"
        );

        let err = CoreError::NoApplicableRule {
            airline: "ET".to_string(),
            route: "BZV-DKR".to_string(),
            travel_class: TravelClass::Business,
        };
        assert_eq!(
            err.to_string(),
            "No applicable commission rule for airline ET on route BZV-DKR (BUSINESS)"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "justification".to_string(),
        };
        assert_eq!(err.to_string(), "justification is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
