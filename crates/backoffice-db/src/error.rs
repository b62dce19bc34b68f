//! # Database Error Types
//!
//! Error types for database operations, and the service error callers see.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Business rejection                │
//! │       │                              (backoffice_core::CoreError)      │
//! │       ▼                                     │                           │
//! │  DbError (this module)                      │                           │
//! │       │                                     │                           │
//! │       └──────────────┬──────────────────────┘                           │
//! │                      ▼                                                  │
//! │  ServiceError { Rejected | Persistence }                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  code() + user_message() for the web front end                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoffice_core::CoreError;
use serde::Serialize;
use thiserror::Error;

// =============================================================================
// DbError
// =============================================================================

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - Unknown airline, ticket or need request id
    /// - `fetch_one` returns no rows
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate airline code
    /// - Two stock items with the same (name, category, unit)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Ticket referencing a non-existent airline
    /// - Movement referencing a non-existent need request
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed, including CHECK constraint failures.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>"
                // "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// ServiceError
// =============================================================================

/// Error returned by the transactional flows (ticket, stock, procurement).
///
/// Either a business rejection raised before any write, or a persistence
/// failure that rolled the transaction back.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Rejected(#[from] CoreError),

    #[error(transparent)]
    Persistence(DbError),
}

/// Machine-readable error codes.
///
/// ```typescript
/// switch (e.code) {
///   case 'INSUFFICIENT_STOCK': showStockWarning(e.message); break;
///   case 'PERSISTENCE_CONFLICT': showRetry(); break;
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoApplicableRule,
    MissingRequiredBaseFare,
    InsufficientStock,
    ItemNeverReceived,
    RequestNotApproved,
    InvalidRequestTransition,
    ValidationError,
    NotFound,
    PersistenceConflict,
}

/// Message shown for every persistence failure; the cause is logged.
pub const PERSISTENCE_MESSAGE: &str = "The operation could not be completed";

impl ServiceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::Rejected(err) => match err {
                CoreError::NoApplicableRule { .. } => ErrorCode::NoApplicableRule,
                CoreError::MissingRequiredBaseFare { .. } => ErrorCode::MissingRequiredBaseFare,
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::ItemNeverReceived { .. } => ErrorCode::ItemNeverReceived,
                CoreError::RequestNotApproved { .. } => ErrorCode::RequestNotApproved,
                CoreError::InvalidRequestTransition { .. } => ErrorCode::InvalidRequestTransition,
                CoreError::Validation(_) => ErrorCode::ValidationError,
            },
            ServiceError::Persistence(DbError::NotFound { .. }) => ErrorCode::NotFound,
            ServiceError::Persistence(_) => ErrorCode::PersistenceConflict,
        }
    }

    /// Human-readable reason, safe to display.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Rejected(err) => err.to_string(),
            ServiceError::Persistence(err @ DbError::NotFound { .. }) => err.to_string(),
            ServiceError::Persistence(_) => PERSISTENCE_MESSAGE.to_string(),
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, ServiceError::Rejected(_))
    }
}

/// Persistence failures are logged here, once, with their real cause.
impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::NotFound { entity, id } => {
                tracing::debug!(entity = %entity, id = %id, "Lookup failed");
            }
            other => {
                tracing::error!(error = %other, "Persistence failure, transaction rolled back");
            }
        }
        ServiceError::Persistence(err)
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::from(DbError::from(err))
    }
}

impl From<backoffice_core::ValidationError> for ServiceError {
    fn from(err: backoffice_core::ValidationError) -> Self {
        ServiceError::Rejected(CoreError::Validation(err))
    }
}

/// Result type for the transactional flows.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use backoffice_core::{NeedRequestStatus, ValidationError};

    #[test]
    fn test_rejection_codes_and_messages() {
        let err = ServiceError::from(CoreError::InsufficientStock {
            item: "Ramette A4".to_string(),
            available: 30,
            requested: 50,
        });
        assert_eq!(err.code(), ErrorCode::InsufficientStock);
        assert!(err.user_message().contains("available 30"));
        assert!(err.is_rejection());

        let err = ServiceError::from(CoreError::RequestNotApproved {
            request_id: "r".to_string(),
            status: NeedRequestStatus::Draft,
        });
        assert_eq!(err.code(), ErrorCode::RequestNotApproved);

        let err = ServiceError::from(ValidationError::Required {
            field: "justification".to_string(),
        });
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn test_persistence_is_generic() {
        let err = ServiceError::from(DbError::QueryFailed("CHECK constraint failed".to_string()));
        assert_eq!(err.code(), ErrorCode::PersistenceConflict);
        assert_eq!(err.user_message(), PERSISTENCE_MESSAGE);
        assert!(!err.is_rejection());

        let err = ServiceError::from(DbError::not_found("Airline", "XX"));
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.user_message(), "Airline not found: XX");
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::PersistenceConflict).unwrap();
        assert_eq!(json, "\"PERSISTENCE_CONFLICT\"");
    }
}
