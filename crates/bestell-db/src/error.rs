//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error          TranslationError        ValidationError          │
//! │  (SQLite / Postgres)  (bestell-core)          (bestell-core)           │
//! │       │                     │                       │                   │
//! │       └─────────────────────┼───────────────────────┘                   │
//! │                             ▼                                           │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Order form shows a message                                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Running out of stock is not an I/O failure. The ledger and the order
//! manager report it as a value ([`crate::Decrement`],
//! [`crate::OrderOutcome`]); [`DbError::InsufficientStock`] only appears when
//! a caller asks for it with `OrderOutcome::into_result`.

use bestell_core::{ProductKey, TranslationError, ValidationError};
use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::config::ConfigError;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - Customer number doesn't exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Two customers derived the same order number
    /// - Duplicate customer number on plain insert
    /// - Any UNIQUE index violation
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created or opened
    /// - PostgreSQL server unreachable or credentials rejected
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Canonical query text the active backend cannot run.
    #[error("Query translation failed: {0}")]
    Translation(#[from] TranslationError),

    /// Not enough stock for one order line.
    #[error("Insufficient stock for {product}: {requested} requested")]
    InsufficientStock { product: ProductKey, requested: i64 },

    /// Input rejected before reaching the database.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Invalid database configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

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

    /// True for unique and primary key violations.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Constraint kind, else message analysis
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Io / Tls / Configuration    → DbError::ConnectionFailed
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

                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        field: db_err
                            .constraint()
                            .map(str::to_string)
                            .unwrap_or_else(|| sqlite_constraint_field(msg)),
                        value: "unknown".to_string(),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    },
                    // SQLite: "UNIQUE constraint failed: <table>.<column>"
                    _ if msg.contains("UNIQUE constraint failed") => DbError::UniqueViolation {
                        field: sqlite_constraint_field(msg),
                        value: "unknown".to_string(),
                    },
                    _ if msg.contains("FOREIGN KEY constraint failed") => {
                        DbError::ForeignKeyViolation {
                            message: msg.to_string(),
                        }
                    }
                    _ => DbError::QueryFailed(msg.to_string()),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Configuration(_) => {
                DbError::ConnectionFailed(err.to_string())
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

fn sqlite_constraint_field(msg: &str) -> String {
    msg.split("UNIQUE constraint failed: ")
        .nth(1)
        .unwrap_or("unknown")
        .to_string()
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_pool_errors() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::PoolExhausted));

        let err: DbError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, DbError::ConnectionFailed(_)));
    }

    #[test]
    fn test_sqlite_constraint_field() {
        assert_eq!(
            sqlite_constraint_field("UNIQUE constraint failed: customers.bestellnummer"),
            "customers.bestellnummer"
        );
    }

    #[test]
    fn test_insufficient_stock_message() {
        let err = DbError::InsufficientStock {
            product: ProductKey::new("Mug", "Red", "M"),
            requested: 5,
        };
        assert_eq!(err.to_string(), "Insufficient stock for Mug/Red/M: 5 requested");
    }
}
