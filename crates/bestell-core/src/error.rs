//! # Error Types
//!
//! Domain-specific error types for bestell-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bestell-core errors (this file)                                       │
//! │  ├── ValidationError   - Input validation failures                     │
//! │  └── TranslationError  - Query text the target dialect cannot express  │
//! │                                                                         │
//! │  bestell-db errors (separate crate)                                    │
//! │  └── DbError           - Database operation failures (wraps both)      │
//! │                                                                         │
//! │  Flow: ValidationError / TranslationError → DbError → order form       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (field, offending SQL fragment)
//! 3. Errors are enum variants, never String

use thiserror::Error;

use crate::dialect::Dialect;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any statement reaches the database.
#[derive(Debug, Clone, PartialEq, Error)]
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

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., sequence name with spaces).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Translation Error
// =============================================================================

/// A query the translator cannot express in the target dialect.
///
/// ## When This Occurs
/// Only for query shapes no caller should be sending. Every shape used by
/// the data-access core is covered by tests, so seeing this at runtime
/// means new query text was added without a translator test.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    /// A construct with no equivalent in the target dialect.
    #[error("{construct} cannot be expressed in {target}")]
    Unsupported {
        construct: String,
        target: Dialect,
    },

    /// An upsert needs a conflict target for a table the key registry
    /// doesn't know.
    #[error("no conflict key registered for table '{table}'")]
    UnknownConflictKey { table: String },

    /// Statement structure the translator could not follow.
    #[error("malformed query near byte {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
}

impl TranslationError {
    /// Creates an Unsupported error for a construct and target dialect.
    pub fn unsupported(construct: impl Into<String>, target: Dialect) -> Self {
        TranslationError::Unsupported {
            construct: construct.into(),
            target,
        }
    }

    /// Creates a Malformed error at a byte offset.
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        TranslationError::Malformed {
            offset,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
