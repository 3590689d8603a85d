//! # bestell-core: Pure Logic for the Bestell Order Core
//!
//! Everything the data-access layer needs that does not touch a database:
//! entity types, input rules, order-number text, print-area arithmetic, and
//! the SQL dialect translator.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Bestell Order Core                                  │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Order form / customer form (external)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  bestell-db (data-access core)                  │   │
//! │  │   Database ─ SequenceGenerator ─ InventoryLedger ─ Orders       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ bestell-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌───────────┐ ┌──────────────┐ ┌──────────┐     │   │
//! │  │   │  types   │ │ validation│ │ order_number │ │ dialect  │     │   │
//! │  │   │ Customer │ │   rules   │ │  PRFX-2026n  │ │ PG ⇄ SQL │     │   │
//! │  │   │  Charge  │ │           │ │              │ │   ite    │     │   │
//! │  │   └──────────┘ └───────────┘ └──────────────┘ └──────────┘     │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Customer, Charge, CupOrder, ProductKey)
//! - [`dialect`] - Query translation between PostgreSQL and SQLite
//! - [`validation`] - Input rules checked before any statement runs
//! - [`order_number`] - `PREFIX-<year><n>` formatting
//! - [`area`] - Square metres from print file dimensions
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use bestell_core::dialect::{Dialect, Translator};
//!
//! let sqlite = Translator::new(Dialect::Postgres, Dialect::Sqlite);
//! assert_eq!(
//!     sqlite.translate("UPDATE charges SET last_updated = NOW() WHERE internal_id = $1").unwrap(),
//!     "UPDATE charges SET last_updated = datetime('now') WHERE internal_id = ?"
//! );
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod area;
pub mod dialect;
pub mod error;
pub mod order_number;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use dialect::{ConflictKeys, Dialect, Translator};
pub use error::{TranslationError, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items in a single order placement.
pub const MAX_LINE_ITEMS: usize = 100;

/// Maximum quantity of one order line.
///
/// ## Business Reason
/// Catches typos on the order form (10000 instead of 100) before they drain
/// a lot.
pub const MAX_LINE_QUANTITY: i64 = 9999;
