//! # bestell-db: Data-Access Core for Bestell
//!
//! Runs one canonical query text against SQLite or PostgreSQL, mints
//! sequential identifiers, and places orders as all-or-nothing inventory
//! transactions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bestell Data Flow                                │
//! │                                                                         │
//! │  Order form (place order, save customer)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    bestell-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │   Schema     │  │   │
//! │  │   │   (pool.rs)   │    │               │    │              │  │   │
//! │  │   │ AnyPool       │◄───│ Customers     │    │ customers    │  │   │
//! │  │   │ Conn / Tx     │    │ Ledger        │    │ charges      │  │   │
//! │  │   │ Driver        │    │ Orders        │    │ cup_orders   │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                       │                         │
//! │       ▼                                       ▼                         │
//! │  ┌──────────────────────┐            ┌──────────────────────┐          │
//! │  │  SQLite (kunden.db)  │     or     │  PostgreSQL server   │          │
//! │  └──────────────────────┘            └──────────────────────┘          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Backend selection and pool settings
//! - [`driver`] - Per-backend behavior behind one trait
//! - [`pool`] - Database handle, scoped connections, transactions
//! - [`query`] - Bound parameters and statement execution
//! - [`schema`] - Table definitions and idempotent initialization
//! - [`sequence`] - Sequence generator (native or emulated)
//! - [`order_number`] - `PRFX-<year><n>` derivation
//! - [`repository`] - Customers, inventory ledger, orders
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bestell_db::{Database, DbConfig};
//! use bestell_core::{LineItem, ProductKey};
//!
//! let db = Database::new(DbConfig::from_env()?).await?;
//!
//! let lines = [LineItem::new(ProductKey::new("Mug", "Red", "M"), 2)];
//! match db.orders().place_order("K-1001", &lines).await? {
//!     OrderOutcome::Committed(orders) => println!("{} lines stored", orders.len()),
//!     OrderOutcome::RolledBack { key, .. } => println!("{} is short", key),
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod driver;
pub mod error;
pub mod order_number;
pub mod pool;
pub mod query;
pub mod repository;
pub mod schema;
pub mod sequence;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{Backend, ConfigError, DbConfig};
pub use driver::Driver;
pub use error::{DbError, DbResult};
pub use order_number::OrderNumbers;
pub use pool::{Conn, Database, Tx};
pub use query::Value;
pub use schema::SchemaStatus;
pub use sequence::{SequenceGenerator, SequenceStrategy};

// Repository re-exports for convenience
pub use repository::customer::CustomerRepository;
pub use repository::ledger::{Decrement, InventoryLedger};
pub use repository::order::{OrderOutcome, OrderPhase, OrderRepository};
