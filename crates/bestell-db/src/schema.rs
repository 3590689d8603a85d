//! # Schema
//!
//! Table definitions, written once in the canonical dialect and translated
//! for the active backend at startup.
//!
//! ## Tables
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  customers          charges                 cup_orders                  │
//! │  ───────────        ─────────────────       ──────────────              │
//! │  kundennummer PK    internal_id PK          id (auto) PK                │
//! │  bestellnummer UQ   batch_number UQ         kundennummer                │
//! │  quadratmeter       product/color/size      product/color/size          │
//! │                     amount CHECK >= 0       quantity CHECK > 0          │
//! │                                                                         │
//! │  SQLite:      sequences (name PK, value)   emulated counters           │
//! │  PostgreSQL:  batch_number_seq             native sequence             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every statement is `IF NOT EXISTS` or `ON CONFLICT DO NOTHING`, so
//! [`initialize`] can run on every start and from several processes at once.

use bestell_core::ConflictKeys;
use serde::Serialize;
use sqlx::Row;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::sequence::BATCH_SEQUENCE;

/// Tables every initialized database has.
pub const CORE_TABLES: &[&str] = &["charges", "cup_orders", "customers"];

const CREATE_CUSTOMERS: &str = "\
CREATE TABLE IF NOT EXISTS customers (
    kundennummer TEXT PRIMARY KEY,
    vorname TEXT NOT NULL DEFAULT '',
    nachname TEXT NOT NULL DEFAULT '',
    bestellnummer TEXT UNIQUE,
    quadratmeter DOUBLE PRECISION NOT NULL DEFAULT 0 CHECK (quadratmeter >= 0),
    dateien BIGINT,
    barcode TEXT
)";

const CREATE_CHARGES: &str = "\
CREATE TABLE IF NOT EXISTS charges (
    internal_id TEXT PRIMARY KEY,
    product_name TEXT NOT NULL,
    supplier_name TEXT,
    color TEXT NOT NULL,
    size TEXT NOT NULL,
    manufacturer TEXT NOT NULL,
    external_id TEXT,
    batch_number TEXT NOT NULL UNIQUE,
    delivery_date TEXT NOT NULL,
    amount BIGINT NOT NULL CHECK (amount >= 0),
    last_updated TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

const CREATE_CUP_ORDERS: &str = "\
CREATE TABLE IF NOT EXISTS cup_orders (
    id BIGSERIAL PRIMARY KEY,
    kundennummer TEXT NOT NULL,
    product_name TEXT NOT NULL,
    quantity BIGINT NOT NULL CHECK (quantity > 0),
    color TEXT NOT NULL,
    size TEXT NOT NULL,
    order_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_charges_product \
     ON charges (product_name, color, size, delivery_date)",
    "CREATE INDEX IF NOT EXISTS idx_cup_orders_product \
     ON cup_orders (product_name, color, size)",
    "CREATE INDEX IF NOT EXISTS idx_cup_orders_customer ON cup_orders (kundennummer)",
];

const CREATE_SEQUENCES_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS sequences (
    name TEXT PRIMARY KEY,
    value BIGINT NOT NULL
)";

/// Unique keys per table, used when the translator has to spell out an
/// upsert target.
pub fn conflict_keys() -> ConflictKeys {
    ConflictKeys::new()
        .with("customers", &["kundennummer"])
        .with("charges", &["internal_id"])
        .with("cup_orders", &["id"])
        .with("sequences", &["name"])
}

/// Canonical statements that build the schema for a backend.
pub fn statements(native_sequences: bool) -> Vec<String> {
    let mut statements = vec![
        CREATE_CUSTOMERS.to_string(),
        CREATE_CHARGES.to_string(),
        CREATE_CUP_ORDERS.to_string(),
    ];
    statements.extend(CREATE_INDEXES.iter().map(|s| s.to_string()));

    if native_sequences {
        statements.push(format!("CREATE SEQUENCE IF NOT EXISTS {}_seq", BATCH_SEQUENCE));
    } else {
        statements.push(CREATE_SEQUENCES_TABLE.to_string());
        statements.push(format!(
            "INSERT INTO sequences (name, value) VALUES ('{}', 0) ON CONFLICT DO NOTHING",
            BATCH_SEQUENCE
        ));
    }

    statements
}

/// Creates whatever is missing. Idempotent.
///
/// Two processes racing on `IF NOT EXISTS` can make PostgreSQL report a
/// duplicate catalog entry; that means the object exists and is ignored.
pub async fn initialize(db: &Database) -> DbResult<()> {
    for statement in statements(db.driver().native_sequences()) {
        debug!(sql = %statement, "Applying schema statement");
        match db.execute(&statement, &[]).await {
            Ok(_) => {}
            Err(e) if e.is_unique_violation() => {
                debug!("Schema object created concurrently");
            }
            Err(e) => return Err(e),
        }
    }

    if db.driver().native_sequences() {
        db.sequences().remember(BATCH_SEQUENCE).await;
    }

    info!(backend = db.driver().name(), "Schema initialized");
    Ok(())
}

/// Which core tables exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaStatus {
    /// Every table of the database, sorted.
    pub tables: Vec<String>,
    /// Core tables not present.
    pub missing: Vec<String>,
}

impl SchemaStatus {
    pub fn is_initialized(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Reads the catalog of the active backend.
pub async fn status(db: &Database) -> DbResult<SchemaStatus> {
    let rows = db.fetch_all_native(db.driver().list_tables_sql()).await?;

    let tables = rows
        .iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DbError::QueryFailed(e.to_string()))?;

    let missing = CORE_TABLES
        .iter()
        .filter(|core| !tables.iter().any(|t| t == *core))
        .map(|core| core.to_string())
        .collect();

    Ok(SchemaStatus { tables, missing })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;
    use bestell_core::dialect::{translate, Dialect};

    #[test]
    fn test_every_statement_translates_to_sqlite() {
        let keys = conflict_keys();
        for statement in statements(false) {
            translate(&statement, Dialect::Postgres, Dialect::Sqlite, &keys).unwrap();
        }
    }

    #[test]
    fn test_cup_order_id_becomes_autoincrement() {
        let sqlite = translate(
            CREATE_CUP_ORDERS,
            Dialect::Postgres,
            Dialect::Sqlite,
            &conflict_keys(),
        )
        .unwrap();
        assert!(sqlite.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
    }

    #[test]
    fn test_native_sequences_skip_the_counter_table() {
        let native = statements(true);
        assert!(native.iter().any(|s| s.contains("CREATE SEQUENCE IF NOT EXISTS batch_number_seq")));
        assert!(!native.iter().any(|s| s.contains("sequences (")));
    }

    #[tokio::test]
    async fn test_initialize_twice() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.initialize_schema().await.unwrap();

        let status = db.schema_status().await.unwrap();
        assert!(status.is_initialized());
        assert!(status.tables.iter().any(|t| t == "sequences"));
    }

    #[tokio::test]
    async fn test_status_of_empty_database() {
        let db = Database::new(DbConfig::in_memory().initialize_schema(false))
            .await
            .unwrap();

        let status = db.schema_status().await.unwrap();
        assert!(!status.is_initialized());
        assert_eq!(status.missing, vec!["charges", "cup_orders", "customers"]);
    }
}
