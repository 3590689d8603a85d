//! # Backend Drivers
//!
//! Everything that differs between SQLite and PostgreSQL lives behind
//! [`Driver`]. [`crate::Database::new`] picks one from the configuration
//! and no other code asks which backend it is talking to.
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────┬──────────────────────┐
//! │                      │ SqliteDriver             │ PostgresDriver       │
//! ├──────────────────────┼──────────────────────────┼──────────────────────┤
//! │ dialect              │ Sqlite                   │ Postgres (canonical) │
//! │ per-connection setup │ busy_timeout, WAL, FKs   │ UTC session zone     │
//! │ sequences            │ emulated (table)         │ native               │
//! │ query text           │ translated               │ as written           │
//! └──────────────────────┴──────────────────────────┴──────────────────────┘
//! ```

use std::fmt;
use std::time::Duration;

use bestell_core::dialect::{Dialect, Translator};
use bestell_core::TranslationError;

use crate::config::{Backend, DbConfig};
use crate::schema;

/// Backend-specific behavior of the data-access core.
pub trait Driver: Send + Sync + fmt::Debug {
    /// SQL dialect the backend speaks.
    fn dialect(&self) -> Dialect;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Statements run on every new pooled connection.
    fn session_statements(&self) -> Vec<String>;

    /// Whether the backend has `CREATE SEQUENCE` / `nextval`.
    fn native_sequences(&self) -> bool;

    /// Query listing the tables of the current database, one `name` column.
    fn list_tables_sql(&self) -> &'static str;

    /// Rewrites canonical (PostgreSQL) query text for this backend.
    fn translate(&self, sql: &str) -> Result<String, TranslationError>;
}

/// Picks the driver for the configured backend.
pub fn for_config(config: &DbConfig) -> Box<dyn Driver> {
    match &config.backend {
        Backend::Sqlite { .. } => Box::new(SqliteDriver::new(config.busy_timeout)),
        Backend::Postgres { .. } => Box::new(PostgresDriver),
    }
}

// =============================================================================
// SQLite
// =============================================================================

/// Embedded SQLite file.
#[derive(Debug)]
pub struct SqliteDriver {
    busy_timeout: Duration,
    translator: Translator,
}

impl SqliteDriver {
    pub fn new(busy_timeout: Duration) -> Self {
        SqliteDriver {
            busy_timeout,
            translator: Translator::new(Dialect::CANONICAL, Dialect::Sqlite)
                .with_conflict_keys(schema::conflict_keys()),
        }
    }
}

impl Driver for SqliteDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn session_statements(&self) -> Vec<String> {
        vec![
            // busy_timeout first: switching to WAL needs a lock
            format!("PRAGMA busy_timeout = {}", self.busy_timeout.as_millis()),
            "PRAGMA journal_mode = WAL".to_string(),
            "PRAGMA foreign_keys = ON".to_string(),
        ]
    }

    fn native_sequences(&self) -> bool {
        false
    }

    fn list_tables_sql(&self) -> &'static str {
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name"
    }

    fn translate(&self, sql: &str) -> Result<String, TranslationError> {
        self.translator.translate(sql)
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

/// PostgreSQL server. Speaks the canonical dialect.
#[derive(Debug)]
pub struct PostgresDriver;

impl Driver for PostgresDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn name(&self) -> &'static str {
        "postgres"
    }

    fn session_statements(&self) -> Vec<String> {
        vec!["SET TIME ZONE 'UTC'".to_string()]
    }

    fn native_sequences(&self) -> bool {
        true
    }

    fn list_tables_sql(&self) -> &'static str {
        "SELECT CAST(table_name AS TEXT) AS name FROM information_schema.tables \
         WHERE table_schema = current_schema() ORDER BY table_name"
    }

    fn translate(&self, sql: &str) -> Result<String, TranslationError> {
        Ok(sql.to_string())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_selection() {
        let sqlite = for_config(&DbConfig::in_memory());
        assert_eq!(sqlite.dialect(), Dialect::Sqlite);
        assert!(!sqlite.native_sequences());

        let postgres = for_config(&DbConfig::postgres("postgres://localhost/bestell"));
        assert_eq!(postgres.dialect(), Dialect::Postgres);
        assert!(postgres.native_sequences());
    }

    #[test]
    fn test_sqlite_session_statements() {
        let driver = SqliteDriver::new(Duration::from_millis(2500));
        let statements = driver.session_statements();
        assert_eq!(statements[0], "PRAGMA busy_timeout = 2500");
        assert!(statements.iter().any(|s| s.contains("journal_mode = WAL")));
        assert!(statements.iter().any(|s| s.contains("foreign_keys = ON")));
    }

    #[test]
    fn test_postgres_translation_is_identity() {
        let sql = "SELECT nextval('batch_number_seq')";
        assert_eq!(PostgresDriver.translate(sql).unwrap(), sql);
        assert!(SqliteDriver::new(Duration::from_secs(1)).translate(sql).is_err());
    }
}
