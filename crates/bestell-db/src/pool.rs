//! # Database Pool Management
//!
//! Connection pool, scoped connections and transactions.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  DbConfig::from_env() ← Backend + pool settings                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await                                           │
//! │  ├── driver::for_config   (once; nothing else branches on backend)     │
//! │  ├── AnyPool + per-connection session statements                       │
//! │  └── schema::initialize   (optional, idempotent)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │              AnyPool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├──► db.execute(..)    autocommit, released right away           │
//! │       ├──► db.acquire()      Conn, released on drop                    │
//! │       └──► db.begin()        Tx, rolled back on drop unless committed  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All query text handed to this module is canonical (PostgreSQL, `$N`
//! markers) and is translated by the driver right before it runs.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use bestell_core::Dialect;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyPool, Connection, Executor};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::DbConfig;
use crate::driver::{self, Driver};
use crate::error::{DbError, DbResult};
use crate::order_number::OrderNumbers;
use crate::query::{self, Value};
use crate::repository::customer::CustomerRepository;
use crate::repository::ledger::InventoryLedger;
use crate::repository::order::OrderRepository;
use crate::schema::{self, SchemaStatus};
use crate::sequence::SequenceGenerator;

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Cheap to clone; clones share the pool. Separate `Database::new` calls
/// on the same file or server behave like separate processes, which is how
/// the tests simulate several order stations.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::from_env()?).await?;
///
/// db.customers().upsert(&customer).await?;
/// let outcome = db.orders().place_order("K-1001", &lines).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: AnyPool,
    driver: Arc<dyn Driver>,
    /// Native sequences known to exist in this process.
    native_sequences: Arc<Mutex<HashSet<String>>>,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Picks the driver for the configured backend
    /// 2. Creates the pool; every new connection runs the driver's session
    ///    statements (SQLite: busy timeout, WAL, foreign keys)
    /// 3. Creates missing tables (if enabled)
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use database handle
    /// * `Err(DbError)` - Connection or schema setup failed
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let driver: Arc<dyn Driver> = Arc::from(driver::for_config(&config));

        info!(
            backend = driver.name(),
            url = %config.backend.redacted(),
            "Initializing database connection"
        );

        sqlx::any::install_default_drivers();

        let session = Arc::new(driver.session_statements());

        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .after_connect(move |conn, _meta| {
                let session = Arc::clone(&session);
                Box::pin(async move {
                    for statement in session.iter() {
                        conn.execute(statement.as_str()).await?;
                    }
                    Ok(())
                })
            })
            .connect(&config.backend.url())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            driver,
            native_sequences: Arc::new(Mutex::new(HashSet::new())),
        };

        if config.initialize_schema {
            db.initialize_schema().await?;
        }

        Ok(db)
    }

    /// Creates missing tables, indexes and sequences.
    ///
    /// ## What This Does
    /// - Runs every statement with `IF NOT EXISTS`
    /// - Idempotent: safe to run multiple times
    ///
    /// ## When To Call
    /// - Automatically called by `new()` if `initialize_schema` is true
    /// - Manually call when initialization is disabled in config
    pub async fn initialize_schema(&self) -> DbResult<()> {
        info!("Initializing schema");
        schema::initialize(self).await?;
        info!("Schema ready");
        Ok(())
    }

    /// Reports which core tables exist.
    pub async fn schema_status(&self) -> DbResult<SchemaStatus> {
        schema::status(self).await
    }

    /// SQL dialect of the active backend.
    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    /// The active driver.
    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Translates canonical query text for the active backend.
    pub fn translate(&self, sql: &str) -> DbResult<String> {
        Ok(self.driver.translate(sql)?)
    }

    /// Returns a reference to the connection pool.
    ///
    /// ## Usage
    /// For advanced queries not covered by repositories. Query text run
    /// here is NOT translated.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub(crate) fn native_sequences(&self) -> &Arc<Mutex<HashSet<String>>> {
        &self.native_sequences
    }

    // -------------------------------------------------------------------------
    // Scoped connections and transactions
    // -------------------------------------------------------------------------

    /// Checks a connection out of the pool.
    pub async fn acquire(&self) -> DbResult<Conn> {
        let conn = self.pool.acquire().await?;
        debug!("Connection acquired");
        Ok(Conn {
            conn,
            driver: Arc::clone(&self.driver),
        })
    }

    /// Begins a transaction on a fresh pooled connection.
    ///
    /// The connection goes back to the pool when the returned [`Tx`] is
    /// committed, rolled back, or dropped (which rolls back).
    pub async fn begin(&self) -> DbResult<Tx<'static>> {
        let inner = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Transaction started");
        Ok(Tx {
            inner,
            driver: Arc::clone(&self.driver),
        })
    }

    // -------------------------------------------------------------------------
    // Auto-managed single statements
    // -------------------------------------------------------------------------

    /// Runs one statement in autocommit mode, returning affected rows.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let sql = self.translate(sql)?;
        query::execute(&self.pool, &sql, params).await
    }

    pub async fn fetch_all(&self, sql: &str, params: &[Value]) -> DbResult<Vec<AnyRow>> {
        let sql = self.translate(sql)?;
        query::fetch_all(&self.pool, &sql, params).await
    }

    pub async fn fetch_optional(&self, sql: &str, params: &[Value]) -> DbResult<Option<AnyRow>> {
        let sql = self.translate(sql)?;
        query::fetch_optional(&self.pool, &sql, params).await
    }

    pub async fn fetch_one(&self, sql: &str, params: &[Value]) -> DbResult<AnyRow> {
        let sql = self.translate(sql)?;
        query::fetch_one(&self.pool, &sql, params).await
    }

    /// Runs backend-native text as is (catalog queries).
    pub(crate) async fn fetch_all_native(&self, sql: &str) -> DbResult<Vec<AnyRow>> {
        query::fetch_all(&self.pool, sql, &[]).await
    }

    // -------------------------------------------------------------------------
    // Repositories
    // -------------------------------------------------------------------------

    /// Returns the customer repository.
    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.clone())
    }

    /// Returns the inventory ledger.
    pub fn ledger(&self) -> InventoryLedger {
        InventoryLedger::new(self.clone())
    }

    /// Returns the order repository.
    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.clone())
    }

    /// Returns the sequence generator for this backend.
    pub fn sequences(&self) -> SequenceGenerator {
        SequenceGenerator::new(self.clone())
    }

    /// Returns the order-number service for `prefix`.
    pub fn order_numbers(&self, prefix: &str) -> OrderNumbers {
        OrderNumbers::new(self.clone(), prefix)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Closes the database connection pool.
    ///
    /// ## Note
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        match self.fetch_one("SELECT 1", &[]).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Health check failed");
                false
            }
        }
    }
}

// =============================================================================
// Conn
// =============================================================================

/// A pooled connection in autocommit mode.
///
/// Returned to the pool on [`Conn::release`] or drop.
pub struct Conn {
    conn: PoolConnection<Any>,
    driver: Arc<dyn Driver>,
}

impl fmt::Debug for Conn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn").field("driver", &self.driver.name()).finish()
    }
}

impl Conn {
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let sql = self.driver.translate(sql)?;
        query::execute(&mut *self.conn, &sql, params).await
    }

    pub async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<AnyRow>> {
        let sql = self.driver.translate(sql)?;
        query::fetch_all(&mut *self.conn, &sql, params).await
    }

    pub async fn fetch_optional(&mut self, sql: &str, params: &[Value]) -> DbResult<Option<AnyRow>> {
        let sql = self.driver.translate(sql)?;
        query::fetch_optional(&mut *self.conn, &sql, params).await
    }

    pub async fn fetch_one(&mut self, sql: &str, params: &[Value]) -> DbResult<AnyRow> {
        let sql = self.driver.translate(sql)?;
        query::fetch_one(&mut *self.conn, &sql, params).await
    }

    /// Begins a transaction on this connection.
    pub async fn begin(&mut self) -> DbResult<Tx<'_>> {
        let inner = Connection::begin(&mut *self.conn)
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(Tx {
            inner,
            driver: Arc::clone(&self.driver),
        })
    }

    /// Returns the connection to the pool.
    pub fn release(self) {
        debug!("Connection released");
    }
}

// =============================================================================
// Tx
// =============================================================================

/// A database transaction.
///
/// Must end in [`Tx::commit`] or [`Tx::rollback`]. Dropping it without
/// either rolls back, so an early `?` return never leaves a transaction
/// open or a connection checked out.
pub struct Tx<'c> {
    inner: sqlx::Transaction<'c, Any>,
    driver: Arc<dyn Driver>,
}

impl fmt::Debug for Tx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx").field("driver", &self.driver.name()).finish()
    }
}

impl<'c> Tx<'c> {
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let sql = self.driver.translate(sql)?;
        query::execute(&mut *self.inner, &sql, params).await
    }

    pub async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<AnyRow>> {
        let sql = self.driver.translate(sql)?;
        query::fetch_all(&mut *self.inner, &sql, params).await
    }

    pub async fn fetch_optional(&mut self, sql: &str, params: &[Value]) -> DbResult<Option<AnyRow>> {
        let sql = self.driver.translate(sql)?;
        query::fetch_optional(&mut *self.inner, &sql, params).await
    }

    pub async fn fetch_one(&mut self, sql: &str, params: &[Value]) -> DbResult<AnyRow> {
        let sql = self.driver.translate(sql)?;
        query::fetch_one(&mut *self.inner, &sql, params).await
    }

    /// SQL dialect of the connection this transaction runs on.
    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    /// Commits the transaction and releases its connection.
    pub async fn commit(self) -> DbResult<()> {
        self.inner
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Transaction committed");
        Ok(())
    }

    /// Rolls the transaction back and releases its connection.
    pub async fn rollback(self) -> DbResult<()> {
        self.inner
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Transaction rolled back");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
