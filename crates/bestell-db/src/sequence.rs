//! # Sequence Generator
//!
//! Collision-free, gap-free counters shared by every process using the
//! database.
//!
//! ## Strategies
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Native (PostgreSQL)                                                    │
//! │    first use in this process:  CREATE SEQUENCE IF NOT EXISTS <n>_seq    │
//! │      (inside a transaction: on that transaction's connection)           │
//! │    every call:                 SELECT nextval('<n>_seq')                │
//! │                                                                         │
//! │  Emulated (SQLite)                                                      │
//! │    every call, one statement:                                           │
//! │    INSERT INTO sequences (name, value) VALUES ($1, 1)                   │
//! │    ON CONFLICT (name) DO UPDATE SET value = sequences.value + 1         │
//! │    RETURNING value                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The emulated increment is a single statement, so the database serializes
//! concurrent callers; there is no read-then-write window. A name that was
//! never used starts at 1.

use bestell_core::validation::validate_sequence_name;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::pool::{Database, Tx};

/// Counter behind charge batch numbers.
pub const BATCH_SEQUENCE: &str = "batch_number";

/// Renders a batch number: `CH` and the counter value padded to six digits.
///
/// ## Example
/// ```rust
/// use bestell_db::sequence::format_batch_number;
///
/// assert_eq!(format_batch_number(42), "CH000042");
/// ```
pub fn format_batch_number(value: i64) -> String {
    format!("CH{:06}", value)
}

const EMULATED_NEXT: &str = "\
INSERT INTO sequences (name, value) VALUES ($1, 1) \
ON CONFLICT (name) DO UPDATE SET value = sequences.value + 1 \
RETURNING value";

/// How values are minted. Chosen once per [`Database`] from its driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStrategy {
    Native,
    Emulated,
}

/// Hands out the next value of a named counter.
#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    db: Database,
    strategy: SequenceStrategy,
}

impl SequenceGenerator {
    pub fn new(db: Database) -> Self {
        let strategy = if db.driver().native_sequences() {
            SequenceStrategy::Native
        } else {
            SequenceStrategy::Emulated
        };
        SequenceGenerator { db, strategy }
    }

    pub fn strategy(&self) -> SequenceStrategy {
        self.strategy
    }

    /// Next value of `name`, in its own autocommit statement.
    pub async fn next(&self, name: &str) -> DbResult<i64> {
        validate_sequence_name(name)?;

        let row = match self.strategy {
            SequenceStrategy::Native => {
                self.ensure_native(name).await?;
                self.db.fetch_one(&nextval_sql(name), &[]).await?
            }
            SequenceStrategy::Emulated => self.db.fetch_one(EMULATED_NEXT, &[name.into()]).await?,
        };

        let value = read_value(&row)?;
        debug!(sequence = %name, value, "Sequence advanced");
        Ok(value)
    }

    /// Next value of `name`, inside a caller-owned transaction.
    ///
    /// On the emulated backend the increment rolls back with the
    /// transaction; native sequences never roll back.
    pub async fn next_in(&self, tx: &mut Tx<'_>, name: &str) -> DbResult<i64> {
        validate_sequence_name(name)?;

        let row = match self.strategy {
            SequenceStrategy::Native => {
                self.ensure_native_in(tx, name).await?;
                tx.fetch_one(&nextval_sql(name), &[]).await?
            }
            SequenceStrategy::Emulated => tx.fetch_one(EMULATED_NEXT, &[name.into()]).await?,
        };

        let value = read_value(&row)?;
        debug!(sequence = %name, value, "Sequence advanced in transaction");
        Ok(value)
    }

    /// Creates `<name>_seq` the first time this process uses `name`.
    ///
    /// The set of known names is not locked while the statement runs, so a
    /// waiting pool checkout never blocks other callers.
    async fn ensure_native(&self, name: &str) -> DbResult<()> {
        if self.is_known(name).await {
            return Ok(());
        }

        match self.db.execute(&create_sql(name), &[]).await {
            Ok(_) => {}
            // another process created it between our check and create
            Err(e) if e.is_unique_violation() => {
                debug!(sequence = %name, "Sequence created concurrently");
            }
            Err(e) => return Err(e),
        }

        self.remember(name).await;
        Ok(())
    }

    /// Like [`Self::ensure_native`], on the connection `tx` already holds.
    ///
    /// Runs behind a savepoint so a concurrent create leaves `tx` usable.
    /// The name is not remembered: the sequence disappears again if `tx`
    /// rolls back.
    async fn ensure_native_in(&self, tx: &mut Tx<'_>, name: &str) -> DbResult<()> {
        if self.is_known(name).await {
            return Ok(());
        }

        tx.execute("SAVEPOINT ensure_sequence", &[]).await?;
        match tx.execute(&create_sql(name), &[]).await {
            Ok(_) => {
                tx.execute("RELEASE SAVEPOINT ensure_sequence", &[]).await?;
            }
            Err(e) if e.is_unique_violation() => {
                debug!(sequence = %name, "Sequence created concurrently");
                tx.execute("ROLLBACK TO SAVEPOINT ensure_sequence", &[]).await?;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    async fn is_known(&self, name: &str) -> bool {
        self.db.native_sequences().lock().await.contains(name)
    }

    /// Records that `<name>_seq` exists.
    pub(crate) async fn remember(&self, name: &str) {
        self.db.native_sequences().lock().await.insert(name.to_string());
    }
}

fn create_sql(name: &str) -> String {
    format!("CREATE SEQUENCE IF NOT EXISTS {}_seq", name)
}

// name is validated before it reaches here
fn nextval_sql(name: &str) -> String {
    format!("SELECT nextval('{}_seq') AS value", name)
}

fn read_value(row: &AnyRow) -> DbResult<i64> {
    row.try_get::<i64, _>("value")
        .map_err(|e| DbError::QueryFailed(e.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================
