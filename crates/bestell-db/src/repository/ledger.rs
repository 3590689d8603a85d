//! # Inventory Ledger
//!
//! Stock per lot ("Charge"). Amounts only go down, and never below zero.
//!
//! ## Conditional Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  decrement_if_available(tx, Mug/Red/M, 3)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE charges SET amount = amount - 3                                │
//! │  WHERE internal_id = (oldest lot of Mug/Red/M with amount >= 3)         │
//! │    AND amount >= 3                                                      │
//! │  RETURNING internal_id, amount                                          │
//! │       │                                                                 │
//! │       ├── row returned  → Applied { internal_id, new_amount }           │
//! │       └── no row        → InsufficientStock                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Check and write are one statement, so two stations can never both take
//! the last units. The returned row is the only thing trusted; stock is
//! never read first and compared in application code.
//!
//! A line is served from a single lot (oldest delivery first). If stock is
//! split across lots so that none holds the full quantity, the line counts
//! as insufficient.

use bestell_core::validation::{validate_new_charge, validate_product_key, validate_quantity};
use bestell_core::{parse_db_timestamp, Charge, NewCharge, ProductKey, StockLevel};
use serde::Serialize;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use crate::pool::{Database, Tx};
use crate::sequence::{format_batch_number, BATCH_SEQUENCE};

const DECREMENT: &str = "\
UPDATE charges SET amount = amount - $1, last_updated = CURRENT_TIMESTAMP
WHERE internal_id = (
    SELECT internal_id FROM charges
    WHERE product_name = $2 AND color = $3 AND size = $4 AND amount >= $1
    ORDER BY delivery_date, internal_id
    LIMIT 1
) AND amount >= $1
RETURNING internal_id, amount";

const INSERT_CHARGE: &str = "\
INSERT INTO charges (
    internal_id, product_name, supplier_name, color, size, manufacturer,
    external_id, batch_number, delivery_date, amount
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)";

const CHARGE_COLUMNS: &str = "\
internal_id, product_name, supplier_name, color, size, manufacturer, external_id,
batch_number, delivery_date, amount, CAST(last_updated AS TEXT) AS last_updated";

const AVAILABLE: &str = "\
SELECT product_name, color, size, CAST(SUM(amount) AS BIGINT) AS amount
FROM charges
GROUP BY product_name, color, size
HAVING SUM(amount) > 0
ORDER BY product_name, color, size";

const STOCK_LEVEL: &str = "\
SELECT CAST(COALESCE(SUM(amount), 0) AS BIGINT) AS amount
FROM charges
WHERE product_name = $1 AND color = $2 AND size = $3";

/// Result of a conditional decrement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Decrement {
    /// Stock was taken from this lot.
    Applied { internal_id: String, new_amount: i64 },
    /// No lot holds enough; nothing changed.
    InsufficientStock,
}

impl Decrement {
    pub fn is_applied(&self) -> bool {
        matches!(self, Decrement::Applied { .. })
    }
}

/// Repository for inventory lots.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    db: Database,
}

impl InventoryLedger {
    pub fn new(db: Database) -> Self {
        InventoryLedger { db }
    }

    /// Takes `quantity` units of `key` inside the caller's transaction.
    ///
    /// ## Returns
    /// * `Ok(Decrement::Applied)` - One lot now holds `new_amount`
    /// * `Ok(Decrement::InsufficientStock)` - Nothing was written
    /// * `Err(DbError)` - Validation or I/O failure
    pub async fn decrement_if_available(
        &self,
        tx: &mut Tx<'_>,
        key: &ProductKey,
        quantity: i64,
    ) -> DbResult<Decrement> {
        validate_product_key(key)?;
        validate_quantity(quantity)?;

        let row = tx.fetch_optional(DECREMENT, &decrement_params(key, quantity)).await?;
        decrement_result(key, quantity, row)
    }

    /// Same as [`InventoryLedger::decrement_if_available`] as a single
    /// autocommit statement.
    pub async fn decrement_now(&self, key: &ProductKey, quantity: i64) -> DbResult<Decrement> {
        validate_product_key(key)?;
        validate_quantity(quantity)?;

        let row = self
            .db
            .fetch_optional(DECREMENT, &decrement_params(key, quantity))
            .await?;
        decrement_result(key, quantity, row)
    }

    /// Registers a delivered lot under a freshly minted batch number.
    ///
    /// The sequence step and the insert share one transaction; on the
    /// emulated sequence a failed insert gives the number back.
    pub async fn register(&self, charge: &NewCharge) -> DbResult<Charge> {
        validate_new_charge(charge)?;

        let sequences = self.db.sequences();
        let mut tx = self.db.begin().await?;

        let batch_number = format_batch_number(sequences.next_in(&mut tx, BATCH_SEQUENCE).await?);
        let internal_id = Uuid::new_v4().to_string();

        tx.execute(
            INSERT_CHARGE,
            &[
                (&internal_id).into(),
                (&charge.product_name).into(),
                charge.supplier_name.clone().into(),
                (&charge.color).into(),
                (&charge.size).into(),
                (&charge.manufacturer).into(),
                charge.external_id.clone().into(),
                (&batch_number).into(),
                (&charge.delivery_date).into(),
                charge.amount.into(),
            ],
        )
        .await?;

        let row = tx
            .fetch_one(
                &format!("SELECT {} FROM charges WHERE internal_id = $1", CHARGE_COLUMNS),
                &[(&internal_id).into()],
            )
            .await?;
        let stored = charge_from_row(&row)?;

        tx.commit().await?;

        info!(
            batch_number = %stored.batch_number,
            product = %stored.key(),
            amount = stored.amount,
            "Lot registered"
        );
        Ok(stored)
    }

    /// Gets a lot by internal ID.
    pub async fn get(&self, internal_id: &str) -> DbResult<Option<Charge>> {
        let sql = format!("SELECT {} FROM charges WHERE internal_id = $1", CHARGE_COLUMNS);
        let row = self.db.fetch_optional(&sql, &[internal_id.into()]).await?;
        row.as_ref().map(charge_from_row).transpose()
    }

    /// Gets a lot by its batch number.
    pub async fn get_by_batch_number(&self, batch_number: &str) -> DbResult<Option<Charge>> {
        let sql = format!("SELECT {} FROM charges WHERE batch_number = $1", CHARGE_COLUMNS);
        let row = self.db.fetch_optional(&sql, &[batch_number.into()]).await?;
        row.as_ref().map(charge_from_row).transpose()
    }

    /// Every product key with stock, summed across lots.
    ///
    /// For display only. Writes never check this first.
    pub async fn available(&self) -> DbResult<Vec<StockLevel>> {
        let rows = self.db.fetch_all(AVAILABLE, &[]).await?;

        rows.iter()
            .map(|row| -> DbResult<StockLevel> {
                Ok(StockLevel {
                    key: ProductKey::new(
                        row.try_get::<String, _>("product_name")?,
                        row.try_get::<String, _>("color")?,
                        row.try_get::<String, _>("size")?,
                    ),
                    amount: row.try_get("amount")?,
                })
            })
            .collect()
    }

    /// Total stock of one key across its lots.
    pub async fn stock_level(&self, key: &ProductKey) -> DbResult<i64> {
        let row = self
            .db
            .fetch_one(
                STOCK_LEVEL,
                &[
                    (&key.product_name).into(),
                    (&key.color).into(),
                    (&key.size).into(),
                ],
            )
            .await?;
        Ok(row.try_get("amount")?)
    }
}

fn decrement_params(key: &ProductKey, quantity: i64) -> [crate::query::Value; 4] {
    [
        quantity.into(),
        (&key.product_name).into(),
        (&key.color).into(),
        (&key.size).into(),
    ]
}

fn decrement_result(key: &ProductKey, quantity: i64, row: Option<AnyRow>) -> DbResult<Decrement> {
    match row {
        Some(row) => {
            let internal_id: String = row.try_get("internal_id")?;
            let new_amount: i64 = row.try_get("amount")?;
            debug!(product = %key, quantity, lot = %internal_id, new_amount, "Stock decremented");
            Ok(Decrement::Applied {
                internal_id,
                new_amount,
            })
        }
        None => {
            debug!(product = %key, quantity, "Insufficient stock");
            Ok(Decrement::InsufficientStock)
        }
    }
}

fn charge_from_row(row: &AnyRow) -> DbResult<Charge> {
    let last_updated: Option<String> = row.try_get("last_updated")?;

    Ok(Charge {
        internal_id: row.try_get("internal_id")?,
        product_name: row.try_get("product_name")?,
        supplier_name: row.try_get("supplier_name")?,
        color: row.try_get("color")?,
        size: row.try_get("size")?,
        manufacturer: row.try_get("manufacturer")?,
        external_id: row.try_get("external_id")?,
        batch_number: row.try_get("batch_number")?,
        delivery_date: row.try_get("delivery_date")?,
        amount: row.try_get("amount")?,
        last_updated: last_updated.as_deref().and_then(parse_db_timestamp),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;
    use crate::error::DbError;

    fn mug_lot(color: &str, delivery_date: &str, amount: i64) -> NewCharge {
        NewCharge {
            product_name: "Mug".to_string(),
            supplier_name: Some("Tassen GmbH".to_string()),
            color: color.to_string(),
            size: "M".to_string(),
            manufacturer: "Kahla".to_string(),
            external_id: None,
            delivery_date: delivery_date.to_string(),
            amount,
        }
    }

    #[tokio::test]
    async fn test_register_mints_batch_numbers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.ledger();

        let first = ledger.register(&mug_lot("Red", "2026-01-10", 10)).await.unwrap();
        let second = ledger.register(&mug_lot("Blue", "2026-01-11", 5)).await.unwrap();

        assert_eq!(first.batch_number, "CH000001");
        assert_eq!(second.batch_number, "CH000002");
        assert_eq!(first.amount, 10);
        assert!(first.last_updated.is_some());

        let found = ledger.get_by_batch_number("CH000002").await.unwrap().unwrap();
        assert_eq!(found, second);
        assert_eq!(ledger.get(&first.internal_id).await.unwrap().unwrap(), first);
        assert!(ledger.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_rejects_negative_amount() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .ledger()
            .register(&mug_lot("Red", "2026-01-10", -1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_decrement_takes_oldest_lot_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.ledger();
        let newer = ledger.register(&mug_lot("Red", "2026-02-01", 10)).await.unwrap();
        let older = ledger.register(&mug_lot("Red", "2026-01-01", 10)).await.unwrap();

        let key = ProductKey::new("Mug", "Red", "M");
        let result = ledger.decrement_now(&key, 4).await.unwrap();
        assert_eq!(
            result,
            Decrement::Applied {
                internal_id: older.internal_id.clone(),
                new_amount: 6
            }
        );

        // older lot can't serve 7 any more
        let result = ledger.decrement_now(&key, 7).await.unwrap();
        assert_eq!(
            result,
            Decrement::Applied {
                internal_id: newer.internal_id,
                new_amount: 3
            }
        );
        assert_eq!(ledger.stock_level(&key).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_decrement_exact_amount_reaches_zero() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.ledger();
        ledger.register(&mug_lot("Red", "2026-01-01", 5)).await.unwrap();

        let key = ProductKey::new("Mug", "Red", "M");
        let result = ledger.decrement_now(&key, 5).await.unwrap();
        assert!(matches!(result, Decrement::Applied { new_amount: 0, .. }));
        assert_eq!(
            ledger.decrement_now(&key, 1).await.unwrap(),
            Decrement::InsufficientStock
        );
    }

    #[tokio::test]
    async fn test_split_stock_is_insufficient() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.ledger();
        ledger.register(&mug_lot("Red", "2026-01-01", 3)).await.unwrap();
        ledger.register(&mug_lot("Red", "2026-01-02", 3)).await.unwrap();

        let key = ProductKey::new("Mug", "Red", "M");
        assert_eq!(ledger.stock_level(&key).await.unwrap(), 6);
        assert_eq!(
            ledger.decrement_now(&key, 5).await.unwrap(),
            Decrement::InsufficientStock
        );
        assert_eq!(ledger.stock_level(&key).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_unknown_key_is_insufficient() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let key = ProductKey::new("Plate", "White", "L");

        assert_eq!(
            db.ledger().decrement_now(&key, 1).await.unwrap(),
            Decrement::InsufficientStock
        );
        assert_eq!(db.ledger().stock_level(&key).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let key = ProductKey::new("Mug", "Red", "M");

        let err = db.ledger().decrement_now(&key, 0).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_available_sums_lots_and_hides_empty_keys() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.ledger();
        ledger.register(&mug_lot("Red", "2026-01-01", 3)).await.unwrap();
        ledger.register(&mug_lot("Red", "2026-01-02", 4)).await.unwrap();
        ledger.register(&mug_lot("Blue", "2026-01-02", 2)).await.unwrap();
        ledger.register(&mug_lot("Green", "2026-01-02", 0)).await.unwrap();

        let levels = ledger.available().await.unwrap();
        assert_eq!(
            levels,
            vec![
                StockLevel {
                    key: ProductKey::new("Mug", "Blue", "M"),
                    amount: 2
                },
                StockLevel {
                    key: ProductKey::new("Mug", "Red", "M"),
                    amount: 7
                },
            ]
        );
    }
}
