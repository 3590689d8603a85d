//! # Order Repository
//!
//! Places multi-line orders as one all-or-nothing transaction.
//!
//! ## Placement Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  place_order("K-1001", [Mug/Red/M x2, Mug/Blue/S x1])                  │
//! │       │                                                                 │
//! │       ▼  Started          validate, BEGIN                               │
//! │       ▼  Decrementing     line 1: decrement_if_available ✓              │
//! │       │                   line 2: decrement_if_available ✗ ──┐          │
//! │       ▼  AllDecremented                                      │          │
//! │       ▼  OrderInserted    one cup_orders row per line        │          │
//! │       ▼  Committed        COMMIT                             ▼          │
//! │                                                     RolledBack          │
//! │                                                     ROLLBACK, no rows   │
//! │                                                     written, stock as   │
//! │                                                     before              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An I/O error at any step drops the transaction, which rolls it back, and
//! is returned as `Err`. Running out of stock is `Ok(RolledBack)`.

use std::fmt;

use bestell_core::validation::{validate_customer_id, validate_line_items, validate_product_key};
use bestell_core::{parse_db_timestamp, CupOrder, LineItem, ProductKey};
use serde::Serialize;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::ledger::Decrement;

const ORDER_COLUMNS: &str = "\
id, kundennummer, product_name, quantity, color, size, CAST(order_date AS TEXT) AS order_date";

const INSERT_ORDER: &str = "\
INSERT INTO cup_orders (kundennummer, product_name, quantity, color, size)
VALUES ($1, $2, $3, $4, $5)
RETURNING id, kundennummer, product_name, quantity, color, size, \
CAST(order_date AS TEXT) AS order_date";

/// Where a placement is. Logged at every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPhase {
    Started,
    Decrementing,
    AllDecremented,
    OrderInserted,
    Committed,
    RolledBack,
}

impl fmt::Display for OrderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderPhase::Started => "started",
            OrderPhase::Decrementing => "decrementing",
            OrderPhase::AllDecremented => "all_decremented",
            OrderPhase::OrderInserted => "order_inserted",
            OrderPhase::Committed => "committed",
            OrderPhase::RolledBack => "rolled_back",
        };
        f.write_str(name)
    }
}

/// How a placement ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum OrderOutcome {
    /// Every line was decremented and recorded.
    Committed(Vec<CupOrder>),
    /// Line `line` (0-based) had too little stock. Nothing was written.
    RolledBack {
        line: usize,
        key: ProductKey,
        requested: i64,
    },
}

impl OrderOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, OrderOutcome::Committed(_))
    }

    /// Turns a rollback into [`DbError::InsufficientStock`].
    pub fn into_result(self) -> DbResult<Vec<CupOrder>> {
        match self {
            OrderOutcome::Committed(orders) => Ok(orders),
            OrderOutcome::RolledBack { key, requested, .. } => Err(DbError::InsufficientStock {
                product: key,
                requested,
            }),
        }
    }
}

/// Repository for order lines.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    db: Database,
}

impl OrderRepository {
    pub fn new(db: Database) -> Self {
        OrderRepository { db }
    }

    /// Places an order for `customer_id`.
    ///
    /// ## How It Works
    /// 1. Validates the customer number and every line
    /// 2. Opens one transaction
    /// 3. Decrements each line in order; the first short line rolls back
    /// 4. Inserts one `cup_orders` row per line
    /// 5. Commits
    ///
    /// ## Returns
    /// * `Ok(OrderOutcome::Committed)` - Stored order lines, in input order
    /// * `Ok(OrderOutcome::RolledBack)` - Not enough stock, nothing changed
    /// * `Err(DbError)` - Invalid input or I/O failure, nothing changed
    pub async fn place_order(&self, customer_id: &str, lines: &[LineItem]) -> DbResult<OrderOutcome> {
        validate_customer_id(customer_id)?;
        validate_line_items(lines)?;

        let ledger = self.db.ledger();
        let mut tx = self.db.begin().await?;
        phase(customer_id, OrderPhase::Started);

        phase(customer_id, OrderPhase::Decrementing);
        for (index, line) in lines.iter().enumerate() {
            let result = ledger
                .decrement_if_available(&mut tx, &line.key, line.quantity)
                .await?;

            if let Decrement::InsufficientStock = result {
                tx.rollback().await?;
                phase(customer_id, OrderPhase::RolledBack);
                info!(
                    customer = %customer_id,
                    line = index,
                    product = %line.key,
                    requested = line.quantity,
                    "Order rolled back: insufficient stock"
                );
                return Ok(OrderOutcome::RolledBack {
                    line: index,
                    key: line.key.clone(),
                    requested: line.quantity,
                });
            }
        }
        phase(customer_id, OrderPhase::AllDecremented);

        let mut orders = Vec::with_capacity(lines.len());
        for line in lines {
            let row = tx
                .fetch_one(
                    INSERT_ORDER,
                    &[
                        customer_id.into(),
                        (&line.key.product_name).into(),
                        line.quantity.into(),
                        (&line.key.color).into(),
                        (&line.key.size).into(),
                    ],
                )
                .await?;
            orders.push(order_from_row(&row)?);
        }
        phase(customer_id, OrderPhase::OrderInserted);

        tx.commit().await?;
        phase(customer_id, OrderPhase::Committed);

        info!(customer = %customer_id, lines = orders.len(), "Order placed");
        Ok(OrderOutcome::Committed(orders))
    }

    /// Order history of one product, newest first.
    pub async fn history(&self, key: &ProductKey) -> DbResult<Vec<CupOrder>> {
        validate_product_key(key)?;

        let sql = format!(
            "SELECT {} FROM cup_orders \
             WHERE product_name = $1 AND color = $2 AND size = $3 \
             ORDER BY order_date DESC, id DESC",
            ORDER_COLUMNS
        );
        let rows = self
            .db
            .fetch_all(
                &sql,
                &[
                    (&key.product_name).into(),
                    (&key.color).into(),
                    (&key.size).into(),
                ],
            )
            .await?;

        rows.iter().map(order_from_row).collect()
    }

    /// Every order line of a customer, oldest first.
    pub async fn for_customer(&self, customer_id: &str) -> DbResult<Vec<CupOrder>> {
        validate_customer_id(customer_id)?;

        let sql = format!(
            "SELECT {} FROM cup_orders WHERE kundennummer = $1 ORDER BY id",
            ORDER_COLUMNS
        );
        let rows = self.db.fetch_all(&sql, &[customer_id.into()]).await?;

        rows.iter().map(order_from_row).collect()
    }
}

fn phase(customer_id: &str, phase: OrderPhase) {
    debug!(customer = %customer_id, phase = %phase, "Order placement");
}

fn order_from_row(row: &AnyRow) -> DbResult<CupOrder> {
    let order_date: Option<String> = row.try_get("order_date")?;

    Ok(CupOrder {
        id: row.try_get("id")?,
        kundennummer: row.try_get("kundennummer")?,
        product_name: row.try_get("product_name")?,
        quantity: row.try_get("quantity")?,
        color: row.try_get("color")?,
        size: row.try_get("size")?,
        order_date: order_date.as_deref().and_then(parse_db_timestamp),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;
    use bestell_core::NewCharge;

    async fn stocked_db(lots: &[(&str, i64)]) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for (color, amount) in lots {
            db.ledger()
                .register(&NewCharge {
                    product_name: "Mug".to_string(),
                    supplier_name: None,
                    color: color.to_string(),
                    size: "M".to_string(),
                    manufacturer: "Kahla".to_string(),
                    external_id: None,
                    delivery_date: "2026-01-01".to_string(),
                    amount: *amount,
                })
                .await
                .unwrap();
        }
        db
    }

    fn mug(color: &str, quantity: i64) -> LineItem {
        LineItem::new(ProductKey::new("Mug", color, "M"), quantity)
    }

    #[tokio::test]
    async fn test_committed_order_records_every_line() {
        let db = stocked_db(&[("Red", 5), ("Blue", 5)]).await;

        let outcome = db
            .orders()
            .place_order("K1", &[mug("Red", 2), mug("Blue", 1)])
            .await
            .unwrap();

        let orders = outcome.into_result().unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].key(), ProductKey::new("Mug", "Red", "M"));
        assert_eq!(orders[0].quantity, 2);
        assert!(orders[0].order_date.is_some());
        assert_eq!(orders[1].quantity, 1);

        assert_eq!(db.orders().for_customer("K1").await.unwrap(), orders);
    }

    #[tokio::test]
    async fn test_short_line_rolls_back_everything() {
        let db = stocked_db(&[("Red", 5), ("Blue", 1)]).await;

        let outcome = db
            .orders()
            .place_order("K1", &[mug("Red", 2), mug("Blue", 3)])
            .await
            .unwrap();

        assert_eq!(
            outcome,
            OrderOutcome::RolledBack {
                line: 1,
                key: ProductKey::new("Mug", "Blue", "M"),
                requested: 3,
            }
        );

        let ledger = db.ledger();
        assert_eq!(ledger.stock_level(&ProductKey::new("Mug", "Red", "M")).await.unwrap(), 5);
        assert!(db.orders().for_customer("K1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rollback_maps_to_insufficient_stock() {
        let db = stocked_db(&[]).await;

        let err = db
            .orders()
            .place_order("K1", &[mug("Red", 1)])
            .await
            .unwrap()
            .into_result()
            .unwrap_err();

        assert!(matches!(err, DbError::InsufficientStock { requested: 1, .. }));
    }

    #[tokio::test]
    async fn test_invalid_input_touches_nothing() {
        let db = stocked_db(&[("Red", 5)]).await;
        let orders = db.orders();

        assert!(matches!(
            orders.place_order("K1", &[]).await,
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            orders.place_order("K1", &[mug("Red", 1), mug("Red", 0)]).await,
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            orders.place_order("", &[mug("Red", 1)]).await,
            Err(DbError::Validation(_))
        ));

        let key = ProductKey::new("Mug", "Red", "M");
        assert_eq!(db.ledger().stock_level(&key).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let db = stocked_db(&[("Red", 10)]).await;
        let orders = db.orders();

        orders.place_order("K1", &[mug("Red", 1)]).await.unwrap();
        orders.place_order("K2", &[mug("Red", 2)]).await.unwrap();
        orders.place_order("K3", &[mug("Red", 3)]).await.unwrap();

        let history = orders.history(&ProductKey::new("Mug", "Red", "M")).await.unwrap();
        let quantities: Vec<i64> = history.iter().map(|o| o.quantity).collect();
        assert_eq!(quantities, vec![3, 2, 1]);
    }
}
