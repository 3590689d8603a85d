//! # Order Number Service
//!
//! Derives the next `PREFIX-<year><n>` order number from how many customers
//! already hold one for that year.
//!
//! ## Known Race
//! ```text
//!   station A: COUNT → 6          station B: COUNT → 6
//!   station A: PRFX-2026007       station B: PRFX-2026007
//!   station A: save ✓             station B: save ✗ UniqueViolation
//! ```
//! The count is not reserved. The `UNIQUE` constraint on
//! `customers.bestellnummer` turns a collision into an error on the second
//! save, and the caller asks for a fresh number.

use bestell_core::order_number::{format_order_number, year_pattern};
use bestell_core::validation::{validate_customer_id, validate_order_prefix};
use chrono::{Datelike, Utc};
use sqlx::Row;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::pool::Database;

const COUNT_FOR_YEAR: &str = "\
SELECT COUNT(*) AS n FROM customers WHERE bestellnummer ILIKE $1";

const ASSIGN: &str = "\
UPDATE customers SET bestellnummer = $1 WHERE kundennummer = $2";

/// Order numbers for one prefix.
#[derive(Debug, Clone)]
pub struct OrderNumbers {
    db: Database,
    prefix: String,
}

impl OrderNumbers {
    pub fn new(db: Database, prefix: impl Into<String>) -> Self {
        OrderNumbers {
            db,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Next number for `year`. Not reserved; see the module docs.
    pub async fn next_for_year(&self, year: i32) -> DbResult<String> {
        let pattern = year_pattern(&self.prefix, year)?;

        let row = self.db.fetch_one(COUNT_FOR_YEAR, &[pattern.into()]).await?;
        let count: i64 = row
            .try_get("n")
            .map_err(|e| DbError::QueryFailed(e.to_string()))?;

        let number = format_order_number(&self.prefix, year, count)?;
        debug!(prefix = %self.prefix, year, count, number = %number, "Derived order number");
        Ok(number)
    }

    /// Next number for the current (UTC) year.
    pub async fn next(&self) -> DbResult<String> {
        self.next_for_year(Utc::now().year()).await
    }

    /// Derives a number and stores it on the customer.
    ///
    /// ## Returns
    /// * `Ok(number)` - Stored on the customer
    /// * `Err(DbError::UniqueViolation)` - Another station saved the same
    ///   number first
    /// * `Err(DbError::NotFound)` - No such customer
    pub async fn assign(&self, customer_id: &str) -> DbResult<String> {
        validate_customer_id(customer_id)?;
        validate_order_prefix(&self.prefix)?;

        let number = self.next().await?;
        self.store(customer_id, &number).await?;
        Ok(number)
    }

    /// Stores an already derived number on the customer.
    pub async fn store(&self, customer_id: &str, number: &str) -> DbResult<()> {
        let affected = self
            .db
            .execute(ASSIGN, &[number.into(), customer_id.into()])
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation { field, .. } => DbError::duplicate(field, number),
                other => other,
            })?;

        if affected == 0 {
            return Err(DbError::not_found("Customer", customer_id));
        }

        debug!(customer = %customer_id, number = %number, "Order number stored");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
