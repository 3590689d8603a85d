//! # Customer Repository
//!
//! Customers as captured by the order form: saved by upsert on the customer
//! number, never deleted.

use bestell_core::area::{total_square_meters, PrintFile};
use bestell_core::validation::{validate_customer, validate_customer_id};
use bestell_core::Customer;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::pool::Database;

const UPSERT: &str = "\
INSERT INTO customers (
    kundennummer, vorname, nachname, bestellnummer, quadratmeter, dateien, barcode
) VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (kundennummer) DO UPDATE SET
    vorname = EXCLUDED.vorname,
    nachname = EXCLUDED.nachname,
    bestellnummer = EXCLUDED.bestellnummer,
    quadratmeter = EXCLUDED.quadratmeter,
    dateien = EXCLUDED.dateien,
    barcode = EXCLUDED.barcode";

const SELECT_BY_ID: &str = "\
SELECT kundennummer, vorname, nachname, bestellnummer, quadratmeter, dateien, barcode
FROM customers
WHERE kundennummer = $1";

const UPDATE_AREA: &str = "\
UPDATE customers SET quadratmeter = $1, dateien = $2 WHERE kundennummer = $3";

/// Repository for customer records.
///
/// ## Usage
/// ```rust,ignore
/// let customers = db.customers();
///
/// customers.upsert(&Customer::new("K-1001", "Ada", "Lovelace")).await?;
/// let area = customers.record_area("K-1001", &files).await?;
/// ```
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    db: Database,
}

impl CustomerRepository {
    pub fn new(db: Database) -> Self {
        CustomerRepository { db }
    }

    /// Inserts the customer or overwrites every field of an existing one.
    ///
    /// ## Errors
    /// `UniqueViolation` when `bestellnummer` is already held by another
    /// customer.
    pub async fn upsert(&self, customer: &Customer) -> DbResult<()> {
        validate_customer(customer)?;
        debug!(customer = %customer.kundennummer, "Saving customer");

        self.db
            .execute(
                UPSERT,
                &[
                    (&customer.kundennummer).into(),
                    (&customer.vorname).into(),
                    (&customer.nachname).into(),
                    customer.bestellnummer.clone().into(),
                    customer.quadratmeter.into(),
                    customer.dateien.into(),
                    customer.barcode.clone().into(),
                ],
            )
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation { field, .. } => DbError::duplicate(
                    field,
                    customer.bestellnummer.clone().unwrap_or_default(),
                ),
                other => other,
            })?;

        Ok(())
    }

    /// Gets a customer by customer number.
    pub async fn get(&self, kundennummer: &str) -> DbResult<Option<Customer>> {
        let row = self
            .db
            .fetch_optional(SELECT_BY_ID, &[kundennummer.into()])
            .await?;

        row.as_ref().map(customer_from_row).transpose()
    }

    /// Stores the print area of the customer's order and the number of
    /// files it came from. Returns the area in m².
    pub async fn record_area(&self, kundennummer: &str, files: &[PrintFile]) -> DbResult<f64> {
        validate_customer_id(kundennummer)?;
        let area = total_square_meters(files)?;

        let affected = self
            .db
            .execute(
                UPDATE_AREA,
                &[area.into(), (files.len() as i64).into(), kundennummer.into()],
            )
            .await?;

        if affected == 0 {
            return Err(DbError::not_found("Customer", kundennummer));
        }

        debug!(customer = %kundennummer, area, files = files.len(), "Print area recorded");
        Ok(area)
    }
}

fn customer_from_row(row: &AnyRow) -> DbResult<Customer> {
    Ok(Customer {
        kundennummer: row.try_get("kundennummer")?,
        vorname: row.try_get("vorname")?,
        nachname: row.try_get("nachname")?,
        bestellnummer: row.try_get("bestellnummer")?,
        quadratmeter: row.try_get("quadratmeter")?,
        dateien: row.try_get("dateien")?,
        barcode: row.try_get("barcode")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
