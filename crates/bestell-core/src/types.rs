//! # Domain Types
//!
//! Entities stored by the data-access core.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Customer     │   │     Charge      │   │    CupOrder     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  kundennummer   │   │  internal_id    │   │  id (auto)      │       │
//! │  │  bestellnummer  │   │  batch_number   │   │  kundennummer   │       │
//! │  │  quadratmeter   │   │  amount (>= 0)  │   │  quantity (> 0) │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │   ProductKey    │   │    LineItem     │                             │
//! │  │  ─────────────  │   │  ─────────────  │                             │
//! │  │  product_name   │   │  key            │                             │
//! │  │  color, size    │   │  quantity       │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Column names of the `customers` table are German (`kundennummer`,
//! `vorname`, ...) and the struct fields keep them so rows map 1:1.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Customer
// =============================================================================

/// A customer as captured by the order form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer number (primary key).
    pub kundennummer: String,

    /// First name.
    pub vorname: String,

    /// Last name.
    pub nachname: String,

    /// Current order number (`PRFX-2026007`), unique across customers.
    pub bestellnummer: Option<String>,

    /// Total area ordered in square metres.
    pub quadratmeter: f64,

    /// Number of print files attached to the order.
    pub dateien: Option<i64>,

    /// Barcode payload printed on the order label.
    pub barcode: Option<String>,
}

impl Customer {
    /// Creates a customer with no order attached yet.
    pub fn new(
        kundennummer: impl Into<String>,
        vorname: impl Into<String>,
        nachname: impl Into<String>,
    ) -> Self {
        Customer {
            kundennummer: kundennummer.into(),
            vorname: vorname.into(),
            nachname: nachname.into(),
            bestellnummer: None,
            quadratmeter: 0.0,
            dateien: None,
            barcode: None,
        }
    }
}

// =============================================================================
// Product Key
// =============================================================================

/// Identity of a stocked product variant.
///
/// Several charges (lots) can share one key; the ledger decrements one lot
/// at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductKey {
    pub product_name: String,
    pub color: String,
    pub size: String,
}

impl ProductKey {
    pub fn new(
        product_name: impl Into<String>,
        color: impl Into<String>,
        size: impl Into<String>,
    ) -> Self {
        ProductKey {
            product_name: product_name.into(),
            color: color.into(),
            size: size.into(),
        }
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.product_name, self.color, self.size)
    }
}

// =============================================================================
// Charge
// =============================================================================

/// An inventory lot ("Charge").
///
/// `amount` is never negative. After creation it changes only through the
/// ledger's conditional decrement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    /// Internal identifier (UUID v4).
    pub internal_id: String,

    pub product_name: String,
    pub supplier_name: Option<String>,
    pub color: String,
    pub size: String,
    pub manufacturer: String,

    /// Supplier's own lot identifier.
    pub external_id: Option<String>,

    /// Human-facing batch number, minted from the `batch_number` sequence.
    pub batch_number: String,

    /// Delivery date as entered (`YYYY-MM-DD`).
    pub delivery_date: String,

    /// Units remaining.
    pub amount: i64,

    /// When `amount` last changed.
    pub last_updated: Option<DateTime<Utc>>,
}

impl Charge {
    /// Returns the product key this lot belongs to.
    pub fn key(&self) -> ProductKey {
        ProductKey::new(&self.product_name, &self.color, &self.size)
    }
}

/// Input for registering a new lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCharge {
    pub product_name: String,
    #[serde(default)]
    pub supplier_name: Option<String>,
    pub color: String,
    pub size: String,
    pub manufacturer: String,
    #[serde(default)]
    pub external_id: Option<String>,
    pub delivery_date: String,
    pub amount: i64,
}

impl NewCharge {
    /// Returns the product key the new lot will belong to.
    pub fn key(&self) -> ProductKey {
        ProductKey::new(&self.product_name, &self.color, &self.size)
    }
}

/// Stock available for one product key, summed across its lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub key: ProductKey,
    pub amount: i64,
}

// =============================================================================
// Cup Order
// =============================================================================

/// One persisted order line. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CupOrder {
    /// Auto-numbered identifier.
    pub id: i64,
    pub kundennummer: String,
    pub product_name: String,
    pub quantity: i64,
    pub color: String,
    pub size: String,
    pub order_date: Option<DateTime<Utc>>,
}

impl CupOrder {
    /// Returns the product key this order line draws from.
    pub fn key(&self) -> ProductKey {
        ProductKey::new(&self.product_name, &self.color, &self.size)
    }
}

/// One (product, quantity) pair in an order placement call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub key: ProductKey,
    pub quantity: i64,
}

impl LineItem {
    pub fn new(key: ProductKey, quantity: i64) -> Self {
        LineItem { key, quantity }
    }
}

// =============================================================================
// Timestamps
// =============================================================================

/// Parses a database timestamp rendered as text.
///
/// SQLite's `CURRENT_TIMESTAMP` yields `2026-10-19 08:15:00`, PostgreSQL's
/// `CAST(ts AS TEXT)` adds fractional seconds. Both are UTC in this system.
pub fn parse_db_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_product_key_display() {
        let key = ProductKey::new("Mug", "Red", "M");
        assert_eq!(key.to_string(), "Mug/Red/M");
    }

    #[test]
    fn test_charge_key() {
        let charge = Charge {
            internal_id: "a".to_string(),
            product_name: "Mug".to_string(),
            supplier_name: None,
            color: "Blue".to_string(),
            size: "S".to_string(),
            manufacturer: "Kahla".to_string(),
            external_id: None,
            batch_number: "CH000001".to_string(),
            delivery_date: "2026-01-02".to_string(),
            amount: 10,
            last_updated: None,
        };
        assert_eq!(charge.key(), ProductKey::new("Mug", "Blue", "S"));
    }

    #[test]
    fn test_parse_sqlite_timestamp() {
        let ts = parse_db_timestamp("2026-10-19 08:15:42").unwrap();
        assert_eq!(ts.year(), 2026);
        assert_eq!(ts.hour(), 8);
        assert_eq!(ts.second(), 42);
    }

    #[test]
    fn test_parse_postgres_timestamp() {
        let ts = parse_db_timestamp("2026-10-19 08:15:42.123456").unwrap();
        assert_eq!(ts.nanosecond(), 123_456_000);
    }

    #[test]
    fn test_parse_garbage_timestamp() {
        assert!(parse_db_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_new_charge_from_json_defaults() {
        let json = r#"{
            "product_name": "Mug",
            "color": "Red",
            "size": "M",
            "manufacturer": "Kahla",
            "delivery_date": "2026-03-01",
            "amount": 5
        }"#;
        let charge: NewCharge = serde_json::from_str(json).unwrap();
        assert_eq!(charge.supplier_name, None);
        assert_eq!(charge.key(), ProductKey::new("Mug", "Red", "M"));
    }
}
