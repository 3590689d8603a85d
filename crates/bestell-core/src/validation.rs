//! # Validation Module
//!
//! Input validation for everything the order forms hand to the data layer.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Order form                                                   │
//! │  └── Empty fields, number parsing                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: bestell-db entry points                                      │
//! │  └── THIS MODULE: business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database                                                     │
//! │  ├── NOT NULL / UNIQUE constraints                                     │
//! │  └── Conditional stock update (amount >= quantity)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{Customer, LineItem, NewCharge, ProductKey};
use crate::{MAX_LINE_ITEMS, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest customer number the schema is sized for.
pub const MAX_CUSTOMER_ID_LEN: usize = 50;

/// Longest product name the schema is sized for.
pub const MAX_PRODUCT_NAME_LEN: usize = 100;

/// Longest sequence name (the native backend appends `_seq`).
pub const MAX_SEQUENCE_NAME_LEN: usize = 48;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a customer number.
///
/// ## Rules
/// - Must not be empty (after trimming)
/// - At most 50 characters
///
/// ## Example
/// ```rust
/// use bestell_core::validation::validate_customer_id;
///
/// assert!(validate_customer_id("K-1001").is_ok());
/// assert!(validate_customer_id("   ").is_err());
/// ```
pub fn validate_customer_id(id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: "kundennummer".to_string(),
        });
    }

    if id.chars().count() > MAX_CUSTOMER_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "kundennummer".to_string(),
            max: MAX_CUSTOMER_ID_LEN,
        });
    }

    Ok(())
}

/// Validates a product key. Color and size may be empty, the name may not.
pub fn validate_product_key(key: &ProductKey) -> ValidationResult<()> {
    let name = key.product_name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "product_name".to_string(),
        });
    }

    if name.chars().count() > MAX_PRODUCT_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "product_name".to_string(),
            max: MAX_PRODUCT_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a sequence name before it is spliced into DDL.
///
/// Native sequences are database objects, so their names cannot be bound as
/// parameters. Only `[a-z][a-z0-9_]*` is accepted.
///
/// ## Example
/// ```rust
/// use bestell_core::validation::validate_sequence_name;
///
/// assert!(validate_sequence_name("batch_number").is_ok());
/// assert!(validate_sequence_name("batch; DROP TABLE charges").is_err());
/// ```
pub fn validate_sequence_name(name: &str) -> ValidationResult<()> {
    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "sequence name".to_string(),
        });
    }

    if name.len() > MAX_SEQUENCE_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "sequence name".to_string(),
            max: MAX_SEQUENCE_NAME_LEN,
        });
    }

    let mut chars = name.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if !starts_with_letter || !rest_ok {
        return Err(ValidationError::InvalidFormat {
            field: "sequence name".to_string(),
            reason: "only lowercase letters, digits and '_' are allowed, starting with a letter"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates an order number prefix (`PRFX`).
pub fn validate_order_prefix(prefix: &str) -> ValidationResult<()> {
    if prefix.is_empty() {
        return Err(ValidationError::Required {
            field: "order prefix".to_string(),
        });
    }

    // '%' and '_' would turn into wildcards in the count pattern
    if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "order prefix".to_string(),
            reason: "only ASCII letters and digits are allowed".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an order line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - At most [`MAX_LINE_QUANTITY`]
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

// =============================================================================
// Entity Validators
// =============================================================================

/// Validates a full order placement request.
pub fn validate_line_items(items: &[LineItem]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Required {
            field: "line items".to_string(),
        });
    }

    if items.len() > MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "line items".to_string(),
            min: 1,
            max: MAX_LINE_ITEMS as i64,
        });
    }

    for item in items {
        validate_product_key(&item.key)?;
        validate_quantity(item.quantity)?;
    }

    Ok(())
}

/// Validates a customer before upsert.
pub fn validate_customer(customer: &Customer) -> ValidationResult<()> {
    validate_customer_id(&customer.kundennummer)?;

    if !customer.quadratmeter.is_finite() || customer.quadratmeter < 0.0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "quadratmeter".to_string(),
        });
    }

    if customer.dateien.is_some_and(|n| n < 0) {
        return Err(ValidationError::MustNotBeNegative {
            field: "dateien".to_string(),
        });
    }

    Ok(())
}

/// Validates a new lot before registration.
pub fn validate_new_charge(charge: &NewCharge) -> ValidationResult<()> {
    validate_product_key(&charge.key())?;

    if charge.manufacturer.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "manufacturer".to_string(),
        });
    }

    if charge.delivery_date.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "delivery_date".to_string(),
        });
    }

    if charge.amount < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn mug() -> ProductKey {
        ProductKey::new("Mug", "Red", "M")
    }

    #[test]
    fn test_customer_id_rules() {
        assert!(validate_customer_id("C1").is_ok());
        assert!(matches!(
            validate_customer_id(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_customer_id(&"x".repeat(51)),
            Err(ValidationError::TooLong { max: 50, .. })
        ));
    }

    #[test]
    fn test_quantity_rules() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_sequence_name_rules() {
        assert!(validate_sequence_name("batch_number").is_ok());
        assert!(validate_sequence_name("b2").is_ok());
        assert!(validate_sequence_name("").is_err());
        assert!(validate_sequence_name("Batch").is_err());
        assert!(validate_sequence_name("2batch").is_err());
        assert!(validate_sequence_name("batch-number").is_err());
        assert!(validate_sequence_name(&"a".repeat(49)).is_err());
    }

    #[test]
    fn test_order_prefix_rules() {
        assert!(validate_order_prefix("PRFX").is_ok());
        assert!(validate_order_prefix("").is_err());
        assert!(validate_order_prefix("PR%").is_err());
        assert!(validate_order_prefix("PR_X").is_err());
    }

    #[test]
    fn test_line_items_rules() {
        assert!(validate_line_items(&[LineItem::new(mug(), 2)]).is_ok());
        assert!(validate_line_items(&[]).is_err());
        assert!(validate_line_items(&[LineItem::new(mug(), 0)]).is_err());
        assert!(
            validate_line_items(&[LineItem::new(ProductKey::new(" ", "Red", "M"), 1)]).is_err()
        );
    }

    #[test]
    fn test_customer_rules() {
        let mut customer = Customer::new("C1", "Anna", "Muster");
        assert!(validate_customer(&customer).is_ok());

        customer.quadratmeter = -1.0;
        assert!(validate_customer(&customer).is_err());

        customer.quadratmeter = f64::NAN;
        assert!(validate_customer(&customer).is_err());
    }

    #[test]
    fn test_new_charge_rules() {
        let mut charge = NewCharge {
            product_name: "Mug".to_string(),
            supplier_name: None,
            color: "Red".to_string(),
            size: "M".to_string(),
            manufacturer: "Kahla".to_string(),
            external_id: None,
            delivery_date: "2026-01-01".to_string(),
            amount: 0,
        };
        assert!(validate_new_charge(&charge).is_ok());

        charge.amount = -1;
        assert!(validate_new_charge(&charge).is_err());

        charge.amount = 1;
        charge.manufacturer = String::new();
        assert!(validate_new_charge(&charge).is_err());
    }
}
