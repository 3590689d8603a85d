//! # Order Numbers
//!
//! Formatting for human-facing order numbers: `PREFIX-<year><n:03>`,
//! e.g. `PRFX-2026007` for the seventh order of 2026.
//!
//! The running number is `count + 1`, where `count` is how many customers
//! already carry an order number for that prefix and year. Counting is done
//! by `bestell-db`; this module only builds and reads the text.
//!
//! Two callers that count at the same time get the same number. That race is
//! known and kept; the `UNIQUE` constraint on `customers.bestellnummer`
//! rejects the second save.

use crate::error::ValidationError;
use crate::validation::{validate_order_prefix, ValidationResult};

/// Builds the order number following `existing_count` orders.
///
/// ## Example
/// ```rust
/// use bestell_core::order_number::format_order_number;
///
/// assert_eq!(format_order_number("PRFX", 2026, 5).unwrap(), "PRFX-2026006");
/// assert_eq!(format_order_number("PRFX", 2026, 1234).unwrap(), "PRFX-20261235");
/// ```
pub fn format_order_number(prefix: &str, year: i32, existing_count: i64) -> ValidationResult<String> {
    validate_order_prefix(prefix)?;

    if existing_count < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "order count".to_string(),
        });
    }

    Ok(format!("{}-{}{:03}", prefix, year, existing_count + 1))
}

/// Pattern matching every order number of `prefix` in `year`, for use with
/// a case-insensitive `ILIKE`.
pub fn year_pattern(prefix: &str, year: i32) -> ValidationResult<String> {
    validate_order_prefix(prefix)?;
    Ok(format!("{}-{}%", prefix, year))
}

/// Splits an order number back into `(year, running number)`.
///
/// Returns `None` if the text doesn't carry `prefix`.
pub fn parse_order_number(prefix: &str, number: &str) -> Option<(i32, i64)> {
    let rest = number.strip_prefix(prefix)?.strip_prefix('-')?;
    if rest.len() < 7 || !rest.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let (year, running) = rest.split_at(4);
    Some((year.parse().ok()?, running.parse().ok()?))
}
