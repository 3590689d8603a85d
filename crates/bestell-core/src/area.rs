//! # Print Area
//!
//! Total square metres of an order, from the dimensions of its print files.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validation::ValidationResult;

/// Dimensions of one print file, in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrintFile {
    pub width_cm: f64,
    pub height_cm: f64,
    pub quantity: i64,
}

impl PrintFile {
    pub fn new(width_cm: f64, height_cm: f64, quantity: i64) -> Self {
        PrintFile {
            width_cm,
            height_cm,
            quantity,
        }
    }

    /// Area of all copies of this file in m².
    pub fn square_meters(&self) -> f64 {
        self.width_cm * self.height_cm / 10_000.0 * self.quantity as f64
    }
}

/// Sums the area of all files, rounded to three decimals.
///
/// ## Example
/// ```rust
/// use bestell_core::area::{total_square_meters, PrintFile};
///
/// let files = [PrintFile::new(100.0, 50.0, 2), PrintFile::new(30.0, 30.0, 1)];
/// assert_eq!(total_square_meters(&files).unwrap(), 1.09);
/// ```
pub fn total_square_meters(files: &[PrintFile]) -> ValidationResult<f64> {
    let mut total = 0.0;

    for file in files {
        if !file.width_cm.is_finite() || file.width_cm < 0.0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "width".to_string(),
            });
        }
        if !file.height_cm.is_finite() || file.height_cm < 0.0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "height".to_string(),
            });
        }
        if file.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            });
        }
        total += file.square_meters();
    }

    Ok((total * 1000.0).round() / 1000.0)
}
