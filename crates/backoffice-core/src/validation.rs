//! # Validation Module
//!
//! Input validation for tickets, commission rules and stock movements.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Web front end (request schemas, out of this workspace)       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - field rules checked before a transaction opens │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK (current_quantity >= 0), CHECK (quantity > 0)               │
//! │  ├── UNIQUE (name, category, unit)                                     │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use backoffice_core::validation::{validate_route, validate_movement_quantity};
//!
//! assert_eq!(validate_route(" bzv-dkr ").unwrap(), "BZV-DKR");
//! assert!(validate_movement_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::StockItemKey;
use crate::MAX_TEXT_LENGTH;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a mandatory free-text field and returns it trimmed.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most [`MAX_TEXT_LENGTH`] characters
pub fn validate_required_text(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_TEXT_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LENGTH,
        });
    }

    Ok(value.to_string())
}

/// Validates a ticket route and returns its canonical (trimmed, uppercased)
/// form.
///
/// ```rust
/// use backoffice_core::validation::validate_route;
///
/// assert_eq!(validate_route("bzv-pnr").unwrap(), "BZV-PNR");
/// assert!(validate_route("   ").is_err());
/// ```
pub fn validate_route(route: &str) -> ValidationResult<String> {
    let route = validate_required_text("route", route)?;
    Ok(route.to_uppercase())
}

/// Validates an ISO 4217 currency code (three ASCII letters).
pub fn validate_currency(currency: &str) -> ValidationResult<String> {
    let currency = currency.trim();

    if currency.is_empty() {
        return Err(ValidationError::Required {
            field: "currency".to_string(),
        });
    }

    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a three-letter ISO code".to_string(),
        });
    }

    Ok(currency.to_uppercase())
}

/// Validates all three fields of a stock item key and returns it trimmed.
pub fn validate_stock_key(key: &StockItemKey) -> ValidationResult<StockItemKey> {
    Ok(StockItemKey {
        name: validate_required_text("item name", &key.name)?,
        category: validate_required_text("category", &key.category)?,
        unit: validate_required_text("unit", &key.unit)?,
    })
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a ticket sale amount in cents.
///
/// ## Rules
/// - Must be non-negative; a zero-amount sale earns zero commission
pub fn validate_sale_amount(cents: i64) -> ValidationResult<()> {
    validate_non_negative_cents("amount", cents)
}

/// Validates an optional money component (base fare, markup) in cents.
///
/// ## Rules
/// - Must be non-negative; zero is allowed
pub fn validate_non_negative_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a stock movement quantity (must be > 0).
///
/// The direction carries the sign, so the quantity itself never does.
pub fn validate_movement_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a percentage rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_rate_bps(field: &str, bps: i64) -> ValidationResult<()> {
    if !(0..=10_000).contains(&bps) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
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

    #[test]
    fn test_validate_required_text() {
        assert_eq!(
            validate_required_text("justification", "  monthly refill ").unwrap(),
            "monthly refill"
        );
        assert!(validate_required_text("justification", "").is_err());
        assert!(validate_required_text("justification", &"x".repeat(MAX_TEXT_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_route() {
        assert_eq!(validate_route(" bzv-dkr ").unwrap(), "BZV-DKR");
        assert!(validate_route("").is_err());
    }

    #[test]
    fn test_validate_currency() {
        assert_eq!(validate_currency("xaf").unwrap(), "XAF");
        assert!(validate_currency("").is_err());
        assert!(validate_currency("EURO").is_err());
        assert!(validate_currency("E1R").is_err());
    }

    #[test]
    fn test_validate_stock_key() {
        let key = StockItemKey::new(" Ramette A4 ", "Fournitures", "paquet");
        let key = validate_stock_key(&key).unwrap();
        assert_eq!(key.name, "Ramette A4");

        let missing_unit = StockItemKey::new("Ramette A4", "Fournitures", " ");
        assert!(validate_stock_key(&missing_unit).is_err());
    }

    #[test]
    fn test_numeric_validators() {
        assert!(validate_sale_amount(1).is_ok());
        assert!(validate_sale_amount(0).is_ok());
        assert!(validate_sale_amount(-1).is_err());

        assert!(validate_non_negative_cents("base fare", 0).is_ok());
        assert!(validate_non_negative_cents("base fare", -1).is_err());

        assert!(validate_movement_quantity(80).is_ok());
        assert!(validate_movement_quantity(0).is_err());
        assert!(validate_movement_quantity(-3).is_err());

        assert!(validate_rate_bps("markup", 0).is_ok());
        assert!(validate_rate_bps("markup", 10_000).is_ok());
        assert!(validate_rate_bps("markup", 10_001).is_err());
        assert!(validate_rate_bps("markup", -1).is_err());
    }
}
