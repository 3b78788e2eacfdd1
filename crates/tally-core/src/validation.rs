//! # Validation Module
//!
//! Input checks shared by the catalog writers and the billing workflow.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Counter / OCR guess                                          │
//! │  ├── validate_name_query inside the product name search               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repository writes (seed, batch inserts)                      │
//! │  ├── THIS MODULE: product and batch field rules                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints on quantity / price / discount / status        │
//! │  └── UNIQUE product code, foreign keys                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_code, validate_discount_bps};
//!
//! assert!(validate_code("8901234567890").is_ok());
//! assert!(validate_discount_bps(1500).is_ok());
//! ```

use crate::error::ValidationError;
use crate::money::FULL_DISCOUNT_BPS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_CODE_LEN: usize = 50;
const MAX_NAME_LEN: usize = 200;
const MAX_QUERY_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product label code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens and underscores only
///
/// ```rust
/// use tally_core::validation::validate_code;
///
/// assert!(validate_code("RICE-0042").is_ok());
/// assert!(validate_code("").is_err());
/// assert!(validate_code("NO SPACES").is_err());
/// ```
pub fn validate_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.chars().count() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LEN,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name for the catalog.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a name-substring query and returns it trimmed.
///
/// Unlike a browse search, an empty query is an error: it would match every
/// product in the catalog.
pub fn validate_name_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if query.chars().count() > MAX_QUERY_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_QUERY_LEN,
        });
    }

    Ok(query.to_string())
}

/// Validates a shop identifier.
pub fn validate_shop_id(shop_id: &str) -> ValidationResult<()> {
    if shop_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "shop_id".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Batch quantities may be zero (sold out) but never negative.
pub fn validate_batch_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity < 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a list price in cents.
pub fn validate_price_cents(price_cents: i64) -> ValidationResult<()> {
    if price_cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Discounts are basis points between 0 and 10000 (100%).
///
/// ```rust
/// use tally_core::validation::validate_discount_bps;
///
/// assert!(validate_discount_bps(0).is_ok());
/// assert!(validate_discount_bps(10_000).is_ok());
/// assert!(validate_discount_bps(10_001).is_err());
/// ```
pub fn validate_discount_bps(discount_bps: u32) -> ValidationResult<()> {
    if discount_bps > FULL_DISCOUNT_BPS {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: FULL_DISCOUNT_BPS as i64,
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
    fn test_validate_code() {
        assert!(validate_code("8901234567890").is_ok());
        assert!(validate_code("MILK_1L").is_ok());
        assert!(validate_code("  RICE-0042  ").is_ok());

        assert!(matches!(
            validate_code("   "),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_code(&"9".repeat(51)),
            Err(ValidationError::TooLong { max: 50, .. })
        ));
        assert!(matches!(
            validate_code("AB/12"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Whole Milk 1L").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"x".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_name_query_trims() {
        assert_eq!(validate_name_query("  milk ").unwrap(), "milk");
        assert!(validate_name_query("").is_err());
        assert!(validate_name_query(&"m".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_shop_id() {
        assert!(validate_shop_id("shop-1").is_ok());
        assert!(validate_shop_id(" ").is_err());
    }

    #[test]
    fn test_numeric_validators() {
        assert!(validate_batch_quantity(0).is_ok());
        assert!(validate_batch_quantity(-1).is_err());

        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-5).is_err());

        assert!(validate_discount_bps(2500).is_ok());
        assert!(matches!(
            validate_discount_bps(20_000),
            Err(ValidationError::OutOfRange { max: 10_000, .. })
        ));
    }
}
