//! # Billing Error Types
//!
//! Everything the operator can be told went wrong during a session.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Billing Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────────┐  ┌─────────────────────┐  ┌─────────────────┐ │
//! │  │  Scan (per image)   │  │  Checkout           │  │  Setup          │ │
//! │  │                     │  │                     │  │                 │ │
//! │  │  Capture            │  │  EmptyCart          │  │  Config         │ │
//! │  │  OcrInvocationFailed│  │  BatchFetchFailed  ⚠│  │  ShopNotFound   │ │
//! │  │  ProductNotFound    │  │  BatchUpdateFailed ⚠│  │  Directory      │ │
//! │  │  OutOfStock         │  │  PrintFailed        │  │                 │ │
//! │  └─────────────────────┘  └─────────────────────┘  └─────────────────┘ │
//! │                                                                         │
//! │  ⚠ = partial failure: the receipt is already printed, stock is not     │
//! │      fully updated, the cart stays open for reconciliation             │
//! │                                                                         │
//! │  None of these end the process. Each one is scoped to the operation    │
//! │  that raised it and the session carries on.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::directory::DirectoryError;
use tally_core::CoreError;

/// Result type alias for billing operations.
pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    // =========================================================================
    // Scan Errors
    // =========================================================================
    /// The image could not be loaded or decoded.
    #[error("Could not read image: {0}")]
    Capture(String),

    /// The OCR service call failed. The image is discarded.
    #[error("OCR request failed: {0}")]
    OcrInvocationFailed(String),

    /// Neither the code nor the name matched a product.
    #[error("No product found for {}", describe_guess(.code, .name))]
    ProductNotFound {
        code: Option<String>,
        name: Option<String>,
    },

    /// The product exists but the shop holds no active stock of it.
    #[error("{name} is out of stock")]
    OutOfStock { product_id: String, name: String },

    // =========================================================================
    // Checkout Errors
    // =========================================================================
    /// Checkout was requested with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Reading a line's batches failed; deduction stopped at this line.
    #[error(
        "Receipt printed but inventory not fully updated: \
         could not read batches for line {line} ({product_name}): {reason}"
    )]
    BatchFetchFailed {
        /// 1-based cart line number.
        line: usize,
        product_id: String,
        product_name: String,
        reason: String,
    },

    /// Writing back a batch failed; deduction stopped at this line.
    #[error(
        "Receipt printed but inventory not fully updated: \
         could not update batch {batch_id} for line {line} ({product_name}): {reason}"
    )]
    BatchUpdateFailed {
        line: usize,
        product_id: String,
        product_name: String,
        batch_id: String,
        reason: String,
    },

    /// The receipt printer rejected the document.
    #[error("Receipt printing failed: {0}")]
    PrintFailed(String),

    /// The session was closed by checkout or cancel.
    #[error("Billing session is closed")]
    SessionClosed,

    // =========================================================================
    // Setup / Collaborator Errors
    // =========================================================================
    #[error("Shop not found: {0}")]
    ShopNotFound(String),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl BillingError {
    /// True when the receipt went out but stock was not fully deducted.
    pub fn is_partial_failure(&self) -> bool {
        matches!(
            self,
            BillingError::BatchFetchFailed { .. } | BillingError::BatchUpdateFailed { .. }
        )
    }

    /// The product a partial failure stopped at.
    pub fn failed_product(&self) -> Option<&str> {
        match self {
            BillingError::BatchFetchFailed { product_id, .. }
            | BillingError::BatchUpdateFailed { product_id, .. } => Some(product_id),
            _ => None,
        }
    }
}

fn describe_guess(code: &Option<String>, name: &Option<String>) -> String {
    match (code, name) {
        (Some(c), Some(n)) => format!("code '{}' or name '{}'", c, n),
        (Some(c), None) => format!("code '{}'", c),
        (None, Some(n)) => format!("name '{}'", n),
        (None, None) => "an unreadable label".to_string(),
    }
}

impl From<std::io::Error> for BillingError {
    fn from(err: std::io::Error) -> Self {
        BillingError::Capture(err.to_string())
    }
}

impl From<toml::de::Error> for BillingError {
    fn from(err: toml::de::Error) -> Self {
        BillingError::Config(err.to_string())
    }
}

impl From<tally_db::DbError> for BillingError {
    fn from(err: tally_db::DbError) -> Self {
        BillingError::Directory(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_not_found_message() {
        let err = BillingError::ProductNotFound {
            code: None,
            name: Some("milk".to_string()),
        };
        assert_eq!(err.to_string(), "No product found for name 'milk'");

        let err = BillingError::ProductNotFound {
            code: None,
            name: None,
        };
        assert_eq!(err.to_string(), "No product found for an unreadable label");
    }

    #[test]
    fn test_partial_failure_classification() {
        let err = BillingError::BatchUpdateFailed {
            line: 2,
            product_id: "p-bread".to_string(),
            product_name: "Brown Bread".to_string(),
            batch_id: "b-1".to_string(),
            reason: "disk I/O error".to_string(),
        };
        assert!(err.is_partial_failure());
        assert_eq!(err.failed_product(), Some("p-bread"));
        assert!(err.to_string().starts_with("Receipt printed but inventory not fully updated"));
        assert!(err.to_string().contains("line 2 (Brown Bread)"));

        assert!(!BillingError::EmptyCart.is_partial_failure());
        assert_eq!(BillingError::EmptyCart.failed_product(), None);
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err: BillingError = CoreError::LineNotFound("p-1".to_string()).into();
        assert_eq!(err.to_string(), "Product p-1 is not in the cart");
    }
}
