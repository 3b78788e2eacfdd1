//! # Domain Types
//!
//! Catalog and inventory types shared by every Tally crate.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐        ┌──────────────────────────┐               │
//! │  │    Product      │ 1    * │     InventoryBatch       │               │
//! │  │  ─────────────  │◄───────│  ──────────────────────  │               │
//! │  │  id             │        │  id                      │               │
//! │  │  name           │        │  product_id, shop_id     │               │
//! │  │  code (opt)     │        │  quantity, price_cents   │               │
//! │  └─────────────────┘        │  discount_bps            │               │
//! │                             │  expiry_date, status     │               │
//! │  ┌─────────────────┐ 1    * └──────────────────────────┘               │
//! │  │      Shop       │◄──────────────┘                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Products are read-only from the billing side. Batch quantities change
//! only through checkout deduction.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Shop
// =============================================================================

/// A shop (branch) that owns inventory batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Shop {
    pub id: String,
    /// Printed at the top of every receipt.
    pub name: String,
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to the cashier and on the receipt.
    pub name: String,

    /// Label code (barcode digits or shop code) the OCR may read.
    pub code: Option<String>,

    /// Inactive products are excluded from code and name lookups.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Batch Status
// =============================================================================

/// Lifecycle of an inventory batch.
///
/// A batch becomes `SoldOut` exactly when its quantity reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[default]
    Active,
    SoldOut,
}

impl BatchStatus {
    /// Status a batch must carry after its quantity is written back.
    pub fn for_quantity(quantity: i64) -> Self {
        if quantity <= 0 {
            BatchStatus::SoldOut
        } else {
            BatchStatus::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Active => "active",
            BatchStatus::SoldOut => "sold_out",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Inventory Batch
// =============================================================================

/// Stock of one product at one shop sharing an expiry date and price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryBatch {
    pub id: String,
    pub product_id: String,
    pub shop_id: String,

    /// Units on hand, never negative.
    pub quantity: i64,

    /// List price per unit in cents.
    pub price_cents: i64,

    /// Discount in basis points (1000 = 10%).
    pub discount_bps: u32,

    #[ts(as = "String")]
    pub expiry_date: NaiveDate,

    pub status: BatchStatus,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl InventoryBatch {
    /// List price reduced by this batch's discount.
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.price_cents).apply_percentage_discount(self.discount_bps)
    }

    /// Whether checkout may draw from this batch.
    pub fn is_available(&self) -> bool {
        self.status == BatchStatus::Active && self.quantity > 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
