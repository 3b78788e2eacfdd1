//! # Cart
//!
//! The in-memory cart of a billing session.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Operator Action          Operation               Cart Change           │
//! │  ───────────────          ─────────               ───────────           │
//! │                                                                         │
//! │  Scan label ─────────────► merge_scanned() ──────► push / qty + 1       │
//! │                                                     (capped at stock)   │
//! │                                                                         │
//! │  Edit quantity ──────────► set_quantity() ───────► qty = min(n, stock)  │
//! │                                                                         │
//! │  Remove line ────────────► remove_line() ────────► line dropped         │
//! │                                                                         │
//! │  Cancel / checkout ok ───► clear() ──────────────► empty                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Lines are unique by `product_id` and keep insertion order
//! - `0 < quantity <= available_qty` after every mutation made here
//! - `unit_price` and `available_qty` are snapshots taken when the line was
//!   first added; they are not refreshed from live inventory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::MAX_CART_LINES;

/// One product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,

    /// Code the line was scanned with, if the label carried one.
    pub code: Option<String>,

    /// Product name at time of adding (frozen).
    pub name: String,

    pub quantity: i64,

    /// Discounted unit price at time of adding (frozen).
    pub unit_price: Money,

    /// Sum of available batch quantities at time of adding.
    pub available_qty: i64,

    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// Creates a line with quantity one.
    pub fn new(
        product_id: impl Into<String>,
        code: Option<String>,
        name: impl Into<String>,
        unit_price: Money,
        available_qty: i64,
    ) -> Self {
        CartLine {
            product_id: product_id.into(),
            code,
            name: name.into(),
            quantity: 1,
            unit_price,
            available_qty,
            added_at: Utc::now(),
        }
    }

    /// Unit price × quantity.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    pub fn is_at_cap(&self) -> bool {
        self.quantity >= self.available_qty
    }
}

/// What happened when a scanned line was merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// New line with quantity one.
    Added,
    /// Existing line went up by one.
    Incremented { quantity: i64 },
    /// Existing line already holds all available stock; nothing changed.
    AtCap { cap: i64 },
}

/// What happened when a quantity was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityOutcome {
    Applied { quantity: i64 },
    /// Requested more than the stock snapshot; clamped to it.
    Clamped { requested: i64, applied: i64 },
}

/// The cart of one billing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    lines: Vec<CartLine>,

    /// When the cart was created/last cleared
    created_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Cart::new()
    }
}

impl Cart {
    pub fn new() -> Self {
        Cart {
            lines: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Merges a freshly resolved line into the cart.
    ///
    /// An existing line for the same product goes up by one, bounded by the
    /// stock snapshot it was created with. A new product is appended with
    /// quantity one.
    pub fn merge_scanned(&mut self, line: CartLine) -> CoreResult<MergeOutcome> {
        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id)
        {
            if existing.is_at_cap() {
                return Ok(MergeOutcome::AtCap {
                    cap: existing.available_qty,
                });
            }
            existing.quantity += 1;
            return Ok(MergeOutcome::Incremented {
                quantity: existing.quantity,
            });
        }

        if self.lines.len() >= MAX_CART_LINES {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_LINES,
            });
        }

        self.lines.push(CartLine { quantity: 1, ..line });
        Ok(MergeOutcome::Added)
    }

    /// Sets the quantity of a line.
    ///
    /// - `n <= 0`: rejected, line unchanged
    /// - `n > available_qty`: clamped to `available_qty`
    pub fn set_quantity(&mut self, product_id: &str, n: i64) -> CoreResult<QuantityOutcome> {
        if n <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or_else(|| CoreError::LineNotFound(product_id.to_string()))?;

        let applied = n.min(line.available_qty);
        line.quantity = applied;
        if applied < n {
            Ok(QuantityOutcome::Clamped {
                requested: n,
                applied,
            })
        } else {
            Ok(QuantityOutcome::Applied { quantity: applied })
        }
    }

    /// Removes the line for a product. Missing products are ignored.
    pub fn remove_line(&mut self, product_id: &str) -> Option<CartLine> {
        let index = self.lines.iter().position(|l| l.product_id == product_id)?;
        Some(self.lines.remove(index))
    }

    /// Σ quantity × unit price over all lines.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.created_at = Utc::now();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
