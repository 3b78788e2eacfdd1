//! # Cart Resolver
//!
//! Turns an OCR guess into a catalog product with sellable stock at this
//! shop.
//!
//! ## Resolution Pipeline
//! ```text
//! ScanGuess { code?, name?, expiry? }
//!      │
//!      ▼
//! ┌──────────────────┐  hit
//! │ 1. code == code  │──────────────────────────────┐
//! └────────┬─────────┘                              │
//!          │ no code / no hit                       │
//!          ▼                                        │
//! ┌──────────────────┐  0 results                   │
//! │ 2. name LIKE     │────────► ProductNotFound     │
//! │    (≤ limit)     │                              │
//! └────────┬─────────┘                              │
//!          │ 1..=limit candidates                   │
//!          ▼                                        │
//! ┌──────────────────┐                              │
//! │ 3. expiry check  │ first candidate holding a    │
//! │    in order      │ batch on that date, else     │
//! └────────┬─────────┘ the first candidate          │
//!          │                                        │
//!          ▼◄───────────────────────────────────────┘
//! ┌──────────────────┐  empty   ┌──────────────────┐  empty
//! │ 4. batches on    │─────────►│ 5. all batches   │────────► OutOfStock
//! │    expiry        │          │    (no filter)   │
//! └────────┬─────────┘          └────────┬─────────┘
//!          └──────────────┬──────────────┘
//!                         ▼
//!         available = Σ quantity, unit price = first batch net of discount
//! ```

use tracing::debug;

use crate::directory::InventoryDirectory;
use crate::error::{BillingError, BillingResult};
use tally_core::{CartLine, InventoryBatch, Money, Product, ScanGuess, DEFAULT_NAME_SEARCH_LIMIT};

/// Which step of the pipeline picked the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    Code,
    Name,
    /// Name candidate chosen because it holds a batch on the guessed expiry.
    NameAndExpiry,
}

/// A product with stock, ready to become a cart line.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub product: Product,
    /// Sellable batches, soonest expiry first.
    pub batches: Vec<InventoryBatch>,
    pub available_qty: i64,
    pub unit_price: Money,
    pub matched_by: MatchedBy,
}

impl Resolution {
    pub fn to_cart_line(&self) -> CartLine {
        CartLine::new(
            self.product.id.clone(),
            self.product.code.clone(),
            self.product.name.clone(),
            self.unit_price,
            self.available_qty,
        )
    }
}

pub struct CartResolver<'a, D: InventoryDirectory + ?Sized> {
    directory: &'a D,
    shop_id: &'a str,
    name_search_limit: u32,
}

impl<'a, D: InventoryDirectory + ?Sized> CartResolver<'a, D> {
    pub fn new(directory: &'a D, shop_id: &'a str) -> Self {
        CartResolver {
            directory,
            shop_id,
            name_search_limit: DEFAULT_NAME_SEARCH_LIMIT,
        }
    }

    pub fn with_name_search_limit(mut self, limit: u32) -> Self {
        self.name_search_limit = limit;
        self
    }

    pub async fn resolve(&self, guess: &ScanGuess) -> BillingResult<Resolution> {
        let guess = guess.clone().normalized();
        let (product, matched_by) = self.identify(&guess).await?;

        let batches = self.sellable_batches(&product, &guess).await?;
        let Some(first) = batches.first() else {
            debug!(product_id = %product.id, shop_id = %self.shop_id, "No sellable batches");
            return Err(BillingError::OutOfStock {
                product_id: product.id,
                name: product.name,
            });
        };

        let unit_price = first.unit_price();
        let available_qty = batches.iter().map(|b| b.quantity).sum();

        debug!(
            product_id = %product.id,
            ?matched_by,
            batches = batches.len(),
            available_qty,
            unit_price = unit_price.cents(),
            "Scan resolved"
        );

        Ok(Resolution {
            product,
            batches,
            available_qty,
            unit_price,
            matched_by,
        })
    }

    async fn identify(&self, guess: &ScanGuess) -> BillingResult<(Product, MatchedBy)> {
        if let Some(code) = &guess.code {
            if let Some(product) = self.directory.find_product_by_code(code).await? {
                return Ok((product, MatchedBy::Code));
            }
            debug!(code = %code, "No product with this code, trying name");
        }

        let not_found = || BillingError::ProductNotFound {
            code: guess.code.clone(),
            name: guess.name.clone(),
        };

        let Some(name) = &guess.name else {
            return Err(not_found());
        };

        let mut candidates = self
            .directory
            .search_products_by_name(name, self.name_search_limit)
            .await?;
        if candidates.is_empty() {
            return Err(not_found());
        }
        debug!(name = %name, candidates = candidates.len(), "Name candidates");

        if let (Some(expiry), true) = (guess.expiry_date, candidates.len() > 1) {
            for (index, candidate) in candidates.iter().enumerate() {
                if self
                    .directory
                    .has_batch_on(&candidate.id, self.shop_id, expiry)
                    .await?
                {
                    let product = candidates.swap_remove(index);
                    return Ok((product, MatchedBy::NameAndExpiry));
                }
            }
            debug!(%expiry, "No candidate holds a batch on this expiry, taking the first");
        }

        Ok((candidates.swap_remove(0), MatchedBy::Name))
    }

    async fn sellable_batches(
        &self,
        product: &Product,
        guess: &ScanGuess,
    ) -> BillingResult<Vec<InventoryBatch>> {
        if let Some(expiry) = guess.expiry_date {
            let exact = self
                .directory
                .list_available_batches(&product.id, self.shop_id, Some(expiry))
                .await?;
            if !exact.is_empty() {
                return Ok(exact);
            }
            debug!(product_id = %product.id, %expiry, "No batch on scanned expiry, widening");
        }

        Ok(self
            .directory
            .list_available_batches(&product.id, self.shop_id, None)
            .await?)
    }
}
