//! # Product / Inventory Directory
//!
//! The queries the resolver and checkout engine need, behind one trait so the
//! backing store can be swapped (SQLite in production, a scripted fake in
//! tests).
//!
//! ```text
//! ┌────────────────────┐        ┌────────────────────────────────────────┐
//! │  CartResolver      │───────►│  InventoryDirectory                    │
//! │  CheckoutEngine    │        │  ├── find_product_by_code              │
//! │  BillingSession    │        │  ├── search_products_by_name           │
//! └────────────────────┘        │  ├── has_batch_on                      │
//!                               │  ├── list_available_batches  (FEFO)    │
//!                               │  ├── update_batch                      │
//!                               │  └── shop                              │
//!                               └───────────────┬────────────────────────┘
//!                                               │ impl for
//!                                               ▼
//!                                     tally_db::Database
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use tally_core::{BatchStatus, InventoryBatch, Product, Shop};
use tally_db::{Database, DbError};

/// A directory call failed. Carries the backing store's message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DirectoryError(pub String);

impl From<DbError> for DirectoryError {
    fn from(err: DbError) -> Self {
        DirectoryError(err.to_string())
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[async_trait]
pub trait InventoryDirectory: Send + Sync {
    /// Active product whose code equals `code` exactly.
    async fn find_product_by_code(&self, code: &str) -> DirectoryResult<Option<Product>>;

    /// Case-insensitive substring match on names, at most `limit` results, in
    /// a stable order.
    async fn search_products_by_name(&self, text: &str, limit: u32)
        -> DirectoryResult<Vec<Product>>;

    /// Whether the shop has an active, non-empty batch of the product expiring
    /// on exactly `expiry`.
    async fn has_batch_on(
        &self,
        product_id: &str,
        shop_id: &str,
        expiry: NaiveDate,
    ) -> DirectoryResult<bool>;

    /// Active, non-empty batches ordered by expiry ascending.
    async fn list_available_batches(
        &self,
        product_id: &str,
        shop_id: &str,
        expiry: Option<NaiveDate>,
    ) -> DirectoryResult<Vec<InventoryBatch>>;

    /// Writes a batch's quantity and status.
    async fn update_batch(
        &self,
        batch_id: &str,
        quantity: i64,
        status: BatchStatus,
    ) -> DirectoryResult<()>;

    async fn shop(&self, shop_id: &str) -> DirectoryResult<Option<Shop>>;
}

#[async_trait]
impl InventoryDirectory for Database {
    async fn find_product_by_code(&self, code: &str) -> DirectoryResult<Option<Product>> {
        Ok(self.products().find_by_code(code).await?)
    }

    async fn search_products_by_name(
        &self,
        text: &str,
        limit: u32,
    ) -> DirectoryResult<Vec<Product>> {
        Ok(self.products().search_by_name(text, limit).await?)
    }

    async fn has_batch_on(
        &self,
        product_id: &str,
        shop_id: &str,
        expiry: NaiveDate,
    ) -> DirectoryResult<bool> {
        Ok(self
            .batches()
            .has_available_on(product_id, shop_id, expiry)
            .await?)
    }

    async fn list_available_batches(
        &self,
        product_id: &str,
        shop_id: &str,
        expiry: Option<NaiveDate>,
    ) -> DirectoryResult<Vec<InventoryBatch>> {
        Ok(self
            .batches()
            .list_available(product_id, shop_id, expiry)
            .await?)
    }

    async fn update_batch(
        &self,
        batch_id: &str,
        quantity: i64,
        status: BatchStatus,
    ) -> DirectoryResult<()> {
        Ok(self.batches().update_stock(batch_id, quantity, status).await?)
    }

    async fn shop(&self, shop_id: &str) -> DirectoryResult<Option<Shop>> {
        Ok(self.shops().get_by_id(shop_id).await?)
    }
}
