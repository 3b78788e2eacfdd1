//! # Inventory Batch Repository
//!
//! Per-shop stock, one row per (product, expiry, price) batch.
//!
//! ## FEFO Ordering
//! ```text
//! list_available(product, shop, expiry?)
//!
//!   WHERE status = 'active' AND quantity > 0
//!         [AND expiry_date = ?]
//!   ORDER BY expiry_date ASC, created_at ASC, id ASC
//!
//!   ┌──────────┬────────────┬─────┐
//!   │ batch    │ expiry     │ qty │
//!   ├──────────┼────────────┼─────┤
//!   │ b-jan    │ 2024-01-01 │  10 │ ← sold first
//!   │ b-feb    │ 2024-02-01 │  10 │
//!   └──────────┴────────────┴─────┘
//! ```
//!
//! `update_stock` writes an absolute quantity. There is no version column:
//! two counters deducting from the same batch at the same time can lose an
//! update.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use tally_core::validation::{validate_batch_quantity, validate_discount_bps, validate_price_cents};
use tally_core::{BatchStatus, InventoryBatch};

const BATCH_COLUMNS: &str = "id, product_id, shop_id, quantity, price_cents, discount_bps, \
                             expiry_date, status, created_at, updated_at";

/// Fields needed to receive a batch into a shop.
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub product_id: String,
    pub shop_id: String,
    pub quantity: i64,
    pub price_cents: i64,
    pub discount_bps: u32,
    pub expiry_date: NaiveDate,
}

/// Repository for inventory batch operations.
#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BatchRepository { pool }
    }

    /// Active batches with stock for a product at a shop, FEFO ordered.
    ///
    /// When `expiry` is given only batches expiring exactly that day match.
    pub async fn list_available(
        &self,
        product_id: &str,
        shop_id: &str,
        expiry: Option<NaiveDate>,
    ) -> DbResult<Vec<InventoryBatch>> {
        debug!(
            product_id = %product_id,
            shop_id = %shop_id,
            expiry = ?expiry,
            "Listing available batches"
        );

        let sql = format!(
            r#"
            SELECT {}
            FROM inventory_batches
            WHERE product_id = ?1
              AND shop_id = ?2
              AND status = 'active'
              AND quantity > 0
              AND (?3 IS NULL OR expiry_date = ?3)
            ORDER BY expiry_date ASC, created_at ASC, id ASC
            "#,
            BATCH_COLUMNS
        );
        let batches = sqlx::query_as::<_, InventoryBatch>(&sql)
            .bind(product_id)
            .bind(shop_id)
            .bind(expiry)
            .fetch_all(&self.pool)
            .await?;

        Ok(batches)
    }

    /// Whether the shop holds active stock of the product expiring on `expiry`.
    pub async fn has_available_on(
        &self,
        product_id: &str,
        shop_id: &str,
        expiry: NaiveDate,
    ) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT 1
            FROM inventory_batches
            WHERE product_id = ?1
              AND shop_id = ?2
              AND status = 'active'
              AND quantity > 0
              AND expiry_date = ?3
            LIMIT 1
            "#,
        )
        .bind(product_id)
        .bind(shop_id)
        .bind(expiry)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    /// Every batch of a product at a shop, sold out included.
    pub async fn list_for_product(
        &self,
        product_id: &str,
        shop_id: &str,
    ) -> DbResult<Vec<InventoryBatch>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM inventory_batches
            WHERE product_id = ?1 AND shop_id = ?2
            ORDER BY expiry_date ASC, created_at ASC, id ASC
            "#,
            BATCH_COLUMNS
        );
        let batches = sqlx::query_as::<_, InventoryBatch>(&sql)
            .bind(product_id)
            .bind(shop_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(batches)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<InventoryBatch>> {
        let sql = format!("SELECT {} FROM inventory_batches WHERE id = ?1", BATCH_COLUMNS);
        let batch = sqlx::query_as::<_, InventoryBatch>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(batch)
    }

    /// Writes back a batch's quantity and status after a deduction.
    pub async fn update_stock(&self, id: &str, quantity: i64, status: BatchStatus) -> DbResult<()> {
        validate_batch_quantity(quantity)?;
        debug!(id = %id, quantity = quantity, status = %status, "Updating batch stock");

        let result = sqlx::query(
            r#"
            UPDATE inventory_batches
            SET quantity = ?2, status = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("InventoryBatch", id));
        }

        Ok(())
    }

    /// Receives a new batch. Status follows the quantity.
    pub async fn insert(&self, new: &NewBatch) -> DbResult<InventoryBatch> {
        validate_batch_quantity(new.quantity)?;
        validate_price_cents(new.price_cents)?;
        validate_discount_bps(new.discount_bps)?;

        let now = Utc::now();
        let batch = InventoryBatch {
            id: generate_id(),
            product_id: new.product_id.clone(),
            shop_id: new.shop_id.clone(),
            quantity: new.quantity,
            price_cents: new.price_cents,
            discount_bps: new.discount_bps,
            expiry_date: new.expiry_date,
            status: BatchStatus::for_quantity(new.quantity),
            created_at: now,
            updated_at: now,
        };

        debug!(
            id = %batch.id,
            product_id = %batch.product_id,
            quantity = batch.quantity,
            expiry = %batch.expiry_date,
            "Inserting batch"
        );

        sqlx::query(
            r#"
            INSERT INTO inventory_batches (
                id, product_id, shop_id, quantity, price_cents, discount_bps,
                expiry_date, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.product_id)
        .bind(&batch.shop_id)
        .bind(batch.quantity)
        .bind(batch.price_cents)
        .bind(batch.discount_bps)
        .bind(batch.expiry_date)
        .bind(batch.status)
        .bind(batch.created_at)
        .bind(batch.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(batch)
    }
}
