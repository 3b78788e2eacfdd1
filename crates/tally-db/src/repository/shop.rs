//! # Shop Repository
//!
//! Shops own inventory batches and name the receipt header.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::validation::validate_shop_id;
use tally_core::Shop;

#[derive(Debug, Clone)]
pub struct ShopRepository {
    pool: SqlitePool,
}

impl ShopRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShopRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Shop>> {
        let shop = sqlx::query_as::<_, Shop>("SELECT id, name FROM shops WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(shop)
    }

    /// Creates a shop with a caller-chosen id (ids appear in `tally.toml`).
    pub async fn insert(&self, id: &str, name: &str) -> DbResult<Shop> {
        validate_shop_id(id)?;
        debug!(id = %id, name = %name, "Inserting shop");

        sqlx::query("INSERT INTO shops (id, name) VALUES (?1, ?2)")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => DbError::duplicate(field, id),
                other => other,
            })?;

        Ok(Shop {
            id: id.to_string(),
            name: name.to_string(),
        })
    }

    /// Fetches the shop, creating it when missing.
    pub async fn ensure(&self, id: &str, name: &str) -> DbResult<Shop> {
        match self.get_by_id(id).await? {
            Some(shop) => Ok(shop),
            None => self.insert(id, name).await,
        }
    }
}
