//! # Product Repository
//!
//! Catalog lookups used by the cart resolver.
//!
//! ## Name Search
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  OCR name: "milk"                                                      │
//! │       │                                                                 │
//! │       ▼  lowercase, escape % and _ , wrap in %...%                     │
//! │  name_folded LIKE '%milk%' ESCAPE '\'                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │ Almond Milk 1L         │ ← MATCH #1      │                           │
//! │  │ MILK CHOCOLATE 100g    │ ← MATCH #2      │                           │
//! │  │ Whole Milk 1L          │ ← MATCH #3      │                           │
//! │  │ Orange Juice 1L        │                 │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ▼  ORDER BY name_folded, id  LIMIT n                             │
//! │  Candidates in a stable order for the expiry tie-break                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `name_folded` holds `str::to_lowercase` of the name, written at insert.
//! SQLite's own `LIKE` and `NOCASE` only fold ASCII, so "CRÈME" would miss
//! "Crème Fraîche" without it.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use tally_core::validation::{validate_code, validate_name_query, validate_product_name};
use tally_core::Product;

const PRODUCT_COLUMNS: &str = "id, name, code, is_active, created_at";

/// Fields needed to create a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub code: Option<String>,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, code: Option<&str>) -> Self {
        NewProduct {
            name: name.into(),
            code: code.map(str::to_string),
        }
    }
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Finds the active product carrying exactly this code.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let code = code.trim();
        debug!(code = %code, "Looking up product by code");

        let sql = format!(
            "SELECT {} FROM products WHERE code = ?1 AND is_active = 1",
            PRODUCT_COLUMNS
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Case-insensitive substring search over active product names.
    ///
    /// Results are ordered by name, then id, and capped at `limit`.
    /// A blank query matches nothing; an over-long one is `DbError::Invalid`.
    pub async fn search_by_name(&self, text: &str, limit: u32) -> DbResult<Vec<Product>> {
        if text.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let text = validate_name_query(text)?;
        debug!(query = %text, limit = %limit, "Searching products by name");

        let sql = format!(
            r#"
            SELECT {}
            FROM products
            WHERE is_active = 1
              AND name_folded LIKE '%' || ?1 || '%' ESCAPE '\'
            ORDER BY name_folded, id
            LIMIT ?2
            "#,
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(escape_like(&text.to_lowercase()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Name search returned products");
        Ok(products)
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Inserts a new active product.
    ///
    /// ## Returns
    /// * `Err(DbError::Invalid)` - name or code fails validation
    /// * `Err(DbError::UniqueViolation)` - code already exists
    pub async fn insert(&self, new: &NewProduct) -> DbResult<Product> {
        validate_product_name(&new.name)?;
        let code = match new.code.as_deref().map(str::trim) {
            Some(code) => {
                validate_code(code)?;
                Some(code.to_string())
            }
            None => None,
        };

        let product = Product {
            id: generate_id(),
            name: new.name.trim().to_string(),
            code,
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %product.id, code = ?product.code, "Inserting product");

        sqlx::query(
            "INSERT INTO products (id, name, name_folded, code, is_active, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.name.to_lowercase())
        .bind(&product.code)
        .bind(product.is_active)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                DbError::duplicate(field, product.code.clone().unwrap_or_default())
            }
            other => other,
        })?;

        Ok(product)
    }

    /// Hides a product from code and name lookups.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating product");

        let result = sqlx::query("UPDATE products SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics and the seed guard).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Escapes LIKE wildcards so OCR text is matched literally.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
