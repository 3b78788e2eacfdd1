//! # Repository Module
//!
//! The SQLite side of the product/inventory directory.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Directory Queries                                    │
//! │                                                                         │
//! │  Cart resolver / checkout engine (tally-billing)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── find_by_code(code)              exact, active only                │
//! │  └── search_by_name(text, limit)     case-insensitive substring        │
//! │                                                                         │
//! │  BatchRepository                                                       │
//! │  ├── list_available(product, shop, expiry?)   FEFO order               │
//! │  ├── has_available_on(product, shop, expiry)  tie-break check          │
//! │  └── update_stock(id, quantity, status)       checkout write-back      │
//! │                                                                         │
//! │  ShopRepository                                                        │
//! │  └── get_by_id(id)                   receipt header                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod batch;
pub mod product;
pub mod shop;

/// Generates a new row ID (UUID v4).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
