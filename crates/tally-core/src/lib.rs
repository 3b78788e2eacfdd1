//! # tally-core: Pure Business Logic for Tally POS
//!
//! This crate is the **heart** of Tally POS. It contains the billing rules
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Counter (terminal / web)                     │   │
//! │  │    Scan UI ──► Cart UI ──► Checkout ──► Receipt                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-billing                                │   │
//! │  │    OCR client, cart resolver, checkout engine, session          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ │   │
//! │  │   │  types  │ │  money  │ │  cart   │ │  fefo   │ │ receipt │ │   │
//! │  │   │ Product │ │  Money  │ │  Cart   │ │  plan   │ │  text   │ │   │
//! │  │   │ Batch   │ │discount │ │CartLine │ │deduction│ │  html   │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, InventoryBatch, Shop)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`cart`] - In-memory cart with stock caps
//! - [`fefo`] - First-expiry-first-out deduction planning
//! - [`scan`] - OCR guesses and text-line parsing
//! - [`receipt`] - Receipt projection and rendering
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::Money;
//!
//! // A batch listed at $2.50 with 10% off
//! let unit_price = Money::from_cents(250).apply_percentage_discount(1000);
//! assert_eq!(unit_price.cents(), 225);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod fefo;
pub mod money;
pub mod receipt;
pub mod scan;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, MergeOutcome, QuantityOutcome};
pub use error::{CoreError, CoreResult, ValidationError};
pub use fefo::{plan_deduction, BatchDeduction, DeductionPlan};
pub use money::Money;
pub use receipt::{Receipt, ReceiptLine};
pub use scan::ScanGuess;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// How many name candidates a resolver pulls from the catalog.
pub const DEFAULT_NAME_SEARCH_LIMIT: u32 = 5;
