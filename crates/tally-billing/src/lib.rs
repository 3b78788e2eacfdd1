//! # tally-billing: Scan-to-Bill Workflow
//!
//! Everything between a photo of a product label and a settled sale.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          BillingSession                                 │
//! │                                                                         │
//! │   ImagePayload ──► OcrClient ──► ScanGuess ──► CartResolver ──► Cart    │
//! │                     (HTTP)                      │                       │
//! │                                                 │ code / name / expiry  │
//! │                                                 ▼                       │
//! │                                        InventoryDirectory               │
//! │                                                 ▲                       │
//! │                                                 │ FEFO write-backs      │
//! │   Cart ──► CheckoutEngine ──► ReceiptPrinter    │                       │
//! │                 │             (first, always)   │                       │
//! │                 └───────────────────────────────┘                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Collaborators
//!
//! The three outside dependencies are traits so a counter can be wired to
//! SQLite, a real OCR server and a printer, or to scripted stand-ins:
//!
//! - [`InventoryDirectory`], implemented for [`tally_db::Database`]
//! - [`OcrClient`], implemented by [`HttpOcrClient`]
//! - [`ReceiptPrinter`], implemented by [`HtmlFilePrinter`] and [`TextPrinter`]

pub mod capture;
pub mod checkout;
pub mod config;
pub mod directory;
pub mod error;
pub mod ocr;
pub mod printer;
pub mod resolver;
pub mod session;

#[cfg(test)]
mod testing;

pub use capture::ImagePayload;
pub use checkout::{
    AppliedDeduction, CheckoutEngine, CheckoutReport, CheckoutState, DeductionError, Shortfall,
};
pub use config::TallyConfig;
pub use directory::{DirectoryError, DirectoryResult, InventoryDirectory};
pub use error::{BillingError, BillingResult};
pub use ocr::{HttpOcrClient, OcrClient};
pub use printer::{HtmlFilePrinter, PrintDestination, ReceiptPrinter, TextPrinter};
pub use resolver::{CartResolver, MatchedBy, Resolution};
pub use session::{BatchScanSummary, BillingSession, ScanOutcome};
