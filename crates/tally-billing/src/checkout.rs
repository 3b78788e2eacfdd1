//! # Checkout / Settlement Engine
//!
//! Prints the receipt, then draws every cart line from stock
//! first-expiry-first-out.
//!
//! ## State Machine
//! ```text
//!   ┌──────┐     ┌──────────┐     ┌────────────────────┐
//!   │ Idle │────►│ Printing │────►│ Deducting { i = 0 }│──┐
//!   └──────┘     └──────────┘     └─────────┬──────────┘  │ line i done
//!                 (always runs,             │             │ i += 1
//!                  outcome recorded)        │◄────────────┘
//!                                           │
//!                       ┌───────────────────┼──────────────────────┐
//!                       │ all lines done    │ fetch/update failed  │
//!                       ▼                   ▼                      │
//!                 ┌──────────┐   ┌──────────────────────────────┐  │
//!                 │ Success  │   │ PartialFailure { i, reason } │  │
//!                 └──────────┘   └──────────────────────────────┘  │
//! ```
//!
//! ## Guarantees
//! - The receipt goes to the printer before any stock is read or written,
//!   and a print failure does not stop deduction.
//! - Lines run in cart order, batches within a line soonest expiry first,
//!   one directory call at a time.
//! - Nothing is rolled back. When line `i` fails, lines `0..i` stay deducted,
//!   as do any batches of line `i` written before the failure.
//! - A line whose batches run out before its quantity is covered is a
//!   shortfall: recorded and logged, not a failure.
//!
//! ## Resuming
//! [`CheckoutEngine::resume`] continues after a `PartialFailure`. It takes the
//! earlier report and, per product, deducts only the units that report did
//! not already take. The receipt is printed again only if the first attempt
//! never reached the printer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::directory::InventoryDirectory;
use crate::error::{BillingError, BillingResult};
use crate::printer::{PrintDestination, ReceiptPrinter};
use tally_core::{plan_deduction, BatchStatus, Cart, CartLine, Receipt, Shop};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeductionError {
    BatchFetch { reason: String },
    BatchUpdate { batch_id: String, reason: String },
}

impl std::fmt::Display for DeductionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeductionError::BatchFetch { reason } => write!(f, "batch fetch failed: {}", reason),
            DeductionError::BatchUpdate { batch_id, reason } => {
                write!(f, "update of batch {} failed: {}", batch_id, reason)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutState {
    Idle,
    Printing,
    /// Working on the cart line at this 0-based index.
    Deducting { line_index: usize },
    Success,
    PartialFailure {
        line_index: usize,
        product_id: String,
        product_name: String,
        error: DeductionError,
    },
}

impl CheckoutState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::Success | CheckoutState::PartialFailure { .. })
    }
}

/// One batch write that went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedDeduction {
    pub line_index: usize,
    pub product_id: String,
    pub batch_id: String,
    pub taken: i64,
    pub new_quantity: i64,
    pub new_status: BatchStatus,
}

/// A line that sold more than its batches held at checkout time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub line_index: usize,
    pub product_id: String,
    pub product_name: String,
    pub requested: i64,
    pub missing: i64,
}

#[derive(Debug, Clone)]
pub struct CheckoutReport {
    pub receipt: Receipt,
    /// Set when the printer accepted the receipt.
    pub printed: Option<PrintDestination>,
    pub print_error: Option<String>,
    pub state: CheckoutState,
    pub deductions: Vec<AppliedDeduction>,
    pub shortfalls: Vec<Shortfall>,
}

impl CheckoutReport {
    pub fn is_success(&self) -> bool {
        self.state == CheckoutState::Success
    }

    /// The partial failure as an operator-facing error, line numbers 1-based.
    pub fn error(&self) -> Option<BillingError> {
        let CheckoutState::PartialFailure {
            line_index,
            product_id,
            product_name,
            error,
        } = &self.state
        else {
            return None;
        };

        let line = line_index + 1;
        Some(match error {
            DeductionError::BatchFetch { reason } => BillingError::BatchFetchFailed {
                line,
                product_id: product_id.clone(),
                product_name: product_name.clone(),
                reason: reason.clone(),
            },
            DeductionError::BatchUpdate { batch_id, reason } => BillingError::BatchUpdateFailed {
                line,
                product_id: product_id.clone(),
                product_name: product_name.clone(),
                batch_id: batch_id.clone(),
                reason: reason.clone(),
            },
        })
    }

    pub fn units_deducted(&self) -> i64 {
        self.deductions.iter().map(|d| d.taken).sum()
    }

    /// Units taken from stock so far, per product.
    pub fn settled_units(&self) -> HashMap<&str, i64> {
        let mut settled = HashMap::new();
        for d in &self.deductions {
            *settled.entry(d.product_id.as_str()).or_insert(0) += d.taken;
        }
        settled
    }
}

pub struct CheckoutEngine<'a, D: ?Sized, P: ?Sized> {
    directory: &'a D,
    printer: &'a P,
}

impl<'a, D, P> CheckoutEngine<'a, D, P>
where
    D: InventoryDirectory + ?Sized,
    P: ReceiptPrinter + ?Sized,
{
    pub fn new(directory: &'a D, printer: &'a P) -> Self {
        CheckoutEngine { directory, printer }
    }

    /// Prints and settles `cart` for `shop`.
    ///
    /// Only an empty cart is an `Err`. Every other outcome, partial failure
    /// included, comes back in the report.
    pub async fn run(
        &self,
        cart: &Cart,
        shop: &Shop,
        issued_at: DateTime<Utc>,
    ) -> BillingResult<CheckoutReport> {
        self.settle(cart, shop, issued_at, None).await
    }

    /// Continues a checkout that stopped with a partial failure.
    ///
    /// Deductions and shortfalls of `prior` carry over into the new report,
    /// and a line only draws the units `prior` has not yet taken for its
    /// product. Lowering a quantity below what was already taken does not
    /// put stock back.
    pub async fn resume(
        &self,
        cart: &Cart,
        shop: &Shop,
        issued_at: DateTime<Utc>,
        prior: &CheckoutReport,
    ) -> BillingResult<CheckoutReport> {
        self.settle(cart, shop, issued_at, Some(prior)).await
    }

    async fn settle(
        &self,
        cart: &Cart,
        shop: &Shop,
        issued_at: DateTime<Utc>,
        prior: Option<&CheckoutReport>,
    ) -> BillingResult<CheckoutReport> {
        if cart.is_empty() {
            return Err(BillingError::EmptyCart);
        }

        let mut report = match prior {
            Some(prior) if prior.printed.is_some() => CheckoutReport {
                receipt: prior.receipt.clone(),
                printed: prior.printed.clone(),
                print_error: None,
                state: CheckoutState::Idle,
                deductions: prior.deductions.clone(),
                shortfalls: prior.shortfalls.clone(),
            },
            _ => CheckoutReport {
                receipt: Receipt::from_cart(cart, shop, issued_at),
                printed: None,
                print_error: None,
                state: CheckoutState::Idle,
                deductions: prior.map(|p| p.deductions.clone()).unwrap_or_default(),
                shortfalls: prior.map(|p| p.shortfalls.clone()).unwrap_or_default(),
            },
        };

        if report.printed.is_none() {
            advance(&mut report, CheckoutState::Printing);
            match self.printer.print(&report.receipt).await {
                Ok(dest) => {
                    info!(destination = %dest, subtotal = report.receipt.subtotal.cents(), "Receipt printed");
                    report.printed = Some(dest);
                }
                Err(e) => {
                    warn!(error = %e, "Receipt printing failed, settling stock anyway");
                    report.print_error = Some(e.to_string());
                }
            }
        } else {
            debug!("Receipt already printed, resuming deduction");
        }

        // A line that already came up short is done; its missing units are not owed again
        let mut settled: HashMap<String, i64> = report
            .settled_units()
            .into_iter()
            .map(|(id, units)| (id.to_string(), units))
            .collect();
        for shortfall in &report.shortfalls {
            *settled.entry(shortfall.product_id.clone()).or_insert(0) += shortfall.missing;
        }

        for (line_index, line) in cart.lines().iter().enumerate() {
            advance(&mut report, CheckoutState::Deducting { line_index });

            let owed = line.quantity - settled.get(&line.product_id).copied().unwrap_or(0);
            if owed <= 0 {
                debug!(product_id = %line.product_id, "Line already settled");
                continue;
            }

            if let Err(failure) = self
                .settle_line(&shop.id, line_index, line, owed, &mut report)
                .await
            {
                error!(
                    line = line_index + 1,
                    product_id = %line.product_id,
                    error = %failure,
                    "Checkout stopped, inventory not fully updated"
                );
                advance(
                    &mut report,
                    CheckoutState::PartialFailure {
                        line_index,
                        product_id: line.product_id.clone(),
                        product_name: line.name.clone(),
                        error: failure,
                    },
                );
                return Ok(report);
            }
        }

        advance(&mut report, CheckoutState::Success);
        info!(
            lines = cart.len(),
            units = report.units_deducted(),
            shortfalls = report.shortfalls.len(),
            "Checkout complete"
        );
        Ok(report)
    }

    async fn settle_line(
        &self,
        shop_id: &str,
        line_index: usize,
        line: &CartLine,
        owed: i64,
        report: &mut CheckoutReport,
    ) -> Result<(), DeductionError> {
        let batches = self
            .directory
            .list_available_batches(&line.product_id, shop_id, None)
            .await
            .map_err(|e| DeductionError::BatchFetch { reason: e.to_string() })?;

        let plan = plan_deduction(&batches, owed);

        for step in plan.steps {
            self.directory
                .update_batch(&step.batch_id, step.new_quantity, step.new_status)
                .await
                .map_err(|e| DeductionError::BatchUpdate {
                    batch_id: step.batch_id.clone(),
                    reason: e.to_string(),
                })?;

            debug!(
                batch_id = %step.batch_id,
                taken = step.taken,
                new_quantity = step.new_quantity,
                status = %step.new_status,
                "Batch deducted"
            );
            report.deductions.push(AppliedDeduction {
                line_index,
                product_id: line.product_id.clone(),
                batch_id: step.batch_id,
                taken: step.taken,
                new_quantity: step.new_quantity,
                new_status: step.new_status,
            });
        }

        if plan.shortfall > 0 {
            warn!(
                product_id = %line.product_id,
                requested = owed,
                missing = plan.shortfall,
                "Sold more than the batches held"
            );
            report.shortfalls.push(Shortfall {
                line_index,
                product_id: line.product_id.clone(),
                product_name: line.name.clone(),
                requested: owed,
                missing: plan.shortfall,
            });
        }

        Ok(())
    }
}

fn advance(report: &mut CheckoutReport, next: CheckoutState) {
    debug!(from = ?report.state, to = ?next, "Checkout state");
    report.state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{date, FakeDirectory, FakePrinter, SHOP_ID};
    use chrono::TimeZone;
    use tally_core::{CartLine, Money};

    fn shop() -> Shop {
        Shop {
            id: SHOP_ID.to_string(),
            name: "Corner Grocery".to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
    }

    fn add(cart: &mut Cart, product_id: &str, name: &str, quantity: i64, cap: i64) {
        cart.merge_scanned(CartLine::new(product_id, None, name, Money::from_cents(100), cap))
            .unwrap();
        cart.set_quantity(product_id, quantity).unwrap();
    }

    #[tokio::test]
    async fn test_fefo_across_two_batches() {
        let dir = FakeDirectory::new();
        let printer = FakePrinter::new(dir.log());
        let milk = dir.add_product("Whole Milk 1L", None);
        let later = dir.add_batch(&milk, 10, 120, 0, date(2024, 2, 1));
        let sooner = dir.add_batch(&milk, 10, 120, 0, date(2024, 1, 1));

        let mut cart = Cart::new();
        add(&mut cart, &milk, "Whole Milk 1L", 15, 20);

        let report = CheckoutEngine::new(&dir, &printer)
            .run(&cart, &shop(), now())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.units_deducted(), 15);
        assert!(report.shortfalls.is_empty());

        let first = dir.batch(&sooner);
        assert_eq!(first.quantity, 0);
        assert_eq!(first.status, BatchStatus::SoldOut);
        let second = dir.batch(&later);
        assert_eq!(second.quantity, 5);
        assert_eq!(second.status, BatchStatus::Active);
    }

    #[tokio::test]
    async fn test_receipt_printed_before_any_directory_call() {
        let dir = FakeDirectory::new();
        let printer = FakePrinter::new(dir.log());
        let milk = dir.add_product("Whole Milk 1L", None);
        let batch = dir.add_batch(&milk, 3, 120, 0, date(2024, 1, 1));

        let mut cart = Cart::new();
        add(&mut cart, &milk, "Whole Milk 1L", 2, 3);

        CheckoutEngine::new(&dir, &printer)
            .run(&cart, &shop(), now())
            .await
            .unwrap();

        assert_eq!(
            dir.events(),
            vec![
                "print".to_string(),
                format!("fetch:{}", milk),
                format!("update:{}", batch)
            ]
        );
    }

    #[tokio::test]
    async fn test_update_failure_on_second_of_three_lines() {
        let dir = FakeDirectory::new();
        let printer = FakePrinter::new(dir.log());
        let milk = dir.add_product("Whole Milk 1L", None);
        let bread = dir.add_product("Brown Bread", None);
        let eggs = dir.add_product("Eggs Dozen", None);
        let milk_batch = dir.add_batch(&milk, 5, 120, 0, date(2024, 1, 1));
        dir.add_batch(&bread, 5, 250, 0, date(2024, 1, 1));
        let eggs_batch = dir.add_batch(&eggs, 5, 399, 0, date(2024, 1, 1));
        dir.fail_update_for(&bread);

        let mut cart = Cart::new();
        add(&mut cart, &milk, "Whole Milk 1L", 2, 5);
        add(&mut cart, &bread, "Brown Bread", 1, 5);
        add(&mut cart, &eggs, "Eggs Dozen", 1, 5);

        let report = CheckoutEngine::new(&dir, &printer)
            .run(&cart, &shop(), now())
            .await
            .unwrap();

        assert!(!report.is_success());
        assert!(matches!(
            report.state,
            CheckoutState::PartialFailure { line_index: 1, ref product_id, .. } if *product_id == bread
        ));
        assert_eq!(dir.batch(&milk_batch).quantity, 3);
        assert_eq!(dir.batch(&eggs_batch).quantity, 5);

        let err = report.error().unwrap();
        assert!(err.is_partial_failure());
        assert_eq!(err.failed_product(), Some(bread.as_str()));
        assert!(err.to_string().contains("line 2 (Brown Bread)"));
        assert!(!dir.events().contains(&format!("fetch:{}", eggs)));
    }

    #[tokio::test]
    async fn test_fetch_failure_names_line() {
        let dir = FakeDirectory::new();
        let printer = FakePrinter::new(dir.log());
        let milk = dir.add_product("Whole Milk 1L", None);
        dir.add_batch(&milk, 5, 120, 0, date(2024, 1, 1));
        dir.fail_fetch_for(&milk);

        let mut cart = Cart::new();
        add(&mut cart, &milk, "Whole Milk 1L", 1, 5);

        let report = CheckoutEngine::new(&dir, &printer)
            .run(&cart, &shop(), now())
            .await
            .unwrap();

        assert!(matches!(report.error(), Some(BillingError::BatchFetchFailed { line: 1, .. })));
        assert!(report.deductions.is_empty());
    }

    #[tokio::test]
    async fn test_receipt_printed_when_every_update_fails() {
        let dir = FakeDirectory::new();
        let printer = FakePrinter::new(dir.log());
        let milk = dir.add_product("Whole Milk 1L", None);
        dir.add_batch(&milk, 5, 120, 0, date(2024, 1, 1));
        dir.fail_all_updates();

        let mut cart = Cart::new();
        add(&mut cart, &milk, "Whole Milk 1L", 2, 5);

        let report = CheckoutEngine::new(&dir, &printer)
            .run(&cart, &shop(), now())
            .await
            .unwrap();

        assert_eq!(printer.printed().len(), 1);
        assert_eq!(printer.printed()[0].subtotal.cents(), 200);
        assert_eq!(report.printed, Some(PrintDestination::Stream));
        assert!(matches!(report.error(), Some(BillingError::BatchUpdateFailed { .. })));
    }

    #[tokio::test]
    async fn test_print_failure_does_not_stop_deduction() {
        let dir = FakeDirectory::new();
        let printer = FakePrinter::failing(dir.log());
        let milk = dir.add_product("Whole Milk 1L", None);
        let batch = dir.add_batch(&milk, 5, 120, 0, date(2024, 1, 1));

        let mut cart = Cart::new();
        add(&mut cart, &milk, "Whole Milk 1L", 2, 5);

        let report = CheckoutEngine::new(&dir, &printer)
            .run(&cart, &shop(), now())
            .await
            .unwrap();

        assert!(report.is_success());
        assert!(report.printed.is_none());
        assert!(report.print_error.as_deref().unwrap().contains("paper jam"));
        assert_eq!(dir.batch(&batch).quantity, 3);
    }

    #[tokio::test]
    async fn test_shortfall_is_recorded_not_failed() {
        let dir = FakeDirectory::new();
        let printer = FakePrinter::new(dir.log());
        let milk = dir.add_product("Whole Milk 1L", None);
        let batch = dir.add_batch(&milk, 8, 120, 0, date(2024, 1, 1));

        // Cap snapshot of 10 taken earlier; only 8 left now
        let mut cart = Cart::new();
        add(&mut cart, &milk, "Whole Milk 1L", 10, 10);

        let report = CheckoutEngine::new(&dir, &printer)
            .run(&cart, &shop(), now())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.shortfalls.len(), 1);
        assert_eq!(report.shortfalls[0].missing, 2);
        assert_eq!(dir.batch(&batch).status, BatchStatus::SoldOut);
    }

    #[tokio::test]
    async fn test_resume_deducts_only_what_is_still_owed() {
        let dir = FakeDirectory::new();
        let printer = FakePrinter::new(dir.log());
        let milk = dir.add_product("Whole Milk 1L", None);
        let bread = dir.add_product("Brown Bread", None);
        let eggs = dir.add_product("Eggs Dozen", None);
        let milk_batch = dir.add_batch(&milk, 5, 120, 0, date(2024, 1, 1));
        let bread_batch = dir.add_batch(&bread, 5, 250, 0, date(2024, 1, 1));
        let eggs_batch = dir.add_batch(&eggs, 5, 399, 0, date(2024, 1, 1));
        dir.fail_update_for(&bread);

        let mut cart = Cart::new();
        add(&mut cart, &milk, "Whole Milk 1L", 2, 5);
        add(&mut cart, &bread, "Brown Bread", 1, 5);
        add(&mut cart, &eggs, "Eggs Dozen", 1, 5);

        let engine = CheckoutEngine::new(&dir, &printer);
        let first = engine.run(&cart, &shop(), now()).await.unwrap();
        assert!(!first.is_success());

        dir.heal();
        let second = engine.resume(&cart, &shop(), now(), &first).await.unwrap();

        assert!(second.is_success());
        assert_eq!(printer.printed().len(), 1);
        assert_eq!(dir.batch(&milk_batch).quantity, 3);
        assert_eq!(dir.batch(&bread_batch).quantity, 4);
        assert_eq!(dir.batch(&eggs_batch).quantity, 4);
        assert_eq!(second.units_deducted(), 4);
        assert_eq!(second.settled_units().get(milk.as_str()), Some(&2));
    }

    #[tokio::test]
    async fn test_resume_prints_when_first_attempt_could_not() {
        let dir = FakeDirectory::new();
        let jammed = FakePrinter::failing(dir.log());
        let milk = dir.add_product("Whole Milk 1L", None);
        let batch = dir.add_batch(&milk, 5, 120, 0, date(2024, 1, 1));
        dir.fail_all_updates();

        let mut cart = Cart::new();
        add(&mut cart, &milk, "Whole Milk 1L", 2, 5);

        let first = CheckoutEngine::new(&dir, &jammed)
            .run(&cart, &shop(), now())
            .await
            .unwrap();
        assert!(first.printed.is_none());

        dir.heal();
        let printer = FakePrinter::new(dir.log());
        let second = CheckoutEngine::new(&dir, &printer)
            .resume(&cart, &shop(), now(), &first)
            .await
            .unwrap();

        assert!(second.is_success());
        assert_eq!(printer.printed().len(), 1);
        assert_eq!(second.printed, Some(PrintDestination::Stream));
        assert_eq!(dir.batch(&batch).quantity, 3);
    }

    #[tokio::test]
    async fn test_resume_does_not_repeat_a_shortfall() {
        let dir = FakeDirectory::new();
        let printer = FakePrinter::new(dir.log());
        let milk = dir.add_product("Whole Milk 1L", None);
        let bread = dir.add_product("Brown Bread", None);
        dir.add_batch(&milk, 8, 120, 0, date(2024, 1, 1));
        dir.add_batch(&bread, 5, 250, 0, date(2024, 1, 1));
        dir.fail_update_for(&bread);

        let mut cart = Cart::new();
        add(&mut cart, &milk, "Whole Milk 1L", 10, 10);
        add(&mut cart, &bread, "Brown Bread", 1, 5);

        let engine = CheckoutEngine::new(&dir, &printer);
        let first = engine.run(&cart, &shop(), now()).await.unwrap();
        assert_eq!(first.shortfalls.len(), 1);

        dir.heal();
        let second = engine.resume(&cart, &shop(), now(), &first).await.unwrap();

        assert!(second.is_success());
        assert_eq!(second.shortfalls.len(), 1);
        assert_eq!(
            dir.events().iter().filter(|e| *e == &format!("fetch:{}", milk)).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_empty_cart_prints_nothing() {
        let dir = FakeDirectory::new();
        let printer = FakePrinter::new(dir.log());

        let err = CheckoutEngine::new(&dir, &printer)
            .run(&Cart::new(), &shop(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::EmptyCart));
        assert!(dir.events().is_empty());
    }
}
