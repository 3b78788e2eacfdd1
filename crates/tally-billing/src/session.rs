//! # Billing Session
//!
//! One customer at one counter: an empty cart when it opens, scans and edits
//! while it is open, and either a checkout or a cancel to finish.
//!
//! ```text
//!   open ──► [ scan_image | scan_batch | add_guess | set_quantity | remove_line ]* ──┬──► checkout
//!                                                                                   │     ├─ Success ─────► cart cleared, closed
//!                                                                                   │     └─ PartialFailure► cart kept, still open
//!                                                                                   └──► cancel ──────────► cart cleared, closed
//! ```
//!
//! A closed session rejects further work with `SessionClosed` until
//! [`BillingSession::reopen`] starts the next customer.
//!
//! Calling `checkout` again after a partial failure resumes the earlier
//! attempt: units already taken from stock are not taken twice, and the
//! receipt is not printed a second time once it has been.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::capture::ImagePayload;
use crate::checkout::{CheckoutEngine, CheckoutReport};
use crate::directory::InventoryDirectory;
use crate::error::{BillingError, BillingResult};
use crate::ocr::OcrClient;
use crate::printer::ReceiptPrinter;
use crate::resolver::{CartResolver, MatchedBy};
use tally_core::{
    Cart, CartLine, MergeOutcome, Money, QuantityOutcome, ScanGuess, Shop,
    DEFAULT_NAME_SEARCH_LIMIT,
};

/// What a successful scan did to the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Added {
        product_id: String,
        name: String,
        matched_by: MatchedBy,
    },
    Incremented {
        product_id: String,
        name: String,
        quantity: i64,
    },
    /// The line already holds every available unit; the cart is unchanged.
    AtCap {
        product_id: String,
        name: String,
        cap: i64,
    },
}

/// Tally of a multi-image scan.
#[derive(Debug, Default)]
pub struct BatchScanSummary {
    pub added: usize,
    pub incremented: usize,
    pub at_cap: usize,
    pub failed: usize,
    /// Image label and what went wrong, in scan order.
    pub errors: Vec<(String, BillingError)>,
}

impl BatchScanSummary {
    pub fn total(&self) -> usize {
        self.added + self.incremented + self.at_cap + self.failed
    }
}

pub struct BillingSession {
    directory: Arc<dyn InventoryDirectory>,
    ocr: Arc<dyn OcrClient>,
    printer: Arc<dyn ReceiptPrinter>,
    shop: Shop,
    cart: Cart,
    open: bool,
    name_search_limit: u32,
    /// Report of the last checkout that stopped part way.
    unsettled: Option<CheckoutReport>,
}

impl std::fmt::Debug for BillingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingSession")
            .field("shop", &self.shop.id)
            .field("lines", &self.cart.len())
            .field("open", &self.open)
            .field("unsettled", &self.unsettled.is_some())
            .finish_non_exhaustive()
    }
}

impl BillingSession {
    /// Opens a session with an empty cart for `shop_id`.
    pub async fn open(
        directory: Arc<dyn InventoryDirectory>,
        ocr: Arc<dyn OcrClient>,
        printer: Arc<dyn ReceiptPrinter>,
        shop_id: &str,
    ) -> BillingResult<Self> {
        let shop = directory
            .shop(shop_id)
            .await?
            .ok_or_else(|| BillingError::ShopNotFound(shop_id.to_string()))?;

        info!(shop_id = %shop.id, shop = %shop.name, "Billing session opened");
        Ok(BillingSession {
            directory,
            ocr,
            printer,
            shop,
            cart: Cart::new(),
            open: true,
            name_search_limit: DEFAULT_NAME_SEARCH_LIMIT,
            unsettled: None,
        })
    }

    pub fn with_name_search_limit(mut self, limit: u32) -> Self {
        self.name_search_limit = limit;
        self
    }

    pub fn shop(&self) -> &Shop {
        &self.shop
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn subtotal(&self) -> Money {
        self.cart.subtotal()
    }

    fn ensure_open(&self) -> BillingResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(BillingError::SessionClosed)
        }
    }

    // =========================================================================
    // Scanning
    // =========================================================================

    /// Reads one label photo and adds what it shows.
    pub async fn scan_image(&mut self, image: &ImagePayload) -> BillingResult<ScanOutcome> {
        self.ensure_open()?;
        let guess = self.ocr.recognize(image).await?;
        self.add_guess(&guess).await
    }

    /// Adds a product from a typed or already-recognised guess.
    pub async fn add_guess(&mut self, guess: &ScanGuess) -> BillingResult<ScanOutcome> {
        self.ensure_open()?;

        let resolution = CartResolver::new(self.directory.as_ref(), &self.shop.id)
            .with_name_search_limit(self.name_search_limit)
            .resolve(guess)
            .await?;

        let product_id = resolution.product.id.clone();
        let name = resolution.product.name.clone();

        let outcome = match self.cart.merge_scanned(resolution.to_cart_line())? {
            MergeOutcome::Added => {
                info!(product_id = %product_id, name = %name, "Line added");
                ScanOutcome::Added {
                    product_id,
                    name,
                    matched_by: resolution.matched_by,
                }
            }
            MergeOutcome::Incremented { quantity } => {
                debug!(product_id = %product_id, quantity, "Line incremented");
                ScanOutcome::Incremented {
                    product_id,
                    name,
                    quantity,
                }
            }
            MergeOutcome::AtCap { cap } => {
                warn!(product_id = %product_id, cap, "All available stock already in cart");
                ScanOutcome::AtCap {
                    product_id,
                    name,
                    cap,
                }
            }
        };
        Ok(outcome)
    }

    /// Scans images one after another. A failed image is logged and counted;
    /// the rest still go through.
    pub async fn scan_batch(&mut self, images: &[ImagePayload]) -> BillingResult<BatchScanSummary> {
        self.ensure_open()?;

        let mut summary = BatchScanSummary::default();
        for image in images {
            match self.scan_image(image).await {
                Ok(ScanOutcome::Added { .. }) => summary.added += 1,
                Ok(ScanOutcome::Incremented { .. }) => summary.incremented += 1,
                Ok(ScanOutcome::AtCap { .. }) => summary.at_cap += 1,
                Err(e) => {
                    warn!(image = %image.label(), error = %e, "Image skipped");
                    summary.failed += 1;
                    summary.errors.push((image.label().to_string(), e));
                }
            }
        }

        info!(
            images = images.len(),
            added = summary.added,
            incremented = summary.incremented,
            at_cap = summary.at_cap,
            failed = summary.failed,
            "Batch scan finished"
        );
        Ok(summary)
    }

    // =========================================================================
    // Editing
    // =========================================================================

    pub fn set_quantity(&mut self, product_id: &str, n: i64) -> BillingResult<QuantityOutcome> {
        self.ensure_open()?;
        let outcome = self.cart.set_quantity(product_id, n)?;
        if let QuantityOutcome::Clamped { requested, applied } = outcome {
            warn!(product_id = %product_id, requested, applied, "Quantity clamped to available stock");
        }
        Ok(outcome)
    }

    pub fn remove_line(&mut self, product_id: &str) -> BillingResult<Option<CartLine>> {
        self.ensure_open()?;
        let removed = self.cart.remove_line(product_id);
        if removed.is_some() {
            debug!(product_id = %product_id, "Line removed");
        }
        Ok(removed)
    }

    // =========================================================================
    // Finishing
    // =========================================================================

    /// Prints the receipt and settles stock.
    ///
    /// On success the cart is cleared and the session closes. On partial
    /// failure both stay as they are so the operator can see what was sold;
    /// [`CheckoutReport::error`] names the line that stopped. The next
    /// `checkout` picks up from that report rather than starting over.
    pub async fn checkout(&mut self) -> BillingResult<CheckoutReport> {
        self.ensure_open()?;

        let engine = CheckoutEngine::new(self.directory.as_ref(), self.printer.as_ref());
        let report = match &self.unsettled {
            Some(prior) => {
                info!(units = prior.units_deducted(), "Resuming interrupted checkout");
                engine.resume(&self.cart, &self.shop, Utc::now(), prior).await?
            }
            None => engine.run(&self.cart, &self.shop, Utc::now()).await?,
        };

        if report.is_success() {
            self.cart.clear();
            self.unsettled = None;
            self.open = false;
            info!(shop_id = %self.shop.id, "Billing session closed after checkout");
        } else {
            if let Some(err) = report.error() {
                error!(error = %err, "Session kept open for reconciliation");
            }
            self.unsettled = Some(report.clone());
        }
        Ok(report)
    }

    /// Discards the cart and closes the session.
    pub fn cancel(&mut self) {
        if !self.cart.is_empty() {
            info!(lines = self.cart.len(), "Cart discarded");
        }
        if let Some(prior) = self.unsettled.take() {
            warn!(
                units = prior.units_deducted(),
                "Cart discarded after a partial checkout, stock already taken stays taken"
            );
        }
        self.cart.clear();
        self.open = false;
    }

    /// Starts the next customer with an empty cart.
    pub fn reopen(&mut self) {
        self.cart.clear();
        self.unsettled = None;
        self.open = true;
        debug!(shop_id = %self.shop.id, "Billing session reopened");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::CheckoutState;
    use crate::testing::{
        code_guess, date, image, name_guess, FakeDirectory, FakeOcr, FakePrinter, SHOP_ID,
    };

    struct Rig {
        dir: Arc<FakeDirectory>,
        ocr: Arc<FakeOcr>,
        printer: Arc<FakePrinter>,
    }

    impl Rig {
        fn new() -> Self {
            let dir = Arc::new(FakeDirectory::new());
            let printer = Arc::new(FakePrinter::new(dir.log()));
            Rig {
                dir,
                ocr: Arc::new(FakeOcr::new()),
                printer,
            }
        }

        async fn open(&self) -> BillingSession {
            BillingSession::open(self.dir.clone(), self.ocr.clone(), self.printer.clone(), SHOP_ID)
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_open_unknown_shop() {
        let rig = Rig::new();
        let err = BillingSession::open(rig.dir.clone(), rig.ocr.clone(), rig.printer.clone(), "nowhere")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BillingError::ShopNotFound(ref s) if s == "nowhere"));
    }

    #[tokio::test]
    async fn test_rescan_increments_until_cap() {
        let rig = Rig::new();
        let milk = rig.dir.add_product("Whole Milk 1L", Some("8901234567890"));
        rig.dir.add_batch(&milk, 2, 120, 0, date(2024, 1, 1));
        let mut session = rig.open().await;

        let guess = code_guess("8901234567890");
        assert!(matches!(
            session.add_guess(&guess).await.unwrap(),
            ScanOutcome::Added { matched_by: MatchedBy::Code, .. }
        ));
        assert!(matches!(
            session.add_guess(&guess).await.unwrap(),
            ScanOutcome::Incremented { quantity: 2, .. }
        ));
        assert!(matches!(
            session.add_guess(&guess).await.unwrap(),
            ScanOutcome::AtCap { cap: 2, .. }
        ));
        assert_eq!(session.cart().line(&milk).unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_failed_scans_leave_cart_alone() {
        let rig = Rig::new();
        let milk = rig.dir.add_product("Whole Milk 1L", None);
        rig.dir.add_batch(&milk, 0, 120, 0, date(2024, 1, 1));
        let mut session = rig.open().await;

        let err = session.add_guess(&name_guess("caviar", None)).await.unwrap_err();
        assert!(matches!(err, BillingError::ProductNotFound { .. }));
        let err = session.add_guess(&name_guess("milk", None)).await.unwrap_err();
        assert!(matches!(err, BillingError::OutOfStock { .. }));
        let err = session.scan_image(&image("blurry.jpg")).await.unwrap_err();
        assert!(matches!(err, BillingError::OcrInvocationFailed(_)));

        assert!(session.cart().is_empty());
        assert!(session.is_open());
    }

    #[tokio::test]
    async fn test_scan_batch_continues_past_failures() {
        let rig = Rig::new();
        let milk = rig.dir.add_product("Whole Milk 1L", Some("8901234567890"));
        let bread = rig.dir.add_product("Brown Bread", None);
        rig.dir.add_batch(&milk, 5, 120, 0, date(2024, 1, 1));
        rig.dir.add_batch(&bread, 5, 250, 0, date(2024, 1, 1));

        rig.ocr.answer("a.jpg", code_guess("8901234567890"));
        rig.ocr.answer("c.jpg", name_guess("bread", None));
        rig.ocr.answer("d.jpg", code_guess("8901234567890"));
        rig.ocr.answer("e.jpg", name_guess("unicorn", None));

        let images = ["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"].map(image);
        let mut session = rig.open().await;
        let summary = session.scan_batch(&images).await.unwrap();

        assert_eq!(summary.added, 2);
        assert_eq!(summary.incremented, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.total(), 5);
        assert_eq!(summary.errors[0].0, "b.jpg");
        assert!(matches!(summary.errors[1].1, BillingError::ProductNotFound { .. }));

        assert_eq!(session.cart().line(&milk).unwrap().quantity, 2);
        assert_eq!(session.cart().line(&bread).unwrap().quantity, 1);
        assert_eq!(session.subtotal().cents(), 490);
    }

    #[tokio::test]
    async fn test_set_quantity_clamps_and_rejects() {
        let rig = Rig::new();
        let milk = rig.dir.add_product("Whole Milk 1L", None);
        rig.dir.add_batch(&milk, 4, 120, 0, date(2024, 1, 1));
        let mut session = rig.open().await;
        session.add_guess(&name_guess("milk", None)).await.unwrap();

        assert_eq!(
            session.set_quantity(&milk, 9).unwrap(),
            QuantityOutcome::Clamped { requested: 9, applied: 4 }
        );
        assert!(session.set_quantity(&milk, 0).is_err());
        assert!(matches!(
            session.set_quantity("p-missing", 1),
            Err(BillingError::Core(_))
        ));
        assert_eq!(session.cart().line(&milk).unwrap().quantity, 4);

        assert!(session.remove_line(&milk).unwrap().is_some());
        assert!(session.remove_line(&milk).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_successful_checkout_clears_and_closes() {
        let rig = Rig::new();
        let milk = rig.dir.add_product("Whole Milk 1L", None);
        let batch = rig.dir.add_batch(&milk, 4, 120, 0, date(2024, 1, 1));
        let mut session = rig.open().await;
        session.add_guess(&name_guess("milk", None)).await.unwrap();

        let report = session.checkout().await.unwrap();
        assert_eq!(report.state, CheckoutState::Success);
        assert!(session.cart().is_empty());
        assert!(!session.is_open());
        assert_eq!(rig.dir.batch(&batch).quantity, 3);

        let err = session.add_guess(&name_guess("milk", None)).await.unwrap_err();
        assert!(matches!(err, BillingError::SessionClosed));

        session.reopen();
        assert!(session.add_guess(&name_guess("milk", None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_cart_open() {
        let rig = Rig::new();
        let milk = rig.dir.add_product("Whole Milk 1L", None);
        rig.dir.add_batch(&milk, 4, 120, 0, date(2024, 1, 1));
        rig.dir.fail_update_for(&milk);
        let mut session = rig.open().await;
        session.add_guess(&name_guess("milk", None)).await.unwrap();

        let report = session.checkout().await.unwrap();
        assert!(report.error().unwrap().is_partial_failure());
        assert_eq!(rig.printer.printed().len(), 1);
        assert_eq!(session.cart().len(), 1);
        assert!(session.is_open());
    }

    #[tokio::test]
    async fn test_retried_checkout_settles_each_line_once() {
        let rig = Rig::new();
        let milk = rig.dir.add_product("Whole Milk 1L", Some("1000001"));
        let bread = rig.dir.add_product("Brown Bread", Some("1000002"));
        let milk_batch = rig.dir.add_batch(&milk, 5, 120, 0, date(2024, 1, 1));
        let bread_batch = rig.dir.add_batch(&bread, 5, 250, 0, date(2024, 1, 1));
        rig.dir.fail_update_for(&bread);
        let mut session = rig.open().await;
        session.add_guess(&code_guess("1000001")).await.unwrap();
        session.add_guess(&code_guess("1000001")).await.unwrap();
        session.add_guess(&code_guess("1000002")).await.unwrap();

        let first = session.checkout().await.unwrap();
        assert!(!first.is_success());
        assert_eq!(rig.dir.batch(&milk_batch).quantity, 3);

        rig.dir.heal();
        let second = session.checkout().await.unwrap();

        assert!(second.is_success());
        assert_eq!(rig.printer.printed().len(), 1);
        assert_eq!(rig.dir.batch(&milk_batch).quantity, 3);
        assert_eq!(rig.dir.batch(&bread_batch).quantity, 4);
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_empty_checkout_and_cancel() {
        let rig = Rig::new();
        let milk = rig.dir.add_product("Whole Milk 1L", None);
        rig.dir.add_batch(&milk, 4, 120, 0, date(2024, 1, 1));
        let mut session = rig.open().await;

        assert!(matches!(session.checkout().await, Err(BillingError::EmptyCart)));
        assert!(rig.printer.printed().is_empty());

        session.add_guess(&name_guess("milk", None)).await.unwrap();
        session.cancel();
        assert!(session.cart().is_empty());
        assert!(!session.is_open());
        assert!(matches!(session.checkout().await, Err(BillingError::SessionClosed)));
    }
}
