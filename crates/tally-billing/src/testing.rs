//! Scripted collaborators for unit tests.
//!
//! Directory, printer and OCR fakes share one event log so tests can assert
//! the order in which the engine touched them.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::capture::ImagePayload;
use crate::directory::{DirectoryError, DirectoryResult, InventoryDirectory};
use crate::error::{BillingError, BillingResult};
use crate::ocr::OcrClient;
use crate::printer::{PrintDestination, ReceiptPrinter};
use tally_core::{BatchStatus, InventoryBatch, Product, Receipt, ScanGuess, Shop};

pub(crate) const SHOP_ID: &str = "shop-1";

pub(crate) type EventLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 1, 9, 0, 0).unwrap()
}

// =============================================================================
// Directory
// =============================================================================

#[derive(Default)]
struct FakeState {
    shops: Vec<Shop>,
    products: Vec<Product>,
    batches: Vec<InventoryBatch>,
    fail_fetch: HashSet<String>,
    fail_update: HashSet<String>,
    fail_all_updates: bool,
}

pub(crate) struct FakeDirectory {
    state: Mutex<FakeState>,
    log: EventLog,
}

impl FakeDirectory {
    pub(crate) fn new() -> Self {
        Self::with_log(Arc::new(Mutex::new(Vec::new())))
    }

    pub(crate) fn with_log(log: EventLog) -> Self {
        let state = FakeState {
            shops: vec![Shop {
                id: SHOP_ID.to_string(),
                name: "Corner Grocery".to_string(),
            }],
            ..FakeState::default()
        };
        FakeDirectory {
            state: Mutex::new(state),
            log,
        }
    }

    pub(crate) fn log(&self) -> EventLog {
        self.log.clone()
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn add_product(&self, name: &str, code: Option<&str>) -> String {
        let mut state = self.state.lock().unwrap();
        let id = format!("p-{}", state.products.len() + 1);
        state.products.push(Product {
            id: id.clone(),
            name: name.to_string(),
            code: code.map(str::to_string),
            is_active: true,
            created_at: epoch(),
        });
        id
    }

    pub(crate) fn add_batch(
        &self,
        product_id: &str,
        quantity: i64,
        price_cents: i64,
        discount_bps: u32,
        expiry: NaiveDate,
    ) -> String {
        self.add_batch_at(product_id, SHOP_ID, quantity, price_cents, discount_bps, expiry)
    }

    pub(crate) fn add_batch_at(
        &self,
        product_id: &str,
        shop_id: &str,
        quantity: i64,
        price_cents: i64,
        discount_bps: u32,
        expiry: NaiveDate,
    ) -> String {
        let mut state = self.state.lock().unwrap();
        let n = state.batches.len() + 1;
        let id = format!("b-{}", n);
        let created = epoch() + Duration::seconds(n as i64);
        state.batches.push(InventoryBatch {
            id: id.clone(),
            product_id: product_id.to_string(),
            shop_id: shop_id.to_string(),
            quantity,
            price_cents,
            discount_bps,
            expiry_date: expiry,
            status: BatchStatus::for_quantity(quantity),
            created_at: created,
            updated_at: created,
        });
        id
    }

    pub(crate) fn batch(&self, id: &str) -> InventoryBatch {
        let state = self.state.lock().unwrap();
        state.batches.iter().find(|b| b.id == id).cloned().unwrap()
    }

    pub(crate) fn fail_fetch_for(&self, product_id: &str) {
        self.state.lock().unwrap().fail_fetch.insert(product_id.to_string());
    }

    pub(crate) fn fail_update_for(&self, product_id: &str) {
        self.state.lock().unwrap().fail_update.insert(product_id.to_string());
    }

    pub(crate) fn fail_all_updates(&self) {
        self.state.lock().unwrap().fail_all_updates = true;
    }

    /// Clears every injected failure.
    pub(crate) fn heal(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_fetch.clear();
        state.fail_update.clear();
        state.fail_all_updates = false;
    }

    fn record(&self, event: String) {
        self.log.lock().unwrap().push(event);
    }
}

#[async_trait]
impl InventoryDirectory for FakeDirectory {
    async fn find_product_by_code(&self, code: &str) -> DirectoryResult<Option<Product>> {
        self.record(format!("code:{}", code));
        let state = self.state.lock().unwrap();
        Ok(state
            .products
            .iter()
            .find(|p| p.is_active && p.code.as_deref() == Some(code))
            .cloned())
    }

    async fn search_products_by_name(
        &self,
        text: &str,
        limit: u32,
    ) -> DirectoryResult<Vec<Product>> {
        self.record(format!("name:{}", text));
        let needle = text.to_lowercase();
        let state = self.state.lock().unwrap();
        let mut found: Vec<Product> = state
            .products
            .iter()
            .filter(|p| p.is_active && p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn has_batch_on(
        &self,
        product_id: &str,
        shop_id: &str,
        expiry: NaiveDate,
    ) -> DirectoryResult<bool> {
        self.record(format!("expiry:{}", product_id));
        let state = self.state.lock().unwrap();
        Ok(state.batches.iter().any(|b| {
            b.product_id == product_id
                && b.shop_id == shop_id
                && b.expiry_date == expiry
                && b.is_available()
        }))
    }

    async fn list_available_batches(
        &self,
        product_id: &str,
        shop_id: &str,
        expiry: Option<NaiveDate>,
    ) -> DirectoryResult<Vec<InventoryBatch>> {
        self.record(format!("fetch:{}", product_id));
        let state = self.state.lock().unwrap();
        if state.fail_fetch.contains(product_id) {
            return Err(DirectoryError("connection reset".to_string()));
        }
        let mut found: Vec<InventoryBatch> = state
            .batches
            .iter()
            .filter(|b| {
                b.product_id == product_id
                    && b.shop_id == shop_id
                    && b.is_available()
                    && expiry.map_or(true, |e| b.expiry_date == e)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.expiry_date
                .cmp(&b.expiry_date)
                .then(a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(found)
    }

    async fn update_batch(
        &self,
        batch_id: &str,
        quantity: i64,
        status: BatchStatus,
    ) -> DirectoryResult<()> {
        self.record(format!("update:{}", batch_id));
        let mut state = self.state.lock().unwrap();
        let fail_all = state.fail_all_updates;
        let failing_products = state.fail_update.clone();
        let batch = state
            .batches
            .iter_mut()
            .find(|b| b.id == batch_id)
            .ok_or_else(|| DirectoryError(format!("InventoryBatch not found: {}", batch_id)))?;
        if fail_all || failing_products.contains(&batch.product_id) {
            return Err(DirectoryError("database is locked".to_string()));
        }
        batch.quantity = quantity;
        batch.status = status;
        Ok(())
    }

    async fn shop(&self, shop_id: &str) -> DirectoryResult<Option<Shop>> {
        let state = self.state.lock().unwrap();
        Ok(state.shops.iter().find(|s| s.id == shop_id).cloned())
    }
}

// =============================================================================
// Printer
// =============================================================================

pub(crate) struct FakePrinter {
    log: EventLog,
    fail: bool,
    printed: Mutex<Vec<Receipt>>,
}

impl FakePrinter {
    pub(crate) fn new(log: EventLog) -> Self {
        FakePrinter {
            log,
            fail: false,
            printed: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(log: EventLog) -> Self {
        FakePrinter {
            fail: true,
            ..FakePrinter::new(log)
        }
    }

    pub(crate) fn printed(&self) -> Vec<Receipt> {
        self.printed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReceiptPrinter for FakePrinter {
    async fn print(&self, receipt: &Receipt) -> BillingResult<PrintDestination> {
        self.log.lock().unwrap().push("print".to_string());
        if self.fail {
            return Err(BillingError::PrintFailed("paper jam".to_string()));
        }
        self.printed.lock().unwrap().push(receipt.clone());
        Ok(PrintDestination::Stream)
    }
}

// =============================================================================
// OCR
// =============================================================================

/// Answers by image label; unknown labels fail like a dead endpoint.
pub(crate) struct FakeOcr {
    answers: Mutex<HashMap<String, VecDeque<ScanGuess>>>,
}

impl FakeOcr {
    pub(crate) fn new() -> Self {
        FakeOcr {
            answers: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn answer(&self, label: &str, guess: ScanGuess) {
        self.answers
            .lock()
            .unwrap()
            .entry(label.to_string())
            .or_default()
            .push_back(guess);
    }
}

#[async_trait]
impl OcrClient for FakeOcr {
    async fn recognize(&self, image: &ImagePayload) -> BillingResult<ScanGuess> {
        let mut answers = self.answers.lock().unwrap();
        answers
            .get_mut(image.label())
            .and_then(|queue| queue.pop_front())
            .ok_or_else(|| BillingError::OcrInvocationFailed("HTTP 503 Service Unavailable".to_string()))
    }
}

pub(crate) fn image(label: &str) -> ImagePayload {
    ImagePayload::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0], label).unwrap()
}

pub(crate) fn code_guess(code: &str) -> ScanGuess {
    ScanGuess::new(Some(code.to_string()), None, None)
}

pub(crate) fn name_guess(name: &str, expiry: Option<NaiveDate>) -> ScanGuess {
    ScanGuess::new(None, Some(name.to_string()), expiry)
}
