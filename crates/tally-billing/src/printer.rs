//! # Receipt Printers
//!
//! Where a rendered receipt goes. The checkout engine calls the printer
//! before touching stock; what it does with the document is up to the
//! implementation.
//!
//! - [`HtmlFilePrinter`] writes `receipt-<timestamp>.html` for a browser to
//!   print (the page calls `window.print()` on load).
//! - [`TextPrinter`] writes the fixed-width text rendering to any sink, stdout
//!   in the counter app.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{BillingError, BillingResult};
use tally_core::Receipt;

/// Where a printed receipt ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintDestination {
    File(PathBuf),
    Stream,
}

impl std::fmt::Display for PrintDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrintDestination::File(path) => write!(f, "{}", path.display()),
            PrintDestination::Stream => write!(f, "terminal"),
        }
    }
}

#[async_trait]
pub trait ReceiptPrinter: Send + Sync {
    async fn print(&self, receipt: &Receipt) -> BillingResult<PrintDestination>;
}

// =============================================================================
// HTML file
// =============================================================================

pub struct HtmlFilePrinter {
    dir: PathBuf,
    currency: String,
}

impl HtmlFilePrinter {
    pub fn new(dir: impl Into<PathBuf>, currency: impl Into<String>) -> Self {
        HtmlFilePrinter {
            dir: dir.into(),
            currency: currency.into(),
        }
    }

    fn file_name(receipt: &Receipt) -> String {
        format!(
            "receipt-{}.html",
            receipt.issued_at.format("%Y%m%d-%H%M%S-%3f")
        )
    }
}

#[async_trait]
impl ReceiptPrinter for HtmlFilePrinter {
    async fn print(&self, receipt: &Receipt) -> BillingResult<PrintDestination> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BillingError::PrintFailed(format!("{}: {}", self.dir.display(), e)))?;

        let path = self.dir.join(Self::file_name(receipt));
        let html = receipt.render_html(&self.currency);
        tokio::fs::write(&path, html)
            .await
            .map_err(|e| BillingError::PrintFailed(format!("{}: {}", path.display(), e)))?;

        info!(path = %path.display(), lines = receipt.lines.len(), "Receipt written");
        Ok(PrintDestination::File(path))
    }
}

// =============================================================================
// Text stream
// =============================================================================

pub struct TextPrinter<W> {
    out: Mutex<W>,
    width: usize,
    currency: String,
}

impl<W: Write + Send> TextPrinter<W> {
    pub fn new(out: W, width: usize, currency: impl Into<String>) -> Self {
        TextPrinter {
            out: Mutex::new(out),
            width,
            currency: currency.into(),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl TextPrinter<std::io::Stdout> {
    pub fn stdout(width: usize, currency: impl Into<String>) -> Self {
        Self::new(std::io::stdout(), width, currency)
    }
}

#[async_trait]
impl<W: Write + Send> ReceiptPrinter for TextPrinter<W> {
    async fn print(&self, receipt: &Receipt) -> BillingResult<PrintDestination> {
        let text = receipt.render_text(self.width, &self.currency);
        let mut out = self
            .out
            .lock()
            .map_err(|_| BillingError::PrintFailed("printer output poisoned".into()))?;

        out.write_all(text.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| BillingError::PrintFailed(e.to_string()))?;

        debug!(width = self.width, lines = receipt.lines.len(), "Receipt printed");
        Ok(PrintDestination::Stream)
    }
}
