//! # Tally Counter
//!
//! Terminal front-end for one billing counter.
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging, to stderr)
//! 2. Load configuration (`--config <path>`, platform config dir, `TALLY_*`)
//! 3. Connect to the SQLite directory & run migrations, ensure the shop row
//! 4. Build the OCR client and receipt printer
//! 5. Open a billing session and read commands until `quit`
//!
//! ## Usage
//! ```bash
//! cargo run -p tally-db --bin seed -- --db ./tally.db --shop main
//! TALLY_DATABASE_PATH=./tally.db cargo run -p tally-counter
//! ```

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use commands::{Command, HELP};
use tally_billing::{
    BillingError, BillingSession, CheckoutReport, HtmlFilePrinter, HttpOcrClient, ImagePayload,
    InventoryDirectory, ReceiptPrinter, ScanOutcome, TallyConfig, TextPrinter,
};
use tally_core::{Cart, QuantityOutcome, ScanGuess};
use tally_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let Some(config_path) = parse_args()? else {
        return Ok(());
    };

    let config = TallyConfig::load(config_path).context("loading configuration")?;
    info!(shop_id = %config.shop_id(), database = %config.database.path, "Starting Tally counter");

    let db_config = if config.database.path == ":memory:" {
        DbConfig::in_memory()
    } else {
        DbConfig::new(&config.database.path)
    };
    let db = Database::new(db_config)
        .await
        .context("opening the product directory")?;
    db.shops().ensure(&config.shop.id, &config.shop.name).await?;

    let directory: Arc<dyn InventoryDirectory> = Arc::new(db.clone());
    let ocr = Arc::new(HttpOcrClient::new(&config.ocr)?);
    let currency = config.receipt.currency_symbol.clone();
    let printer: Arc<dyn ReceiptPrinter> = match &config.receipt.output_dir {
        Some(dir) => Arc::new(HtmlFilePrinter::new(dir, currency)),
        None => Arc::new(TextPrinter::stdout(config.receipt.paper_width, currency)),
    };

    let mut session = BillingSession::open(directory, ocr, printer, config.shop_id())
        .await?
        .with_name_search_limit(config.resolver.name_search_limit);

    println!("Tally counter for {} ({})", session.shop().name, session.shop().id);
    println!("Type 'help' for commands.");

    let currency = config.receipt.currency_symbol.as_str();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(&session).await?;
        let Some(line) = input.next_line().await? else {
            break;
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(msg) => {
                println!("{}", msg);
                continue;
            }
        };

        if command == Command::Quit {
            if !session.cart().is_empty() {
                warn!(lines = session.cart().len(), "Leaving with an unsettled cart");
            }
            break;
        }

        // Each customer after a checkout or cancel gets a fresh session
        if !session.is_open() {
            session.reopen();
        }

        run(&mut session, command, currency).await;
    }

    db.close().await;
    Ok(())
}

async fn run(session: &mut BillingSession, command: Command, currency: &str) {
    match command {
        Command::Scan(paths) => scan(session, paths).await,
        Command::Code(code) => {
            let guess = ScanGuess::new(Some(code), None, None);
            report_scan(session.add_guess(&guess).await);
        }
        Command::Name { text, expiry } => {
            let guess = ScanGuess::new(None, Some(text), expiry);
            report_scan(session.add_guess(&guess).await);
        }
        Command::Quantity { line, quantity } => {
            let Some(product_id) = product_at(session.cart(), line) else {
                println!("No line {}", line);
                return;
            };
            match session.set_quantity(&product_id, quantity) {
                Ok(QuantityOutcome::Applied { quantity }) => println!("Line {} set to {}", line, quantity),
                Ok(QuantityOutcome::Clamped { requested, applied }) => println!(
                    "Only {} in stock, line {} set to {} (asked for {})",
                    applied, line, applied, requested
                ),
                Err(e) => println!("{}", e),
            }
        }
        Command::Remove(line) => {
            let Some(product_id) = product_at(session.cart(), line) else {
                println!("No line {}", line);
                return;
            };
            match session.remove_line(&product_id) {
                Ok(Some(removed)) => println!("Removed {}", removed.name),
                Ok(None) => println!("No line {}", line),
                Err(e) => println!("{}", e),
            }
        }
        Command::Cart => print_cart(session.cart(), currency),
        Command::Checkout => match session.checkout().await {
            Ok(report) => print_checkout(&report, currency),
            Err(e) => println!("{}", e),
        },
        Command::Cancel => {
            session.cancel();
            println!("Cart discarded.");
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
}

async fn scan(session: &mut BillingSession, paths: Vec<PathBuf>) {
    let mut images = Vec::with_capacity(paths.len());
    for path in &paths {
        match ImagePayload::from_path(path).await {
            Ok(image) => images.push(image),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Image not loaded");
                println!("{}", e);
            }
        }
    }

    match images.as_slice() {
        [] => {}
        [image] => report_scan(session.scan_image(image).await),
        many => match session.scan_batch(many).await {
            Ok(summary) => {
                println!(
                    "{} added, {} incremented, {} already at stock limit, {} failed",
                    summary.added, summary.incremented, summary.at_cap, summary.failed
                );
                for (label, err) in &summary.errors {
                    println!("  {}: {}", label, err);
                }
            }
            Err(e) => println!("{}", e),
        },
    }
}

fn report_scan(result: Result<ScanOutcome, BillingError>) {
    match result {
        Ok(ScanOutcome::Added { name, .. }) => println!("+ {}", name),
        Ok(ScanOutcome::Incremented { name, quantity, .. }) => println!("+ {} (now {})", name, quantity),
        Ok(ScanOutcome::AtCap { name, cap, .. }) => {
            println!("! {} not added: all {} in stock are already in the cart", name, cap)
        }
        Err(e) => println!("{}", e),
    }
}

fn product_at(cart: &Cart, line: usize) -> Option<String> {
    cart.lines()
        .get(line.checked_sub(1)?)
        .map(|l| l.product_id.clone())
}

fn print_cart(cart: &Cart, currency: &str) {
    if cart.is_empty() {
        println!("Cart is empty.");
        return;
    }
    for (i, line) in cart.lines().iter().enumerate() {
        println!(
            "{:>3}. {:<28} {:>4} x {:>10} = {:>10}  (stock {})",
            i + 1,
            line.name,
            line.quantity,
            line.unit_price.format_with(currency),
            line.line_total().format_with(currency),
            line.available_qty
        );
    }
    println!("     Subtotal: {}", cart.subtotal().format_with(currency));
}

fn print_checkout(report: &CheckoutReport, currency: &str) {
    match (&report.printed, &report.print_error) {
        (Some(dest), _) => println!("Receipt sent to {}", dest),
        (None, Some(e)) => println!("Receipt NOT printed: {}", e),
        (None, None) => {}
    }

    for shortfall in &report.shortfalls {
        println!(
            "! {}: {} sold beyond recorded stock",
            shortfall.product_name, shortfall.missing
        );
    }

    match report.error() {
        None => println!(
            "Paid {}. Next customer.",
            report.receipt.subtotal.format_with(currency)
        ),
        Some(e) => {
            println!("{}", e);
            println!("The cart is kept open. Run checkout again to settle the remaining lines.");
        }
    }
}

async fn prompt(session: &BillingSession) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    let lines = session.cart().len();
    stdout
        .write_all(format!("[{} line{}] > ", lines, if lines == 1 { "" } else { "s" }).as_bytes())
        .await?;
    stdout.flush().await
}

/// Returns the config path to use, or `None` when only help was asked for.
fn parse_args() -> anyhow::Result<Option<Option<PathBuf>>> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let Some(path) = args.get(i + 1) else {
                    bail!("--config needs a path");
                };
                config_path = Some(PathBuf::from(path));
                i += 1;
            }
            "--help" | "-h" => {
                println!("Tally POS counter");
                println!();
                println!("Usage: tally-counter [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>    Config file (default: platform config dir)");
                println!("  -h, --help             Show this help message");
                println!();
                println!("{}", HELP);
                return Ok(None);
            }
            other => bail!("unknown argument: {}", other),
        }
        i += 1;
    }

    Ok(Some(config_path))
}

/// Initializes the tracing subscriber for structured logging.
///
/// Logs go to stderr so receipts printed to stdout stay clean.
/// - `RUST_LOG=debug` - Show debug messages
/// - Default: `info,tally=debug,sqlx=warn`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
