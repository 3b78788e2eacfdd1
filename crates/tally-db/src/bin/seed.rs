//! # Seed Data Generator
//!
//! Populates a database with a demo shop, products and inventory batches.
//!
//! ## Usage
//! ```bash
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path and shop
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db --shop main --shop-name "Corner Grocery"
//! ```
//!
//! ## Generated Data
//! Every product gets two or three batches at the shop with staggered expiry
//! dates (so FEFO has something to do), prices in cents and an occasional
//! discount on the batch closest to expiry.

use chrono::{Duration, Utc};
use std::env;
use tally_db::{Database, DbConfig, NewBatch, NewProduct};

/// (name, code, list price in cents)
const PRODUCTS: &[(&str, Option<&str>, i64)] = &[
    ("Whole Milk 1L", Some("8901234567890"), 120),
    ("Skim Milk 1L", Some("8901234567891"), 115),
    ("Almond Milk 1L", Some("8901234567892"), 299),
    ("Greek Yogurt 500g", Some("8901234567893"), 349),
    ("Cheddar Cheese 200g", Some("8901234567894"), 450),
    ("Salted Butter 250g", Some("8901234567895"), 380),
    ("Brown Bread", Some("BRD-0001"), 250),
    ("White Bread", Some("BRD-0002"), 220),
    ("Eggs Dozen", Some("EGG-0012"), 399),
    ("Orange Juice 1L", Some("8901234567896"), 275),
    ("Apple Juice 1L", Some("8901234567897"), 265),
    ("Basmati Rice 5kg", Some("RICE-0042"), 1299),
    ("Bananas", None, 60),
    ("Tomatoes", None, 90),
];

/// Days until expiry for each generated batch.
const BATCH_OFFSETS: &[i64] = &[3, 14, 45];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tally_dev.db");
    let mut shop_id = String::from("main");
    let mut shop_name = String::from("Corner Grocery");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--shop" | "-s" => {
                if i + 1 < args.len() {
                    shop_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--shop-name" => {
                if i + 1 < args.len() {
                    shop_name = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: ./tally_dev.db)");
                println!("  -s, --shop <ID>        Shop id to stock (default: main)");
                println!("      --shop-name <NAME> Shop display name (default: Corner Grocery)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!("Shop:     {} ({})", shop_name, shop_id);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let shop = db.shops().ensure(&shop_id, &shop_name).await?;
    let today = Utc::now().date_naive();

    let mut batches = 0;
    for (index, (name, code, price_cents)) in PRODUCTS.iter().enumerate() {
        let product = match db.products().insert(&NewProduct::new(*name, *code)).await {
            Ok(product) => product,
            Err(e) => {
                eprintln!("Failed to insert {}: {}", name, e);
                continue;
            }
        };

        // Vary the number of batches so some products have a single one
        let batch_count = 2 + index % 2;
        for (batch_index, offset) in BATCH_OFFSETS.iter().take(batch_count).enumerate() {
            let nearest = batch_index == 0;
            let new = NewBatch {
                product_id: product.id.clone(),
                shop_id: shop.id.clone(),
                quantity: 5 + ((index * 7 + batch_index * 3) % 20) as i64,
                price_cents: *price_cents,
                // Clear the nearest-expiry stock at 20% off on every third product
                discount_bps: if nearest && index % 3 == 0 { 2000 } else { 0 },
                expiry_date: today + Duration::days(*offset),
            };
            db.batches().insert(&new).await?;
            batches += 1;
        }
    }

    println!();
    println!("✓ Inserted {} products and {} batches", db.products().count().await?, batches);

    let sample = db.products().search_by_name("milk", 5).await?;
    println!("  Search 'milk': {} results", sample.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
