//! # Seed Data Generator
//!
//! Fills a SQLite store with demo inventory and a few weeks of sales.
//!
//! ## Usage
//! ```bash
//! # 21 days of sales for the default demo shop
//! cargo run -p tillbook-db --bin seed
//!
//! # Custom shop, history length and database
//! cargo run -p tillbook-db --bin seed -- --contact owner@corner.shop --days 60 --db ./data/tillbook.db
//! ```
//!
//! ## Generated Data
//! - A dozen inventory items (bakery, dairy, produce, pantry)
//! - Per day: a handful of quick sales plus itemized sales that draw stock
//!   down through the ledger, so bucket totals and stock levels agree

use chrono::{Duration, Utc};
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tillbook_core::{Money, NewInventoryItem, ShopSession};
use tillbook_db::{
    DbConfig, InventoryCoordinator, LedgerAggregator, LedgerSettings, SqliteDocumentStore,
};

/// Demo inventory: (name, price in cents, stock, unit).
const PRODUCTS: &[(&str, i64, u64, &str)] = &[
    ("Sourdough Loaf", 450, 40, "loaf"),
    ("Whole Wheat Bread", 320, 60, "loaf"),
    ("Croissant", 180, 120, "pcs"),
    ("Whole Milk 1L", 149, 80, "bottle"),
    ("Greek Yogurt", 229, 50, "cup"),
    ("Cheddar Block", 599, 25, "pcs"),
    ("Free Range Eggs (12)", 389, 45, "box"),
    ("Bananas", 79, 200, "kg"),
    ("Tomatoes", 299, 90, "kg"),
    ("Basmati Rice 5kg", 1299, 20, "bag"),
    ("Olive Oil 500ml", 849, 30, "bottle"),
    ("Ground Coffee", 1099, 35, "bag"),
];

const DEFAULT_CONTACT: &str = "demo@tillbook.local";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tillbook_dev.db");
    let mut contact = String::from(DEFAULT_CONTACT);
    let mut days: i64 = 21;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--contact" | "-c" => {
                if i + 1 < args.len() {
                    contact = args[i + 1].clone();
                    i += 1;
                }
            }
            "--days" | "-n" => {
                if i + 1 < args.len() {
                    days = args[i + 1].parse().unwrap_or(21);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tillbook Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Database file path (default: ./tillbook_dev.db)");
                println!("  -c, --contact <CONTACT>  Shop owner contact (default: {DEFAULT_CONTACT})");
                println!("  -n, --days <N>           Days of sales history (default: 21)");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let session = ShopSession::from_contact(&contact)?;
    let store = Arc::new(SqliteDocumentStore::new(DbConfig::new(&db_path)).await?);
    info!(db = %db_path, contact = %contact, days, "Connected to database");

    let inventory = InventoryCoordinator::new(store.clone());
    let ledger = LedgerAggregator::new(store, LedgerSettings::default());

    if !inventory.get_all_inventory(&session).await?.is_empty() {
        warn!("Shop already has inventory, skipping seed. Delete the database file to regenerate.");
        return Ok(());
    }

    let mut product_ids = Vec::with_capacity(PRODUCTS.len());
    for (name, price, stock, unit) in PRODUCTS {
        let item = NewInventoryItem {
            product_name: name.to_string(),
            unit_price: Money::from_cents(*price),
            stock_amount: *stock,
            unit: unit.to_string(),
        };
        if let Some(item) = inventory.upsert_item(&session, item).await? {
            product_ids.push(item.product_id);
        }
    }
    info!(count = product_ids.len(), "Inventory seeded");

    let start = std::time::Instant::now();
    let now = Utc::now();
    let mut sales = 0usize;

    for day in (0..days.max(0)).rev() {
        let base = now - Duration::days(day);
        let seed = day as usize;

        // quick sales
        for n in 0..(2 + seed % 4) {
            let amount = Money::from_cents(250 + ((seed * 37 + n * 113) % 2500) as i64);
            let at = base - Duration::minutes((n * 47) as i64);
            ledger.record_sale_at(&session, amount, at).await?;
            sales += 1;
        }

        // itemized sales
        for n in 0..(1 + seed % 3) {
            let at = base - Duration::minutes((n * 61 + 15) as i64);
            let Some(sale) = ledger.open_sale_at(&session, at).await? else {
                continue;
            };
            for k in 0..(1 + (seed + n) % 3) {
                let product_id = &product_ids[(seed * 5 + n * 3 + k) % product_ids.len()];
                let quantity = 1 + ((seed + k) % 3) as u32;
                ledger
                    .add_line_item(&session, &sale.id, product_id, quantity)
                    .await?;
            }
            sales += 1;
        }
    }

    let overview = ledger.period_overview(&session).await?;
    info!(
        sales,
        elapsed_ms = start.elapsed().as_millis() as u64,
        today = %overview.today.total_revenue,
        week = %overview.week.total_revenue,
        month = %overview.month.total_revenue,
        all_time = %overview.all_time.total_revenue,
        "Seed complete"
    );

    for item in inventory.low_stock(&session, 10).await? {
        info!(product_id = %item.product_id, stock_amount = item.stock_amount, "Low stock");
    }

    Ok(())
}

/// Logs to stderr; `RUST_LOG` overrides the default `info` level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
