//! # Seed Inventory
//!
//! Creates the schema and registers inventory lots for development.
//!
//! ## Usage
//! ```bash
//! # Demo lots into the configured database (DATABASE_URL or kunden.db)
//! cargo run -p bestell-db --bin seed
//!
//! # Specific SQLite file
//! cargo run -p bestell-db --bin seed -- --db ./data/kunden.db
//!
//! # Lots from a JSON file (array of NewCharge)
//! cargo run -p bestell-db --bin seed -- --file lots.json
//! ```
//!
//! ## Lot File Format
//! ```json
//! [
//!   { "product_name": "Mug", "color": "Red", "size": "M",
//!     "manufacturer": "Kahla", "delivery_date": "2026-03-01", "amount": 120 }
//! ]
//! ```

use std::env;
use std::fs;

use bestell_core::NewCharge;
use bestell_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;

/// Demo products: (name, colors, sizes)
const PRODUCTS: &[(&str, &[&str], &[&str])] = &[
    ("Mug", &["Red", "Blue", "White", "Black"], &["S", "M", "L"]),
    ("Espresso Cup", &["White", "Black"], &["S"]),
    ("Travel Mug", &["Silver", "Black", "Green"], &["M", "L"]),
    ("Latte Glass", &["Clear"], &["M", "L"]),
];

const MANUFACTURERS: &[&str] = &["Kahla", "Seltmann", "Arzberg"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bestell=debug,sqlx=warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<String> = None;
    let mut lot_file: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--file" | "-f" => {
                if i + 1 < args.len() {
                    lot_file = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bestell Seed Inventory");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>     SQLite file (default: DATABASE_URL, else kunden.db)");
                println!("  -f, --file <JSON>   Register lots from a JSON array instead of demo data");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            other => {
                eprintln!("Ignoring unknown argument '{}'", other);
            }
        }
        i += 1;
    }

    let config = match &db_path {
        Some(path) => DbConfig::new(path),
        None => DbConfig::from_env()?,
    };

    println!("Bestell Seed Inventory");
    println!("======================");
    println!("Database: {}", config.backend.redacted());
    println!();

    let db = Database::new(config).await?;
    println!("✓ Connected to database ({})", db.dialect());
    println!("✓ Schema ready");

    let lots = match &lot_file {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            let lots: Vec<NewCharge> = serde_json::from_str(&text)?;
            println!("Registering {} lots from {}", lots.len(), path);
            lots
        }
        None => {
            let existing = db.ledger().available().await?;
            if !existing.is_empty() {
                println!("⚠ Database already has stock for {} products", existing.len());
                println!("  Skipping demo lots to avoid duplicates.");
                print_stock(&db).await?;
                return Ok(());
            }
            demo_lots()
        }
    };

    let start = std::time::Instant::now();
    let mut registered = 0;

    for lot in &lots {
        match db.ledger().register(lot).await {
            Ok(charge) => {
                registered += 1;
                println!("  {} {} x{}", charge.batch_number, charge.key(), charge.amount);
            }
            Err(e) => eprintln!("Failed to register {}: {}", lot.key(), e),
        }
    }

    println!();
    println!("✓ Registered {} lots in {:?}", registered, start.elapsed());

    print_stock(&db).await?;
    db.close().await;

    Ok(())
}

async fn print_stock(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("Stock:");
    for level in db.ledger().available().await? {
        println!("  {:<32} {:>6}", level.key.to_string(), level.amount);
    }
    Ok(())
}

/// One lot per product variant, spread over the last weeks.
fn demo_lots() -> Vec<NewCharge> {
    let mut lots = Vec::new();
    let mut seed = 0usize;

    for (name, colors, sizes) in PRODUCTS {
        for color in colors.iter() {
            for size in sizes.iter() {
                lots.push(NewCharge {
                    product_name: name.to_string(),
                    supplier_name: Some("Demo Supplier".to_string()),
                    color: color.to_string(),
                    size: size.to_string(),
                    manufacturer: MANUFACTURERS[seed % MANUFACTURERS.len()].to_string(),
                    external_id: Some(format!("EXT-{:04}", seed)),
                    delivery_date: format!("2026-{:02}-{:02}", 1 + seed % 9, 1 + seed % 28),
                    amount: 20 + ((seed * 37) % 180) as i64,
                });
                seed += 1;
            }
        }
    }

    lots
}
