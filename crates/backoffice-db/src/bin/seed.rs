//! # Back-Office Seeder
//!
//! Seeds the airline catalog and runs a demo stock scenario.
//!
//! ## Usage
//! ```bash
//! # Database from BACKOFFICE_DB_PATH (default ./backoffice.db)
//! cargo run -p backoffice-db --bin seed
//!
//! # Explicit database path
//! cargo run -p backoffice-db --bin seed -- --db ./data/office.db
//!
//! # Skip the stock demo
//! cargo run -p backoffice-db --bin seed -- --catalog-only
//! ```

use std::env;

use backoffice_core::{MovementDirection, StockItemKey};
use backoffice_db::repository::stock::MovementMetadata;
use backoffice_db::seed::{default_catalog, DEFAULT_CATALOG};
use backoffice_db::{AppConfig, Database};
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Demo receipt and withdrawals: the last one overdraws and is rejected.
const DEMO_MOVEMENTS: &[(MovementDirection, i64, &str)] = &[
    (MovementDirection::In, 80, "BL-DEMO-001"),
    (MovementDirection::Out, 15, "BS-DEMO-001"),
    (MovementDirection::Out, 100, "BS-DEMO-002"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut config = AppConfig::load()?;
    let mut catalog_only = false;

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if let Some(path) = args.get(i + 1) {
                    config.db_path = path.into();
                    i += 1;
                }
            }
            "--catalog-only" => catalog_only = true,
            "--help" | "-h" => {
                println!("Back-Office Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>     Database file path (default: $BACKOFFICE_DB_PATH)");
                println!("      --catalog-only  Seed airlines and rules only");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    println!("Back-Office Seeder");
    println!("==================");
    println!("Database: {}", config.db_path.display());
    println!();

    let db = Database::new(config.db_config()).await?;

    let created = default_catalog(&db, Utc::now()).await?;
    println!(
        "✓ Airline catalog: {} created, {} already present",
        created.len(),
        DEFAULT_CATALOG.len() - created.len()
    );

    if !catalog_only {
        run_stock_demo(&db).await?;
    }

    let drifts = db.stock().verify_balances().await?;
    if drifts.is_empty() {
        println!("✓ Stock balances match the movement ledger");
    } else {
        for drift in &drifts {
            println!(
                "⚠ {}: stored {}, ledger {}",
                drift.item, drift.stored_quantity, drift.recomputed_quantity
            );
        }
        let fixed = db.stock().rebuild_balances().await?;
        println!("✓ Rebuilt {} balances from the ledger", fixed);
    }

    db.close().await;
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

async fn run_stock_demo(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    let key = StockItemKey::new("Ramette A4", "Fournitures", "paquet");

    println!();
    println!("Stock demo: {}", key);

    for (direction, quantity, reference_doc) in DEMO_MOVEMENTS {
        let metadata = MovementMetadata {
            justification: "Démonstration".to_string(),
            reference_doc: reference_doc.to_string(),
            performed_by: "seed".to_string(),
            need_request_id: None,
        };

        match db.stock().post_movement(&key, *direction, *quantity, metadata).await {
            Ok(posted) => println!(
                "  {} {:>4} → balance {}",
                direction, quantity, posted.item.current_quantity
            ),
            Err(err) if err.is_rejection() => {
                println!("  {} {:>4} → rejected: {}", direction, quantity, err.user_message())
            }
            Err(err) => return Err(err.into()),
        }
    }

    info!(item = %key, "Stock demo finished");
    Ok(())
}

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides the default `info,backoffice=debug,sqlx=warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,backoffice=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
