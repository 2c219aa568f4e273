//! # Demo Data Seeder
//!
//! Fills a fresh database with the admin account, the three basic
//! categories and a small hot-dog menu so the front-end has something to
//! show. Safe to run repeatedly: anything that already exists (matched by
//! category name or product SKU) is left alone.
//!
//! ```text
//! cargo run -p kiosk-api --bin seed
//! ```

use std::collections::HashMap;

use anyhow::Context;
use kiosk_api::auth::bootstrap_admin;
use kiosk_api::config::AppConfig;
use kiosk_core::{Money, Product};
use kiosk_db::service::catalog::{CategoryInput, NewProduct};
use kiosk_db::service::inventory::ReceiveStock;
use kiosk_db::{Database, DbConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

struct SeedCategory {
    name: &'static str,
    default_pack_size: Option<i64>,
}

const CATEGORIES: &[SeedCategory] = &[
    SeedCategory { name: "Buns", default_pack_size: Some(6) },
    SeedCategory { name: "Sausages", default_pack_size: Some(12) },
    SeedCategory { name: "Drinks", default_pack_size: None },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("Invalid configuration")?;
    if let Some(dir) = config.database_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create data directory {}", dir.display()))?;
    }

    let db = Database::new(DbConfig::new(&config.database_path))
        .await
        .context("Failed to open database")?;

    if bootstrap_admin(&db, &config).await.context("Failed to create admin")? {
        info!(username = %config.admin_username, "Admin account created");
    }
    let admin = db
        .users()
        .find_by_login(&config.admin_username)
        .await?
        .context("Admin account missing")?;

    let categories = seed_categories(&db).await?;
    let products = seed_products(&db, &categories).await?;

    // Opening stock only for products that have never been stocked.
    for (sku, packs, unit_price) in [
        ("BUN-001", 10, Money::from_major_minor(3, 0)),
        ("SAU-001", 5, Money::from_major_minor(18, 0)),
        ("COLA-001", 24, Money::from_major_minor(0, 90)),
    ] {
        let Some(product) = products.get(sku) else { continue };
        if product.stock > 0 {
            continue;
        }
        let receipt = ReceiveStock {
            product_id: product.id.clone(),
            quantity: packs,
            unit_price: Some(unit_price),
            sale_price: None,
            pack_size: None,
            note: Some("Opening stock".to_string()),
        };
        let updated = db.inventory().receive_stock(&receipt, &admin.id).await?;
        info!(sku, stock = updated.stock, "Opening stock received");
    }

    db.close().await;
    info!("Seed complete");
    Ok(())
}

/// Returns category ids by name, creating the missing ones.
async fn seed_categories(db: &Database) -> anyhow::Result<HashMap<&'static str, String>> {
    let existing = db.categories().list().await?;
    let mut ids = HashMap::new();

    for seed in CATEGORIES {
        let id = match existing.iter().find(|c| c.name == seed.name) {
            Some(category) => category.id.clone(),
            None => {
                let input = CategoryInput {
                    name: seed.name.to_string(),
                    default_pack_size: seed.default_pack_size,
                };
                let category = db.catalog().create_category(&input).await?;
                info!(name = seed.name, "Category created");
                category.id
            }
        };
        ids.insert(seed.name, id);
    }
    Ok(ids)
}

/// Returns the seeded products by SKU, creating the missing ones. The hot
/// dog goes last since it references the bun and sausage.
async fn seed_products(
    db: &Database,
    categories: &HashMap<&'static str, String>,
) -> anyhow::Result<HashMap<String, Product>> {
    let mut by_sku: HashMap<String, Product> = db
        .products()
        .all()
        .await?
        .into_iter()
        .map(|p| (p.sku.clone(), p))
        .collect();

    let simple = [
        ("Hot dog bun", "BUN-001", "Buns", 6, Money::from_major_minor(1, 0), Money::from_major_minor(0, 50)),
        ("Pork sausage", "SAU-001", "Sausages", 12, Money::from_major_minor(2, 50), Money::from_major_minor(1, 50)),
        ("Cola 0.5L", "COLA-001", "Drinks", 1, Money::from_major_minor(2, 0), Money::from_major_minor(0, 90)),
    ];

    for (name, sku, category, pack_size, price, cost) in simple {
        if by_sku.contains_key(sku) {
            continue;
        }
        let product = db
            .catalog()
            .create_product(NewProduct {
                name: name.to_string(),
                sku: Some(sku.to_string()),
                category_id: categories.get(category).cloned(),
                price: Some(price),
                cost_price: Some(cost),
                pack_size: Some(pack_size),
                ..Default::default()
            })
            .await?;
        info!(sku, "Product created");
        by_sku.insert(product.sku.clone(), product);
    }

    if !by_sku.contains_key("HOTDOG-001") {
        let bun = by_sku.get("BUN-001").map(|p| p.id.clone());
        let sausage = by_sku.get("SAU-001").map(|p| p.id.clone());
        let product = db
            .catalog()
            .create_product(NewProduct {
                name: "Classic hot dog".to_string(),
                sku: Some("HOTDOG-001".to_string()),
                price: Some(Money::from_major_minor(5, 0)),
                is_composite: Some(true),
                bun_component_id: bun,
                sausage_component_id: sausage,
                sausages_per_unit: Some(1),
                ..Default::default()
            })
            .await?;
        info!(sku = "HOTDOG-001", "Composite product created");
        by_sku.insert(product.sku.clone(), product);
    }

    Ok(by_sku)
}
