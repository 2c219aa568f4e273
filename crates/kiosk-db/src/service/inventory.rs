//! # Inventory Service
//!
//! Stock receipts and write-offs. Each call changes `products.stock`,
//! appends a ledger row and queues a notification in one unit of work.
//!
//! ## Receipt Normalization
//! ```text
//! POST /stock/in { quantity: 5, unitPrice: 12.00 }   (5 packs at 12.00)
//!       │
//!       ▼  pack size: intake > product > category > keyword rule > 1
//!       │  "Pork Sausage" in category "Sausages" → 12
//!       ▼
//! stock += 60, costPrice = 1.00, movement IN { quantity: 60, unitCost: 1.00 }
//! ```

use kiosk_core::composite::ensure_holds_stock;
use kiosk_core::message::{stock_in_message, stock_out_message, StockNotice};
use kiosk_core::pack_size::{normalize_intake, PackSizeSource, PackSizeTable};
use kiosk_core::validation::{validate_non_negative_money, validate_pack_size, validate_stock_quantity};
use kiosk_core::{CoreError, Money, MovementType, Product};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::movement::NewMovement;
use crate::repository::outbox::NotificationKind;
use crate::unit_of_work::UnitOfWork;

/// A stock receipt. `quantity` and `unit_price` are per purchased pack.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveStock {
    pub product_id: String,
    pub quantity: i64,
    /// Purchase price of one pack.
    pub unit_price: Option<Money>,
    /// New shelf price, if it changed.
    pub sale_price: Option<Money>,
    /// Units per pack for this receipt; stored on the product.
    pub pack_size: Option<i64>,
    pub note: Option<String>,
}

/// A stock write-off in base units.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueStock {
    pub product_id: String,
    pub quantity: i64,
    pub note: Option<String>,
}

/// The inventory ledger.
#[derive(Debug, Clone)]
pub struct InventoryService {
    pool: SqlitePool,
    pack_sizes: PackSizeTable,
}

impl InventoryService {
    /// Service with the default pack-size table.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryService {
            pool,
            pack_sizes: PackSizeTable::default(),
        }
    }

    /// Replaces the pack-size table.
    pub fn with_pack_sizes(mut self, pack_sizes: PackSizeTable) -> Self {
        self.pack_sizes = pack_sizes;
        self
    }

    /// Receives stock.
    ///
    /// ## Errors
    /// - `NotFound` if the product doesn't exist
    /// - `Domain(Configuration)` for composite products
    /// - `Domain(Validation)` for bad quantities or prices
    pub async fn receive_stock(&self, input: &ReceiveStock, user_id: &str) -> DbResult<Product> {
        validate_stock_quantity(input.quantity)?;
        if let Some(price) = input.unit_price {
            validate_non_negative_money("unitPrice", price)?;
        }
        if let Some(price) = input.sale_price {
            validate_non_negative_money("salePrice", price)?;
        }
        if let Some(size) = input.pack_size {
            validate_pack_size(size)?;
        }

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let now = uow.now();

        let product = load(&mut uow, &input.product_id).await?;
        ensure_holds_stock(&product)?;

        let category = match &product.category_id {
            Some(id) => uow.categories().get(id).await?,
            None => None,
        };

        let (pack_size, source) = self
            .pack_sizes
            .resolve(input.pack_size, &product, category.as_ref());
        let intake = normalize_intake(input.quantity, input.unit_price, pack_size);
        debug!(product_id = %product.id, pack_size, ?source, units = intake.units, "Intake normalized");

        let stored_pack_size = (source == PackSizeSource::Intake).then_some(pack_size);
        uow.products()
            .receive(&product.id, intake.units, intake.unit_cost, input.sale_price, stored_pack_size, now)
            .await?;

        let note = input.note.as_deref().filter(|n| !n.trim().is_empty());
        uow.movements()
            .record(
                NewMovement {
                    product_id: &product.id,
                    kind: MovementType::In,
                    quantity: intake.units,
                    unit_price: input.sale_price,
                    unit_cost: intake.unit_cost,
                    note,
                    user_id,
                },
                now,
            )
            .await?;

        let updated = load(&mut uow, &product.id).await?;
        let username = uow.users().username(user_id).await?;
        let text = stock_in_message(&StockNotice {
            product_name: &updated.name,
            category_name: category.as_ref().map(|c| c.name.as_str()),
            quantity: intake.units,
            unit_cost: intake.unit_cost,
            new_stock: updated.stock,
            note,
            username: &username,
            at: now,
        });
        uow.outbox().enqueue(NotificationKind::StockIn, &text, now).await?;

        uow.commit().await?;

        info!(
            product_id = %updated.id,
            units = intake.units,
            stock = updated.stock,
            "Stock received"
        );
        Ok(updated)
    }

    /// Writes stock off.
    ///
    /// ## Errors
    /// - `NotFound` if the product doesn't exist
    /// - `Domain(InsufficientStock)` if fewer than `quantity` units are on hand
    /// - `Domain(Configuration)` for composite products
    pub async fn issue_stock(&self, input: &IssueStock, user_id: &str) -> DbResult<Product> {
        validate_stock_quantity(input.quantity)?;

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let now = uow.now();

        let product = load(&mut uow, &input.product_id).await?;
        ensure_holds_stock(&product)?;

        if !uow.products().decrement(&product.id, input.quantity, now).await? {
            return Err(CoreError::InsufficientStock {
                name: product.name,
                available: product.stock,
                requested: input.quantity,
            }
            .into());
        }

        let note = input.note.as_deref().filter(|n| !n.trim().is_empty());
        uow.movements()
            .record(
                NewMovement {
                    product_id: &product.id,
                    kind: MovementType::Out,
                    quantity: input.quantity,
                    unit_price: None,
                    unit_cost: None,
                    note,
                    user_id,
                },
                now,
            )
            .await?;

        let updated = load(&mut uow, &product.id).await?;
        let category = match &updated.category_id {
            Some(id) => uow.categories().get(id).await?,
            None => None,
        };
        let username = uow.users().username(user_id).await?;
        let text = stock_out_message(&StockNotice {
            product_name: &updated.name,
            category_name: category.as_ref().map(|c| c.name.as_str()),
            quantity: input.quantity,
            unit_cost: None,
            new_stock: updated.stock,
            note,
            username: &username,
            at: now,
        });
        uow.outbox().enqueue(NotificationKind::StockOut, &text, now).await?;

        uow.commit().await?;

        info!(product_id = %updated.id, quantity = input.quantity, stock = updated.stock, "Stock issued");
        Ok(updated)
    }
}

async fn load(uow: &mut UnitOfWork, id: &str) -> DbResult<Product> {
    uow.products()
        .get(id)
        .await?
        .ok_or_else(|| DbError::not_found("Product", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::movement::MovementFilter;
    use crate::service::catalog::{CategoryInput, NewProduct};
    use crate::service::test_support::{admin, db, product, stock, stock_of};
    use kiosk_core::PageRequest;

    #[tokio::test]
    async fn test_receive_then_issue() {
        let db = db().await;
        let admin = admin(&db).await;
        let cola = product(&db, "Cola", 150, 0).await;

        let received = stock(&db, &admin, &cola, 50, 100).await;
        assert_eq!(received.stock, 50);
        assert_eq!(received.cost_price.minor(), 100);

        let issued = db
            .inventory()
            .issue_stock(
                &IssueStock {
                    product_id: cola.id.clone(),
                    quantity: 8,
                    note: Some("expired".into()),
                },
                &admin.id,
            )
            .await
            .unwrap();
        assert_eq!(issued.stock, 42);

        let page = db
            .movements()
            .list(&MovementFilter::default(), PageRequest::new(None, None, 20, 100))
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        // newest first
        assert_eq!(page.items[0].kind, MovementType::Out);
        assert_eq!(page.items[0].username, "admin");
        assert_eq!(page.items[1].quantity, 50);
    }

    #[tokio::test]
    async fn test_issue_more_than_stock_is_rejected() {
        let db = db().await;
        let admin = admin(&db).await;
        let cola = product(&db, "Cola", 150, 0).await;
        stock(&db, &admin, &cola, 5, 100).await;

        let err = db
            .inventory()
            .issue_stock(
                &IssueStock {
                    product_id: cola.id.clone(),
                    quantity: 6,
                    note: None,
                },
                &admin.id,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 5, requested: 6, .. })
        ));
        assert_eq!(stock_of(&db, &cola).await, 5);
        let movements = db.movements().for_product(&cola.id).await.unwrap();
        assert_eq!(movements.len(), 1);
    }

    #[tokio::test]
    async fn test_receive_unknown_product_is_not_found() {
        let db = db().await;
        let admin = admin(&db).await;
        let err = db
            .inventory()
            .receive_stock(
                &ReceiveStock {
                    product_id: "missing".into(),
                    quantity: 1,
                    unit_price: None,
                    sale_price: None,
                    pack_size: None,
                    note: None,
                },
                &admin.id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_category_pack_size_normalizes_intake() {
        let db = db().await;
        let admin = admin(&db).await;
        let category = db
            .catalog()
            .create_category(&CategoryInput {
                name: "Sausages".into(),
                default_pack_size: None,
            })
            .await
            .unwrap();
        let sausage = db
            .catalog()
            .create_product(NewProduct {
                name: "Pork".into(),
                category_id: Some(category.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();

        // keyword rule "sausage" → 12 per pack
        let received = db
            .inventory()
            .receive_stock(
                &ReceiveStock {
                    product_id: sausage.id.clone(),
                    quantity: 5,
                    unit_price: Some(Money::from_minor(1200)),
                    sale_price: Some(Money::from_minor(250)),
                    pack_size: None,
                    note: None,
                },
                &admin.id,
            )
            .await
            .unwrap();

        assert_eq!(received.stock, 60);
        assert_eq!(received.cost_price.minor(), 100);
        assert_eq!(received.price.minor(), 250);
        // derived pack sizes are not written back
        assert_eq!(received.pack_size, 1);
    }

    #[tokio::test]
    async fn test_custom_pack_size_table() {
        let db = db().await;
        let admin = admin(&db).await;
        let category = db
            .catalog()
            .create_category(&CategoryInput {
                name: "Lavash".into(),
                default_pack_size: None,
            })
            .await
            .unwrap();
        let bread = db
            .catalog()
            .create_product(NewProduct {
                name: "Thin lavash".into(),
                category_id: Some(category.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();

        let inventory = db.inventory().with_pack_sizes(PackSizeTable::new(vec![
            kiosk_core::pack_size::PackSizeRule {
                keyword: "LAVASH".into(),
                pack_size: 10,
            },
        ]));
        let received = inventory
            .receive_stock(
                &ReceiveStock {
                    product_id: bread.id.clone(),
                    quantity: 3,
                    unit_price: Some(Money::from_minor(500)),
                    sale_price: None,
                    pack_size: None,
                    note: None,
                },
                &admin.id,
            )
            .await
            .unwrap();

        assert_eq!(received.stock, 30);
        assert_eq!(received.cost_price.minor(), 50);
    }

    #[tokio::test]
    async fn test_receipt_and_issue_enqueue_notifications() {
        let db = db().await;
        let admin = admin(&db).await;
        let cola = product(&db, "Cola", 150, 0).await;
        stock(&db, &admin, &cola, 3, 100).await;

        let pending = db.outbox().pending(10, 5).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, NotificationKind::StockIn);
        assert!(pending[0].body.contains("Cola"));

        // a failed write-off leaves no message behind
        let _ = db
            .inventory()
            .issue_stock(
                &IssueStock {
                    product_id: cola.id.clone(),
                    quantity: 10,
                    note: None,
                },
                &admin.id,
            )
            .await
            .unwrap_err();
        assert_eq!(db.outbox().count_pending(5).await.unwrap(), 1);
    }
}
