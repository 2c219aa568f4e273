//! # Checkout Service
//!
//! Commits a cart of goods as one sale.
//!
//! ## Commit Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UnitOfWork::begin            ← write lock, nobody else sells meanwhile │
//! │       │                                                                 │
//! │  1. load requested products + composite components (one read each)     │
//! │  2. plan_checkout             ← NotFound / Configuration / Insufficient │
//! │  3. INSERT sales                                                        │
//! │  4. re-read products, freeze unit_cost per line (composite → 0)        │
//! │  5. INSERT sale_items + SALE movements                                  │
//! │  6. UPDATE products SET stock = stock - n WHERE stock >= n  (guarded)   │
//! │  7. enqueue notification with the stock left                            │
//! │       │                                                                 │
//! │  commit                       ← everything or nothing                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use kiosk_core::checkout::{line_unit_cost, plan_checkout, validate_sale_request, SaleLine};
use kiosk_core::message::{sale_message, Remaining, SaleLineNotice};
use kiosk_core::{CoreError, Money, MovementType, PaymentMethod, Product, Sale, SaleItem};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::DbResult;
use crate::repository::movement::NewMovement;
use crate::repository::new_id;
use crate::repository::outbox::NotificationKind;
use crate::unit_of_work::UnitOfWork;

/// Body of `POST /sales`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSale {
    pub items: Vec<SaleLine>,
    pub discount: Option<Money>,
    pub payment_method: PaymentMethod,
}

/// The sale engine for goods.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    pool: SqlitePool,
}

impl CheckoutService {
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutService { pool }
    }

    /// Commits a sale.
    ///
    /// ## Errors
    /// - `Domain(Validation)` for an empty cart, bad quantities or `credit`
    /// - `Domain(NotFound)` for an unknown product
    /// - `Domain(Configuration)` for a composite without usable components
    /// - `Domain(InsufficientStock)` naming the short product or component
    ///
    /// Any error leaves no sale, item, movement or stock change behind.
    pub async fn create_sale(&self, input: &NewSale, user_id: &str) -> DbResult<Sale> {
        validate_sale_request(&input.items, input.discount, input.payment_method)?;

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let now = uow.now();

        let products = load_with_components(&mut uow, &input.items).await?;
        let plan = plan_checkout(&input.items, input.discount, &products)?;
        debug!(
            lines = input.items.len(),
            decrements = plan.decrements.len(),
            total = %plan.totals.total,
            "Checkout planned"
        );

        let sale = Sale {
            id: new_id(),
            user_id: user_id.to_string(),
            total: plan.totals.total,
            discount: plan.totals.discount,
            payment_method: input.payment_method,
            customer_first_name: None,
            customer_last_name: None,
            initial_payment: None,
            monthly_payment: None,
            credit_months: None,
            created_at: now,
        };
        uow.sales().insert_sale(&sale).await?;

        // Costs are taken from a fresh read, never from the planning snapshot.
        let current = uow.products().get_many(&product_ids(&input.items)).await?;
        for line in &input.items {
            let unit_cost = current
                .get(&line.product_id)
                .map(line_unit_cost)
                .unwrap_or_default();

            uow.sales()
                .insert_item(&SaleItem {
                    id: new_id(),
                    sale_id: sale.id.clone(),
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    unit_cost,
                })
                .await?;

            uow.movements()
                .record(
                    NewMovement {
                        product_id: &line.product_id,
                        kind: MovementType::Sale,
                        quantity: line.quantity,
                        unit_price: Some(line.unit_price),
                        unit_cost: Some(unit_cost),
                        note: None,
                        user_id,
                    },
                    now,
                )
                .await?;
        }

        for decrement in &plan.decrements {
            if !uow
                .products()
                .decrement(&decrement.product_id, decrement.quantity, now)
                .await?
            {
                let available = uow
                    .products()
                    .get(&decrement.product_id)
                    .await?
                    .map(|p| p.stock)
                    .unwrap_or_default();
                warn!(product_id = %decrement.product_id, available, "Stock guard rejected decrement");
                return Err(CoreError::InsufficientStock {
                    name: decrement.product_name.clone(),
                    available,
                    requested: decrement.quantity,
                }
                .into());
            }
        }

        let after = load_with_components(&mut uow, &input.items).await?;
        let notices: Vec<SaleLineNotice<'_>> = input
            .items
            .iter()
            .filter_map(|line| {
                let product = after.get(&line.product_id)?;
                Some(SaleLineNotice {
                    product_name: &product.name,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    remaining: remaining(product, &after),
                })
            })
            .collect();
        let username = uow.users().username(user_id).await?;
        let text = sale_message(&notices, sale.total, sale.payment_method, &username, now);
        uow.outbox().enqueue(NotificationKind::Sale, &text, now).await?;

        uow.commit().await?;

        info!(
            sale_id = %sale.id,
            total = %sale.total,
            method = sale.payment_method.as_str(),
            "Sale committed"
        );
        Ok(sale)
    }
}

fn product_ids(lines: &[SaleLine]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        if !ids.contains(&line.product_id) {
            ids.push(line.product_id.clone());
        }
    }
    ids
}

/// Requested products plus the components of any composite among them.
async fn load_with_components(
    uow: &mut UnitOfWork,
    lines: &[SaleLine],
) -> DbResult<HashMap<String, Product>> {
    let mut products = uow.products().get_many(&product_ids(lines)).await?;

    let components: Vec<String> = products
        .values()
        .filter(|p| p.is_composite)
        .flat_map(|p| [p.bun_component_id.clone(), p.sausage_component_id.clone()])
        .flatten()
        .filter(|id| !products.contains_key(id))
        .collect();
    if !components.is_empty() {
        products.extend(uow.products().get_many(&components).await?);
    }
    Ok(products)
}

fn remaining(product: &Product, products: &HashMap<String, Product>) -> Remaining {
    if !product.is_composite {
        return Remaining::Stock(product.stock);
    }
    let stock_of = |id: &Option<String>| {
        id.as_ref()
            .and_then(|id| products.get(id))
            .map(|p| p.stock)
            .unwrap_or_default()
    };
    Remaining::Components {
        buns: stock_of(&product.bun_component_id),
        sausages: stock_of(&product.sausage_component_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::service::catalog::ProductPatch;
    use crate::service::test_support::{admin, db, file_db, hot_dog, product, stock, stock_of};
    use crate::Database;
    use kiosk_core::period::DateRange;
    use kiosk_core::report::ReportBucket;

    fn line(product: &Product, quantity: i64, unit_price: i64) -> SaleLine {
        SaleLine {
            product_id: product.id.clone(),
            quantity,
            unit_price: Money::from_minor(unit_price),
        }
    }

    fn cash(items: Vec<SaleLine>) -> NewSale {
        NewSale {
            items,
            discount: None,
            payment_method: PaymentMethod::Cash,
        }
    }

    async fn total_profit(db: &Database) -> i64 {
        let rows = db
            .reports()
            .summary(DateRange::default(), ReportBucket::Day, None)
            .await
            .unwrap();
        rows.iter().map(|r| r.profit).sum::<Money>().minor()
    }

    #[tokio::test]
    async fn test_receive_and_sell_end_to_end() {
        let db = db().await;
        let admin = admin(&db).await;
        let a = product(&db, "Product A", 150, 0).await;
        stock(&db, &admin, &a, 50, 100).await;

        let sale = db
            .checkout()
            .create_sale(&cash(vec![line(&a, 10, 150)]), &admin.id)
            .await
            .unwrap();

        assert_eq!(sale.total.minor(), 1500);
        assert_eq!(stock_of(&db, &a).await, 40);

        let items = db.sales().items(&sale.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].unit_cost.minor(), 100);
        assert_eq!(items[0].profit().minor(), 500);
    }

    #[tokio::test]
    async fn test_mixed_cart_is_rejected_whole() {
        let db = db().await;
        let admin = admin(&db).await;
        let a = product(&db, "Cola", 150, 0).await;
        let b = product(&db, "Chips", 200, 0).await;
        stock(&db, &admin, &a, 10, 100).await;
        stock(&db, &admin, &b, 1, 100).await;

        let err = db
            .checkout()
            .create_sale(&cash(vec![line(&a, 2, 150), line(&b, 5, 200)]), &admin.id)
            .await
            .unwrap_err();

        match err {
            DbError::Domain(CoreError::InsufficientStock { name, available, requested }) => {
                assert_eq!(name, "Chips");
                assert_eq!(available, 1);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(stock_of(&db, &a).await, 10);
        assert_eq!(stock_of(&db, &b).await, 1);
        assert_eq!(db.sales().count().await.unwrap(), 0);
        // only the two receipts
        assert_eq!(db.movements().for_product(&a.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let db = db().await;
        let admin = admin(&db).await;
        let err = db
            .checkout()
            .create_sale(
                &cash(vec![SaleLine {
                    product_id: "missing".into(),
                    quantity: 1,
                    unit_price: Money::from_minor(100),
                }]),
                &admin.id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_composite_consumes_components() {
        let db = db().await;
        let admin = admin(&db).await;
        let bun = product(&db, "Bun", 50, 0).await;
        let sausage = product(&db, "Sausage", 100, 0).await;
        stock(&db, &admin, &bun, 10, 20).await;
        stock(&db, &admin, &sausage, 10, 60).await;
        let dog = hot_dog(&db, &bun, &sausage, 2).await;

        let sale = db
            .checkout()
            .create_sale(&cash(vec![line(&dog, 3, 400)]), &admin.id)
            .await
            .unwrap();

        assert_eq!(stock_of(&db, &bun).await, 7);
        assert_eq!(stock_of(&db, &sausage).await, 4);
        assert_eq!(stock_of(&db, &dog).await, 0);

        let items = db.sales().items(&sale.id).await.unwrap();
        assert_eq!(items[0].unit_cost, Money::zero());

        let pending = db.outbox().by_kind(NotificationKind::Sale).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].body.contains("Sausages left: <b>4</b>"));
    }

    #[tokio::test]
    async fn test_composite_short_component_is_named() {
        let db = db().await;
        let admin = admin(&db).await;
        let bun = product(&db, "Bun", 50, 0).await;
        let sausage = product(&db, "Sausage", 100, 0).await;
        stock(&db, &admin, &bun, 10, 20).await;
        stock(&db, &admin, &sausage, 4, 60).await;
        let dog = hot_dog(&db, &bun, &sausage, 2).await;

        let err = db
            .checkout()
            .create_sale(&cash(vec![line(&dog, 3, 400)]), &admin.id)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { ref name, available: 4, requested: 6 })
                if name == "Sausage"
        ));
        assert_eq!(stock_of(&db, &bun).await, 10);
    }

    #[tokio::test]
    async fn test_cost_change_keeps_sold_cost() {
        let db = db().await;
        let admin = admin(&db).await;
        let a = product(&db, "Cola", 150, 0).await;
        stock(&db, &admin, &a, 10, 100).await;

        let sale = db
            .checkout()
            .create_sale(&cash(vec![line(&a, 2, 150)]), &admin.id)
            .await
            .unwrap();
        assert_eq!(total_profit(&db).await, 2 * (150 - 100));

        db.catalog()
            .update_product(
                &a.id,
                ProductPatch {
                    cost_price: Some(Money::from_minor(130)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let items = db.sales().items(&sale.id).await.unwrap();
        assert_eq!(items[0].unit_cost.minor(), 100);
        assert_eq!(total_profit(&db).await, 2 * (150 - 100));
    }

    #[tokio::test]
    async fn test_oversized_unit_price_is_rejected() {
        let db = db().await;
        let admin = admin(&db).await;
        let a = product(&db, "Cola", 150, 0).await;
        stock(&db, &admin, &a, 10, 100).await;

        let err = db
            .checkout()
            .create_sale(&cash(vec![line(&a, 2, i64::MAX)]), &admin.id)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
        assert_eq!(stock_of(&db, &a).await, 10);
        assert_eq!(db.sales().count().await.unwrap(), 0);

        let err = db
            .checkout()
            .create_sale(
                &NewSale {
                    items: vec![line(&a, 1, 150)],
                    discount: Some(Money::from_minor(i64::MAX)),
                    payment_method: PaymentMethod::Cash,
                },
                &admin.id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_discount_is_clamped_at_zero() {
        let db = db().await;
        let admin = admin(&db).await;
        let a = product(&db, "Gum", 50, 0).await;
        stock(&db, &admin, &a, 10, 10).await;

        let sale = db
            .checkout()
            .create_sale(
                &NewSale {
                    items: vec![line(&a, 2, 50)],
                    discount: Some(Money::from_minor(500)),
                    payment_method: PaymentMethod::Card,
                },
                &admin.id,
            )
            .await
            .unwrap();

        assert_eq!(sale.total, Money::zero());
        assert_eq!(sale.discount, Some(Money::from_minor(500)));
    }

    #[tokio::test]
    async fn test_credit_goods_sale_is_rejected() {
        let db = db().await;
        let admin = admin(&db).await;
        let a = product(&db, "Gum", 50, 0).await;
        stock(&db, &admin, &a, 10, 10).await;

        let err = db
            .checkout()
            .create_sale(
                &NewSale {
                    items: vec![line(&a, 1, 50)],
                    discount: None,
                    payment_method: PaymentMethod::Credit,
                },
                &admin.id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_concurrent_sales_never_oversell() {
        let (db, path) = file_db().await;
        let admin = admin(&db).await;
        let a = product(&db, "Cola", 150, 0).await;
        stock(&db, &admin, &a, 5, 100).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let checkout = db.checkout();
            let user_id = admin.id.clone();
            let sale = cash(vec![line(&a, 1, 150)]);
            handles.push(tokio::spawn(async move {
                checkout.create_sale(&sale, &user_id).await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(DbError::Domain(CoreError::InsufficientStock { .. })) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(ok, 5);
        assert_eq!(stock_of(&db, &a).await, 0);
        assert_eq!(db.sales().count().await.unwrap(), 5);

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
