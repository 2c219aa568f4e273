//! Fixtures shared by the service tests.

use std::path::PathBuf;
use std::time::Duration;

use kiosk_core::{Money, Product, Role, User};

use crate::repository::user::NewUser;
use crate::service::catalog::NewProduct;
use crate::service::inventory::ReceiveStock;
use crate::{Database, DbConfig};

pub(crate) async fn db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// File-backed database with a small pool, for tests that need several
/// connections racing each other. Remove the returned path when done.
pub(crate) async fn file_db() -> (Database, PathBuf) {
    let path = std::env::temp_dir().join(format!("kiosk-{}.db", uuid::Uuid::new_v4()));
    let db = Database::new(
        DbConfig::new(&path)
            .max_connections(4)
            .busy_timeout(Duration::from_secs(10)),
    )
    .await
    .unwrap();
    (db, path)
}

pub(crate) async fn user(db: &Database, username: &str, role: Role) -> User {
    db.users()
        .insert(NewUser {
            username: username.to_string(),
            email: Some(format!("{username}@local")),
            password_hash: "not-a-real-hash".to_string(),
            role,
        })
        .await
        .unwrap()
}

pub(crate) async fn admin(db: &Database) -> User {
    user(db, "admin", Role::Admin).await
}

/// Simple product with zero stock.
pub(crate) async fn product(db: &Database, name: &str, price: i64, cost: i64) -> Product {
    db.catalog()
        .create_product(NewProduct {
            name: name.to_string(),
            price: Some(Money::from_minor(price)),
            cost_price: Some(Money::from_minor(cost)),
            ..Default::default()
        })
        .await
        .unwrap()
}

/// Receives `units` single units at `unit_cost`.
pub(crate) async fn stock(db: &Database, user: &User, product: &Product, units: i64, unit_cost: i64) -> Product {
    db.inventory()
        .receive_stock(
            &ReceiveStock {
                product_id: product.id.clone(),
                quantity: units,
                unit_price: Some(Money::from_minor(unit_cost)),
                sale_price: None,
                pack_size: Some(1),
                note: None,
            },
            &user.id,
        )
        .await
        .unwrap()
}

/// Composite hot dog over `bun` and `sausage`.
pub(crate) async fn hot_dog(db: &Database, bun: &Product, sausage: &Product, sausages_per_unit: i64) -> Product {
    db.catalog()
        .create_product(NewProduct {
            name: "Hot Dog".to_string(),
            price: Some(Money::from_minor(400)),
            is_composite: Some(true),
            bun_component_id: Some(bun.id.clone()),
            sausage_component_id: Some(sausage.id.clone()),
            sausages_per_unit: Some(sausages_per_unit),
            ..Default::default()
        })
        .await
        .unwrap()
}

pub(crate) async fn stock_of(db: &Database, product: &Product) -> i64 {
    db.products().get(&product.id).await.unwrap().unwrap().stock
}

/// Sells a fresh phone on credit and returns the sale.
pub(crate) async fn credit_sale(db: &Database, user: &User, imei: &str, total: i64, initial: i64) -> kiosk_core::Sale {
    use crate::service::phone::{NewPhone, SellPhone};
    use kiosk_core::{PaymentMethod, PhoneCondition};

    let phone = db
        .phone_sales()
        .create_phone(
            &NewPhone {
                imei: imei.to_string(),
                model: "Galaxy A52".to_string(),
                purchase_price: Money::from_minor(total / 2),
                condition: PhoneCondition::Used,
                sale_price: None,
            },
            &user.id,
        )
        .await
        .unwrap();

    db.phone_sales()
        .sell_phone(
            &phone.id,
            &SellPhone {
                sale_price: Money::from_minor(total),
                payment_method: PaymentMethod::Credit,
                customer_first_name: Some("Ann".to_string()),
                customer_last_name: Some("Lee".to_string()),
                initial_payment: Some(Money::from_minor(initial)),
                credit_months: Some(4),
            },
            &user.id,
        )
        .await
        .unwrap()
}
