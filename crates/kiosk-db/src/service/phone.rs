//! # Phone Service
//!
//! Phones are received and sold one at a time, by IMEI.
//!
//! ## Phone Lifecycle
//! ```text
//! create_phone ──► phones.status = in_stock  + movement IN
//!                          │
//! sell_phone   ──► guarded UPDATE ... WHERE status = 'in_stock'
//!                          │
//!                          ▼
//!                  status = sold  + sales row + phone_sales row + movement SALE
//! ```
//!
//! A credit sale also stores its terms on the sale row; installments are
//! recorded later through the credit ledger.

use kiosk_core::credit::{credit_terms, CreditRequest};
use kiosk_core::message::{phone_sale_message, PhoneSaleNotice};
use kiosk_core::validation::{validate_imei, validate_non_negative_money, validate_phone_model};
use kiosk_core::{
    CoreError, Money, PaymentMethod, Phone, PhoneCondition, PhoneMovement, PhoneMovementType,
    PhoneSale, PhoneStatus, Sale,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use crate::repository::outbox::NotificationKind;
use crate::unit_of_work::UnitOfWork;

/// Body of `POST /phones`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPhone {
    pub imei: String,
    pub model: String,
    pub purchase_price: Money,
    pub condition: PhoneCondition,
    pub sale_price: Option<Money>,
}

/// Body of `POST /phones/:id/sell`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellPhone {
    pub sale_price: Money,
    pub payment_method: PaymentMethod,
    pub customer_first_name: Option<String>,
    pub customer_last_name: Option<String>,
    pub initial_payment: Option<Money>,
    pub credit_months: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct PhoneService {
    pool: SqlitePool,
}

impl PhoneService {
    pub fn new(pool: SqlitePool) -> Self {
        PhoneService { pool }
    }

    /// Receives a phone.
    ///
    /// ## Errors
    /// - `Domain(Validation)` for a malformed IMEI, model or price
    /// - `UniqueViolation { field: "imei", value }` for a known IMEI
    pub async fn create_phone(&self, input: &NewPhone, user_id: &str) -> DbResult<Phone> {
        let imei = input.imei.trim();
        validate_imei(imei)?;
        validate_phone_model(&input.model)?;
        validate_non_negative_money("purchasePrice", input.purchase_price)?;
        if let Some(price) = input.sale_price {
            validate_non_negative_money("salePrice", price)?;
        }

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let now = uow.now();

        let phone = Phone {
            id: new_id(),
            imei: imei.to_string(),
            model: input.model.trim().to_string(),
            purchase_price: input.purchase_price,
            condition: input.condition,
            sale_price: input.sale_price,
            status: PhoneStatus::InStock,
            created_at: now,
            updated_at: now,
        };
        uow.phones().insert(&phone).await?;
        uow.phones()
            .insert_movement(&PhoneMovement {
                id: new_id(),
                phone_id: phone.id.clone(),
                kind: PhoneMovementType::In,
                purchase_price: phone.purchase_price,
                sale_price: phone.sale_price,
                note: None,
                user_id: user_id.to_string(),
                created_at: now,
            })
            .await?;

        uow.commit().await?;
        Ok(phone)
    }

    /// Sells an in-stock phone.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown phone
    /// - `Domain(PhoneNotAvailable)` if it was already sold
    /// - `Domain(InvalidCreditTerms)` for unusable credit terms
    pub async fn sell_phone(&self, phone_id: &str, input: &SellPhone, user_id: &str) -> DbResult<Sale> {
        validate_non_negative_money("salePrice", input.sale_price)?;

        let first_name = non_empty(&input.customer_first_name);
        let last_name = non_empty(&input.customer_last_name);

        let terms = match input.payment_method {
            PaymentMethod::Credit => Some(credit_terms(&CreditRequest {
                sale_price: input.sale_price,
                initial_payment: input.initial_payment,
                customer_first_name: first_name,
                customer_last_name: last_name,
                credit_months: input.credit_months,
            })?),
            PaymentMethod::Cash | PaymentMethod::Card => None,
        };

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let now = uow.now();

        let phone = uow
            .phones()
            .get(phone_id)
            .await?
            .ok_or_else(|| DbError::not_found("Phone", phone_id))?;

        let sale = Sale {
            id: new_id(),
            user_id: user_id.to_string(),
            total: input.sale_price,
            discount: None,
            payment_method: input.payment_method,
            customer_first_name: terms.and(first_name.map(str::to_string)),
            customer_last_name: terms.and(last_name.map(str::to_string)),
            initial_payment: terms.map(|t| t.initial_payment),
            monthly_payment: terms.map(|t| t.monthly_payment),
            credit_months: terms.map(|t| t.credit_months),
            created_at: now,
        };

        if !uow.phones().mark_sold(&phone.id, input.sale_price, now).await? {
            return Err(CoreError::PhoneNotAvailable { imei: phone.imei }.into());
        }
        uow.sales().insert_sale(&sale).await?;
        uow.phones()
            .insert_phone_sale(&PhoneSale {
                id: new_id(),
                sale_id: sale.id.clone(),
                phone_id: phone.id.clone(),
                sale_price: input.sale_price,
                purchase_price: phone.purchase_price,
            })
            .await?;
        uow.phones()
            .insert_movement(&PhoneMovement {
                id: new_id(),
                phone_id: phone.id.clone(),
                kind: PhoneMovementType::Sale,
                purchase_price: phone.purchase_price,
                sale_price: Some(input.sale_price),
                note: None,
                user_id: user_id.to_string(),
                created_at: now,
            })
            .await?;

        let username = uow.users().username(user_id).await?;
        let customer = [first_name, last_name]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let text = phone_sale_message(&PhoneSaleNotice {
            model: &phone.model,
            imei: &phone.imei,
            sale_price: input.sale_price,
            purchase_price: phone.purchase_price,
            payment_method: input.payment_method,
            customer: (!customer.is_empty()).then_some(customer),
            initial_payment: sale.initial_payment,
            monthly_payment: sale.monthly_payment,
            credit_months: sale.credit_months,
            username: &username,
            at: now,
        });
        uow.outbox().enqueue(NotificationKind::PhoneSale, &text, now).await?;

        uow.commit().await?;

        info!(
            sale_id = %sale.id,
            imei = %phone.imei,
            method = sale.payment_method.as_str(),
            "Phone sold"
        );
        Ok(sale)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
