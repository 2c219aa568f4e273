//! # Checkout Planning
//!
//! The pure half of the sale transaction engine: given the requested lines
//! and the products read inside the transaction, decide whether the sale can
//! go through and exactly which stock decrements it implies.
//!
//! ## Where This Runs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    load products (+ components)          ← kiosk-db                     │
//! │    plan_checkout(lines, discount, map)  ← THIS MODULE                   │
//! │        ├── NotFound / Configuration / InsufficientStock → ROLLBACK      │
//! │        └── CheckoutPlan { totals, decrements }                          │
//! │    insert sale, items, movements; apply decrements ← kiosk-db           │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Demand is accumulated per product across lines, so two lines that share a
//! component (a plain bun and a hot dog) are checked against the same stock.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::composite::{required_component_quantities, resolve_composite};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{PaymentMethod, Product};
use crate::validation::{validate_non_negative_money, validate_quantity};
use crate::MAX_SALE_LINES;

/// One requested line of a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Totals of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub before_discount: Money,
    /// `None` when no discount (or a zero discount) was given.
    pub discount: Option<Money>,
    /// `max(0, before_discount - discount)`.
    pub total: Money,
}

/// A stock decrement the sale will apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDecrement {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
}

/// Validated outcome of planning a sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub totals: SaleTotals,
    /// One entry per distinct stock-holding product, in first-seen order.
    pub decrements: Vec<StockDecrement>,
}

/// Validates the shape of a sale request before any database work.
pub fn validate_sale_request(
    lines: &[SaleLine],
    discount: Option<Money>,
    payment_method: PaymentMethod,
) -> Result<(), ValidationError> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }
    if lines.len() > MAX_SALE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_SALE_LINES as i64,
        });
    }
    for line in lines {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "productId".to_string(),
            });
        }
        validate_quantity(line.quantity)?;
        validate_non_negative_money("unitPrice", line.unit_price)?;
    }
    if let Some(discount) = discount {
        validate_non_negative_money("discount", discount)?;
    }
    if payment_method == PaymentMethod::Credit {
        return Err(ValidationError::NotAllowed {
            field: "paymentMethod".to_string(),
            allowed: vec!["cash".to_string(), "card".to_string()],
        });
    }
    Ok(())
}

/// Computes sale totals. Negative results are clamped to zero.
///
/// ## Example
/// ```rust
/// use kiosk_core::checkout::{sale_totals, SaleLine};
/// use kiosk_core::Money;
///
/// let lines = vec![SaleLine {
///     product_id: "a".into(),
///     quantity: 2,
///     unit_price: Money::from_minor(500),
/// }];
/// let totals = sale_totals(&lines, Some(Money::from_minor(1500)));
/// assert_eq!(totals.total, Money::zero());
/// ```
pub fn sale_totals(lines: &[SaleLine], discount: Option<Money>) -> SaleTotals {
    let before_discount: Money = lines
        .iter()
        .map(|l| l.unit_price.multiply_quantity(l.quantity))
        .sum();
    let discount = discount.filter(|d| !d.is_zero());
    let total = (before_discount - discount.unwrap_or_default()).clamp_non_negative();

    SaleTotals {
        before_discount,
        discount,
        total,
    }
}

/// Cost fixed on a sale line: 0 for composite products, else the current
/// cost price.
#[inline]
pub fn line_unit_cost(product: &Product) -> Money {
    if product.is_composite {
        Money::zero()
    } else {
        product.cost_price
    }
}

/// Plans a sale against the products visible inside the transaction.
///
/// `products` must contain every requested product and, for composites,
/// their components.
///
/// ## Errors
/// - `NotFound` for a requested product that is missing
/// - `Configuration` for a composite with an unresolvable component
/// - `InsufficientStock` naming the short product or component
pub fn plan_checkout(
    lines: &[SaleLine],
    discount: Option<Money>,
    products: &HashMap<String, Product>,
) -> CoreResult<CheckoutPlan> {
    let mut demand: HashMap<&str, i64> = HashMap::new();
    let mut order: Vec<&Product> = Vec::new();

    for line in lines {
        let product = products
            .get(&line.product_id)
            .ok_or_else(|| CoreError::not_found("Product", line.product_id.clone()))?;

        if product.is_composite {
            let recipe = resolve_composite(product)?;
            let bun = component(products, product, &recipe.bun_component_id, "bun")?;
            let sausage = component(products, product, &recipe.sausage_component_id, "sausage")?;
            let qty = required_component_quantities(&recipe, line.quantity);
            add_demand(&mut demand, &mut order, bun, qty.bun_qty)?;
            add_demand(&mut demand, &mut order, sausage, qty.sausage_qty)?;
        } else {
            add_demand(&mut demand, &mut order, product, line.quantity)?;
        }
    }

    let decrements = order
        .into_iter()
        .map(|p| StockDecrement {
            product_id: p.id.clone(),
            product_name: p.name.clone(),
            quantity: demand.get(p.id.as_str()).copied().unwrap_or_default(),
        })
        .collect();

    Ok(CheckoutPlan {
        totals: sale_totals(lines, discount),
        decrements,
    })
}

fn component<'a>(
    products: &'a HashMap<String, Product>,
    composite: &Product,
    id: &str,
    role: &str,
) -> CoreResult<&'a Product> {
    products
        .get(id)
        .filter(|c| !c.is_composite)
        .ok_or_else(|| CoreError::Configuration {
            product: composite.name.clone(),
            reason: format!("{} component {} cannot be resolved", role, id),
        })
}

/// Adds `quantity` to the running demand for `product` and checks it
/// against the stock read inside the transaction.
fn add_demand<'a>(
    demand: &mut HashMap<&'a str, i64>,
    order: &mut Vec<&'a Product>,
    product: &'a Product,
    quantity: i64,
) -> CoreResult<()> {
    let total = demand.entry(product.id.as_str()).or_insert(0);
    if *total == 0 {
        order.push(product);
    }
    *total += quantity;
    if !product.can_issue(*total) {
        return Err(CoreError::InsufficientStock {
            name: product.name.clone(),
            available: product.stock,
            requested: *total,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: &str, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: id.into(),
            name: id.into(),
            sku: id.to_uppercase(),
            category_id: None,
            price: Money::from_minor(150),
            cost_price: Money::from_minor(100),
            stock,
            is_active: true,
            pack_size: 1,
            is_composite: false,
            bun_component_id: None,
            sausage_component_id: None,
            sausages_per_unit: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn hot_dog(per_unit: i64) -> Product {
        let mut p = product("hotdog", 0);
        p.is_composite = true;
        p.bun_component_id = Some("bun".into());
        p.sausage_component_id = Some("sausage".into());
        p.sausages_per_unit = Some(per_unit);
        p
    }

    fn catalog(items: Vec<Product>) -> HashMap<String, Product> {
        items.into_iter().map(|p| (p.id.clone(), p)).collect()
    }

    fn line(id: &str, quantity: i64, price: i64) -> SaleLine {
        SaleLine {
            product_id: id.into(),
            quantity,
            unit_price: Money::from_minor(price),
        }
    }

    #[test]
    fn test_simple_sale_plan() {
        let products = catalog(vec![product("a", 50)]);
        let plan = plan_checkout(&[line("a", 10, 150)], None, &products).unwrap();

        assert_eq!(plan.totals.total.minor(), 1500);
        assert_eq!(plan.totals.discount, None);
        assert_eq!(plan.decrements.len(), 1);
        assert_eq!(plan.decrements[0].quantity, 10);
    }

    #[test]
    fn test_composite_decrements_components() {
        let products = catalog(vec![hot_dog(2), product("bun", 10), product("sausage", 10)]);
        let plan = plan_checkout(&[line("hotdog", 3, 400)], None, &products).unwrap();

        let by_id: HashMap<_, _> = plan
            .decrements
            .iter()
            .map(|d| (d.product_id.as_str(), d.quantity))
            .collect();
        assert_eq!(by_id.get("bun"), Some(&3));
        assert_eq!(by_id.get("sausage"), Some(&6));
        assert!(!by_id.contains_key("hotdog"));
    }

    #[test]
    fn test_composite_short_component_is_named() {
        let products = catalog(vec![hot_dog(2), product("bun", 10), product("sausage", 5)]);
        let err = plan_checkout(&[line("hotdog", 3, 400)], None, &products).unwrap_err();
        match err {
            CoreError::InsufficientStock {
                name,
                available,
                requested,
            } => {
                assert_eq!(name, "sausage");
                assert_eq!((available, requested), (5, 6));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_shared_component_demand_accumulates() {
        // 2 plain buns + 2 hot dogs need 4 buns; only 3 on hand
        let products = catalog(vec![hot_dog(1), product("bun", 3), product("sausage", 10)]);
        let lines = [line("bun", 2, 50), line("hotdog", 2, 400)];
        let err = plan_checkout(&lines, None, &products).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { requested: 4, .. }));
    }

    #[test]
    fn test_missing_product_and_component() {
        let products = catalog(vec![hot_dog(1), product("bun", 3)]);
        assert!(matches!(
            plan_checkout(&[line("ghost", 1, 1)], None, &products).unwrap_err(),
            CoreError::NotFound { .. }
        ));
        assert!(matches!(
            plan_checkout(&[line("hotdog", 1, 1)], None, &products).unwrap_err(),
            CoreError::Configuration { .. }
        ));
    }

    #[test]
    fn test_discount_clamps_total() {
        let totals = sale_totals(&[line("a", 1, 1000)], Some(Money::from_minor(1500)));
        assert_eq!(totals.before_discount.minor(), 1000);
        assert_eq!(totals.total, Money::zero());

        let totals = sale_totals(&[line("a", 1, 1000)], Some(Money::zero()));
        assert_eq!(totals.discount, None);
    }

    #[test]
    fn test_line_unit_cost_rule() {
        assert_eq!(line_unit_cost(&product("a", 1)).minor(), 100);
        assert_eq!(line_unit_cost(&hot_dog(2)), Money::zero());
    }

    #[test]
    fn test_request_validation() {
        assert!(validate_sale_request(&[], None, PaymentMethod::Cash).is_err());
        assert!(validate_sale_request(&[line("a", 0, 1)], None, PaymentMethod::Cash).is_err());
        assert!(validate_sale_request(&[line("a", 1, -1)], None, PaymentMethod::Cash).is_err());
        assert!(validate_sale_request(
            &[line("a", 1, 1)],
            Some(Money::from_minor(-1)),
            PaymentMethod::Card
        )
        .is_err());
        assert!(validate_sale_request(&[line("a", 1, 1)], None, PaymentMethod::Credit).is_err());
        assert!(validate_sale_request(&[line("a", 1, 1)], None, PaymentMethod::Card).is_ok());
    }
}
