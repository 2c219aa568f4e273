//! # Composite Products
//!
//! Resolution of "hot dog" style products into their two stock-tracked
//! components.
//!
//! ## Consumption Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sell 3 × "Hot Dog Double"   (sausages_per_unit = 2)                    │
//! │                                                                         │
//! │      bun component      ── 3 × 1 ──►  -3 units                          │
//! │      sausage component  ── 3 × 2 ──►  -6 units                          │
//! │                                                                         │
//! │  The composite itself holds no stock; its SaleItem.unit_cost is 0.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::Product;

/// Bun units consumed per composite unit sold.
pub const BUNS_PER_UNIT: i64 = 1;

/// Sausages per unit when the product does not say otherwise.
pub const DEFAULT_SAUSAGES_PER_UNIT: i64 = 1;

/// The component mapping of a composite product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeRecipe {
    pub bun_component_id: String,
    pub sausage_component_id: String,
    pub sausages_per_unit: i64,
}

/// Component quantities needed to sell a number of composite units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentQuantities {
    pub bun_qty: i64,
    pub sausage_qty: i64,
}

/// Resolves the component mapping of a composite product.
///
/// ## Errors
/// `CoreError::Configuration` when either component reference is missing
/// or `sausages_per_unit` is not positive. Existence of the referenced rows
/// is checked by the caller, which owns the lookup.
pub fn resolve_composite(product: &Product) -> CoreResult<CompositeRecipe> {
    let misconfigured = |reason: &str| CoreError::Configuration {
        product: product.name.clone(),
        reason: reason.to_string(),
    };

    let bun_component_id = product
        .bun_component_id
        .clone()
        .ok_or_else(|| misconfigured("bun component is not set"))?;
    let sausage_component_id = product
        .sausage_component_id
        .clone()
        .ok_or_else(|| misconfigured("sausage component is not set"))?;

    let sausages_per_unit = product
        .sausages_per_unit
        .unwrap_or(DEFAULT_SAUSAGES_PER_UNIT);
    if sausages_per_unit <= 0 {
        return Err(misconfigured("sausages per unit must be positive"));
    }

    Ok(CompositeRecipe {
        bun_component_id,
        sausage_component_id,
        sausages_per_unit,
    })
}

/// Component quantities consumed by selling `sale_quantity` units.
pub fn required_component_quantities(
    recipe: &CompositeRecipe,
    sale_quantity: i64,
) -> ComponentQuantities {
    ComponentQuantities {
        bun_qty: sale_quantity * BUNS_PER_UNIT,
        sausage_qty: sale_quantity * recipe.sausages_per_unit,
    }
}

/// Checks a composite definition before it is saved.
///
/// `bun` and `sausage` are the resolved component rows. A component must not
/// be composite itself and must not be the product being defined.
pub fn validate_components(
    product_id: Option<&str>,
    product_name: &str,
    bun: Option<&Product>,
    sausage: Option<&Product>,
) -> CoreResult<()> {
    let misconfigured = |reason: String| CoreError::Configuration {
        product: product_name.to_string(),
        reason,
    };

    for (role, component) in [("bun", bun), ("sausage", sausage)] {
        let component = component.ok_or_else(|| misconfigured(format!("{} component not found", role)))?;
        if component.is_composite {
            return Err(misconfigured(format!(
                "{} component {} is itself composite",
                role, component.name
            )));
        }
        if product_id == Some(component.id.as_str()) {
            return Err(misconfigured(format!("{} component cannot be the product itself", role)));
        }
    }
    Ok(())
}

/// Rejects direct stock changes on a composite product.
///
/// Composite products hold no stock of their own; receipts and write-offs
/// go to their components.
pub fn ensure_holds_stock(product: &Product) -> CoreResult<()> {
    if product.is_composite {
        return Err(CoreError::Configuration {
            product: product.name.clone(),
            reason: "composite products hold no stock; adjust the components instead".to_string(),
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
    use crate::money::Money;
    use chrono::Utc;

    fn product(id: &str, composite: bool) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            name: id.to_string(),
            sku: id.to_uppercase(),
            category_id: None,
            price: Money::from_minor(300),
            cost_price: Money::from_minor(100),
            stock: 0,
            is_active: true,
            pack_size: 1,
            is_composite: composite,
            bun_component_id: None,
            sausage_component_id: None,
            sausages_per_unit: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_required_quantities_three_doubles() {
        let mut hot_dog = product("hotdog", true);
        hot_dog.bun_component_id = Some("bun".into());
        hot_dog.sausage_component_id = Some("sausage".into());
        hot_dog.sausages_per_unit = Some(2);

        let recipe = resolve_composite(&hot_dog).unwrap();
        let need = required_component_quantities(&recipe, 3);
        assert_eq!(need, ComponentQuantities { bun_qty: 3, sausage_qty: 6 });
    }

    #[test]
    fn test_sausages_per_unit_defaults_to_one() {
        let mut hot_dog = product("hotdog", true);
        hot_dog.bun_component_id = Some("bun".into());
        hot_dog.sausage_component_id = Some("sausage".into());

        let recipe = resolve_composite(&hot_dog).unwrap();
        assert_eq!(recipe.sausages_per_unit, 1);
    }

    #[test]
    fn test_missing_component_is_configuration_error() {
        let mut hot_dog = product("hotdog", true);
        hot_dog.bun_component_id = Some("bun".into());

        let err = resolve_composite(&hot_dog).unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    #[test]
    fn test_validate_components_rejects_nested_composite() {
        let bun = product("bun", false);
        let nested = product("combo", true);
        assert!(validate_components(None, "Hot Dog", Some(&bun), Some(&nested)).is_err());
        assert!(validate_components(None, "Hot Dog", Some(&bun), None).is_err());

        let sausage = product("sausage", false);
        assert!(validate_components(None, "Hot Dog", Some(&bun), Some(&sausage)).is_ok());
        assert!(validate_components(Some("bun"), "Bun", Some(&bun), Some(&sausage)).is_err());
    }

    #[test]
    fn test_composite_holds_no_stock() {
        assert!(ensure_holds_stock(&product("bun", false)).is_ok());
        assert!(matches!(
            ensure_holds_stock(&product("hotdog", true)),
            Err(CoreError::Configuration { .. })
        ));
    }
}
