//! # Pack-Size Normalization
//!
//! Converts received packs into base units on stock intake.
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  receive 5 packs of "Pork Sausages" at 1200 per pack                   │
//! │                                                                         │
//! │  1. pack size given with the intake?        ── yes ──► use it           │
//! │  2. product.pack_size > 1?                  ── yes ──► use it           │
//! │  3. category.default_pack_size set?         ── yes ──► use it           │
//! │  4. category name matches a table keyword?  ── yes ──► use rule         │
//! │  5. otherwise                                        ──► 1              │
//! │                                                                         │
//! │  "Sausages" category → rule "sausage" = 12                              │
//! │  stock += 5 × 12 = 60 units, unit cost = 1200 / 12 = 100               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The keyword table is data: it is matched against the category name only,
//! never against free-text product names.

use crate::money::Money;
use crate::types::{Category, Product};

/// One row of the declarative pack-size table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSizeRule {
    /// Lower-case keyword looked up in the category name.
    pub keyword: String,
    pub pack_size: i64,
}

/// Default rules shipped with the system.
pub const DEFAULT_RULES: &[(&str, i64)] = &[("sausage", 12), ("flatbread", 2)];

/// Where an effective pack size came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackSizeSource {
    Intake,
    Product,
    Category,
    Rule,
    Unpacked,
}

/// Declarative category → pack size table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSizeTable {
    rules: Vec<PackSizeRule>,
}

impl Default for PackSizeTable {
    fn default() -> Self {
        PackSizeTable::new(
            DEFAULT_RULES
                .iter()
                .map(|(keyword, pack_size)| PackSizeRule {
                    keyword: keyword.to_string(),
                    pack_size: *pack_size,
                })
                .collect(),
        )
    }
}

impl PackSizeTable {
    /// Builds a table; keywords are normalized to lower case and rules with
    /// a pack size below 2 are dropped.
    pub fn new(rules: Vec<PackSizeRule>) -> Self {
        let rules = rules
            .into_iter()
            .filter(|r| r.pack_size > 1 && !r.keyword.trim().is_empty())
            .map(|r| PackSizeRule {
                keyword: r.keyword.trim().to_lowercase(),
                pack_size: r.pack_size,
            })
            .collect();
        PackSizeTable { rules }
    }

    /// Returns the effective pack size for an intake and where it came from.
    pub fn resolve(
        &self,
        intake_pack_size: Option<i64>,
        product: &Product,
        category: Option<&Category>,
    ) -> (i64, PackSizeSource) {
        if let Some(size) = intake_pack_size.filter(|s| *s >= 1) {
            return (size, PackSizeSource::Intake);
        }
        if product.pack_size > 1 {
            return (product.pack_size, PackSizeSource::Product);
        }
        if let Some(category) = category {
            if let Some(size) = category.default_pack_size.filter(|s| *s > 1) {
                return (size, PackSizeSource::Category);
            }
            let name = category.name.to_lowercase();
            if let Some(rule) = self.rules.iter().find(|r| name.contains(&r.keyword)) {
                return (rule.pack_size, PackSizeSource::Rule);
            }
        }
        (1, PackSizeSource::Unpacked)
    }
}

/// Stock intake expressed in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedIntake {
    pub units: i64,
    pub unit_cost: Option<Money>,
}

/// Converts `packs` received at `pack_price` into base units.
///
/// ## Example
/// ```rust
/// use kiosk_core::pack_size::normalize_intake;
/// use kiosk_core::Money;
///
/// let intake = normalize_intake(5, Some(Money::from_minor(1200)), 12);
/// assert_eq!(intake.units, 60);
/// assert_eq!(intake.unit_cost, Some(Money::from_minor(100)));
/// ```
pub fn normalize_intake(packs: i64, pack_price: Option<Money>, pack_size: i64) -> NormalizedIntake {
    let pack_size = pack_size.max(1);
    NormalizedIntake {
        units: packs * pack_size,
        unit_cost: pack_price.and_then(|price| price.divide_rounded(pack_size)),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(pack_size: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p".into(),
            name: "Pork Sausage".into(),
            sku: "PORKSAUS".into(),
            category_id: Some("c".into()),
            price: Money::from_minor(150),
            cost_price: Money::zero(),
            stock: 0,
            is_active: true,
            pack_size,
            is_composite: false,
            bun_component_id: None,
            sausage_component_id: None,
            sausages_per_unit: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn category(name: &str, default_pack_size: Option<i64>) -> Category {
        Category {
            id: "c".into(),
            name: name.into(),
            default_pack_size,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_rule_matches_category_name() {
        let table = PackSizeTable::default();
        let (size, source) = table.resolve(None, &product(1), Some(&category("Sausages", None)));
        assert_eq!((size, source), (12, PackSizeSource::Rule));
    }

    #[test]
    fn test_product_name_alone_does_not_trigger_rule() {
        let table = PackSizeTable::default();
        let (size, _) = table.resolve(None, &product(1), Some(&category("Grill", None)));
        assert_eq!(size, 1);
        let (size, _) = table.resolve(None, &product(1), None);
        assert_eq!(size, 1);
    }

    #[test]
    fn test_precedence() {
        let table = PackSizeTable::default();
        let sausages = category("Sausages", Some(10));

        assert_eq!(table.resolve(Some(6), &product(4), Some(&sausages)).0, 6);
        assert_eq!(table.resolve(None, &product(4), Some(&sausages)).0, 4);
        assert_eq!(
            table.resolve(None, &product(1), Some(&sausages)),
            (10, PackSizeSource::Category)
        );
    }

    #[test]
    fn test_normalize_without_price() {
        let intake = normalize_intake(3, None, 2);
        assert_eq!(intake.units, 6);
        assert_eq!(intake.unit_cost, None);
    }

    #[test]
    fn test_custom_table_drops_degenerate_rules() {
        let table = PackSizeTable::new(vec![
            PackSizeRule { keyword: " Buns ".into(), pack_size: 6 },
            PackSizeRule { keyword: "water".into(), pack_size: 1 },
        ]);
        assert_eq!(table.resolve(None, &product(1), Some(&category("Hot dog buns", None))).0, 6);
        assert_eq!(table.resolve(None, &product(1), Some(&category("Water", None))).0, 1);
    }
}
