//! # Catalog Service
//!
//! Creating and editing categories and products, including composite
//! definitions and SKU allocation.

use kiosk_core::composite::validate_components;
use kiosk_core::sku::{sku_candidates, sku_stem};
use kiosk_core::validation::{
    validate_category_name, validate_non_negative_money, validate_pack_size,
    validate_product_name, validate_sausages_per_unit, validate_sku,
};
use kiosk_core::{Category, CoreError, Money, Product};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::category::CategoryRepository;
use crate::repository::new_id;
use crate::unit_of_work::UnitOfWork;

/// Input for a category.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub name: String,
    pub default_pack_size: Option<i64>,
}

/// Input for a new product. Stock always starts at zero.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub sku: Option<String>,
    pub category_id: Option<String>,
    pub price: Option<Money>,
    pub cost_price: Option<Money>,
    pub is_active: Option<bool>,
    pub pack_size: Option<i64>,
    pub is_composite: Option<bool>,
    pub bun_component_id: Option<String>,
    pub sausage_component_id: Option<String>,
    pub sausages_per_unit: Option<i64>,
}

/// Partial product update. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category_id: Option<String>,
    pub price: Option<Money>,
    pub cost_price: Option<Money>,
    pub is_active: Option<bool>,
    pub pack_size: Option<i64>,
    pub is_composite: Option<bool>,
    pub bun_component_id: Option<String>,
    pub sausage_component_id: Option<String>,
    pub sausages_per_unit: Option<i64>,
}

/// Catalog writes.
#[derive(Debug, Clone)]
pub struct CatalogService {
    pool: SqlitePool,
}

impl CatalogService {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogService { pool }
    }

    fn validate_category(input: &CategoryInput) -> DbResult<String> {
        let name = input.name.trim().to_string();
        validate_category_name(&name)?;
        if let Some(size) = input.default_pack_size {
            validate_pack_size(size)?;
        }
        Ok(name)
    }

    /// Creates a category. Duplicate names are a `UniqueViolation`.
    pub async fn create_category(&self, input: &CategoryInput) -> DbResult<Category> {
        let name = Self::validate_category(input)?;
        CategoryRepository::new(self.pool.clone())
            .insert(&name, input.default_pack_size)
            .await
    }

    pub async fn update_category(&self, id: &str, input: &CategoryInput) -> DbResult<Category> {
        let name = Self::validate_category(input)?;
        CategoryRepository::new(self.pool.clone())
            .update(id, &name, input.default_pack_size)
            .await
    }

    /// Creates a product.
    ///
    /// ## Steps
    /// 1. Validate fields
    /// 2. Check the category and, for composites, both components
    /// 3. Use the given SKU or allocate one from the name
    /// 4. Insert with zero stock
    pub async fn create_product(&self, input: NewProduct) -> DbResult<Product> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let now = uow.now();

        let is_composite = input.is_composite.unwrap_or(false);
        let mut product = Product {
            id: new_id(),
            name: input.name.trim().to_string(),
            sku: String::new(),
            category_id: input.category_id.filter(|c| !c.trim().is_empty()),
            price: input.price.unwrap_or_default(),
            cost_price: input.cost_price.unwrap_or_default(),
            stock: 0,
            is_active: input.is_active.unwrap_or(true),
            pack_size: input.pack_size.unwrap_or(1),
            is_composite,
            bun_component_id: None,
            sausage_component_id: None,
            sausages_per_unit: None,
            created_at: now,
            updated_at: now,
        };
        if is_composite {
            product.bun_component_id = input.bun_component_id;
            product.sausage_component_id = input.sausage_component_id;
            product.sausages_per_unit = Some(input.sausages_per_unit.unwrap_or(1));
        }

        check_product(&mut uow, &product).await?;

        product.sku = match input.sku.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(sku) => {
                validate_sku(sku)?;
                sku.to_string()
            }
            None => allocate_sku(&mut uow, &product.name).await?,
        };

        uow.products().insert(&product).await?;
        uow.commit().await?;

        info!(product_id = %product.id, sku = %product.sku, composite = product.is_composite, "Product created");
        Ok(product)
    }

    /// Applies a partial update. Stock is never touched here.
    pub async fn update_product(&self, id: &str, patch: ProductPatch) -> DbResult<Product> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;

        let mut product = uow
            .products()
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        if let Some(name) = patch.name {
            product.name = name.trim().to_string();
        }
        if let Some(sku) = patch.sku {
            let sku = sku.trim().to_string();
            validate_sku(&sku)?;
            product.sku = sku;
        }
        if let Some(category_id) = patch.category_id {
            product.category_id = Some(category_id).filter(|c| !c.trim().is_empty());
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(cost_price) = patch.cost_price {
            product.cost_price = cost_price;
        }
        if let Some(is_active) = patch.is_active {
            product.is_active = is_active;
        }
        if let Some(pack_size) = patch.pack_size {
            product.pack_size = pack_size;
        }
        if let Some(is_composite) = patch.is_composite {
            product.is_composite = is_composite;
        }
        if product.is_composite {
            if patch.bun_component_id.is_some() {
                product.bun_component_id = patch.bun_component_id;
            }
            if patch.sausage_component_id.is_some() {
                product.sausage_component_id = patch.sausage_component_id;
            }
            if let Some(n) = patch.sausages_per_unit {
                product.sausages_per_unit = Some(n);
            }
            product.sausages_per_unit = product.sausages_per_unit.or(Some(1));
        } else {
            product.bun_component_id = None;
            product.sausage_component_id = None;
            product.sausages_per_unit = None;
        }
        product.updated_at = uow.now();

        check_product(&mut uow, &product).await?;

        uow.products().update(&product).await?;
        uow.commit().await?;

        Ok(product)
    }
}

/// Field and reference checks shared by create and update.
async fn check_product(uow: &mut UnitOfWork, product: &Product) -> DbResult<()> {
    validate_product_name(&product.name)?;
    validate_non_negative_money("price", product.price)?;
    validate_non_negative_money("costPrice", product.cost_price)?;
    validate_pack_size(product.pack_size)?;

    if let Some(category_id) = &product.category_id {
        if uow.categories().get(category_id).await?.is_none() {
            return Err(CoreError::not_found("Category", category_id.clone()).into());
        }
    }

    if product.is_composite {
        if let Some(n) = product.sausages_per_unit {
            validate_sausages_per_unit(n)?;
        }
        let bun = match &product.bun_component_id {
            Some(id) => uow.products().get(id).await?,
            None => None,
        };
        let sausage = match &product.sausage_component_id {
            Some(id) => uow.products().get(id).await?,
            None => None,
        };
        validate_components(Some(product.id.as_str()), &product.name, bun.as_ref(), sausage.as_ref())?;
    }
    Ok(())
}

/// First free SKU derived from the product name.
async fn allocate_sku(uow: &mut UnitOfWork, name: &str) -> DbResult<String> {
    let stem = sku_stem(name);
    for candidate in sku_candidates(&stem) {
        if !uow.products().sku_taken(&candidate).await? {
            return Ok(candidate);
        }
    }
    Err(DbError::Internal(format!("no free SKU for stem {stem}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{admin, db, product};

    #[tokio::test]
    async fn test_duplicate_category_is_conflict() {
        let db = db().await;
        let input = CategoryInput {
            name: "Drinks".into(),
            default_pack_size: None,
        };
        db.catalog().create_category(&input).await.unwrap();

        let err = db.catalog().create_category(&input).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "name"));
        assert_eq!(db.categories().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_auto_sku_appends_counter() {
        let db = db().await;
        let first = product(&db, "Cola 0.5", 100, 0).await;
        let second = product(&db, "Cola 0.5", 100, 0).await;
        let third = product(&db, "Cola 0.5", 100, 0).await;

        assert_eq!(first.sku, "COLA05");
        assert_eq!(second.sku, "COLA0502");
        assert_eq!(third.sku, "COLA0503");
    }

    #[tokio::test]
    async fn test_composite_needs_valid_components() {
        let db = db().await;
        let _admin = admin(&db).await;
        let bun = product(&db, "Bun", 50, 0).await;

        let missing = db
            .catalog()
            .create_product(NewProduct {
                name: "Hot Dog".into(),
                is_composite: Some(true),
                bun_component_id: Some(bun.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(missing, DbError::Domain(CoreError::Configuration { .. })));

        let sausage = product(&db, "Sausage", 80, 0).await;
        let hot_dog = db
            .catalog()
            .create_product(NewProduct {
                name: "Hot Dog".into(),
                price: Some(Money::from_minor(300)),
                is_composite: Some(true),
                bun_component_id: Some(bun.id.clone()),
                sausage_component_id: Some(sausage.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hot_dog.sausages_per_unit, Some(1));

        // a composite cannot be a component
        let nested = db
            .catalog()
            .create_product(NewProduct {
                name: "Combo".into(),
                is_composite: Some(true),
                bun_component_id: Some(hot_dog.id.clone()),
                sausage_component_id: Some(sausage.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(nested, DbError::Domain(CoreError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_update_keeps_stock_and_clears_components() {
        let db = db().await;
        let bun = product(&db, "Bun", 50, 0).await;
        let sausage = product(&db, "Sausage", 80, 0).await;
        let hot_dog = db
            .catalog()
            .create_product(NewProduct {
                name: "Hot Dog".into(),
                is_composite: Some(true),
                bun_component_id: Some(bun.id.clone()),
                sausage_component_id: Some(sausage.id.clone()),
                sausages_per_unit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();

        let updated = db
            .catalog()
            .update_product(
                &hot_dog.id,
                ProductPatch {
                    price: Some(Money::from_minor(450)),
                    is_composite: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.price.minor(), 450);
        assert_eq!(updated.stock, 0);
        assert_eq!(updated.bun_component_id, None);
        assert_eq!(updated.sausages_per_unit, None);
    }

    #[tokio::test]
    async fn test_delete_referenced_category_is_blocked() {
        let db = db().await;
        let category = db
            .catalog()
            .create_category(&CategoryInput {
                name: "Snacks".into(),
                default_pack_size: None,
            })
            .await
            .unwrap();
        db.catalog()
            .create_product(NewProduct {
                name: "Chips".into(),
                category_id: Some(category.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();

        let err = db.categories().delete(&category.id).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
