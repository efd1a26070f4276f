//! Product business logic - Handles the catalog of an organization.
//!
//! This module provides functions for managing product categories and the products
//! they group. Products are archived instead of deleted when they should stop being
//! offered but remain visible on past documents; archived products are hidden from
//! listings unless explicitly requested. All functions are async and return Result
//! types for proper error handling throughout the system.

use crate::{
    core::{
        auth,
        pagination::{self, Page, PageRequest},
        validation,
    },
    entities::{
        Product, ProductCategory, ProductCategoryColumn, ProductColumn,
        enums::{ProductUnit, VatRate},
        product, product_category,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Submitted category fields.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    pub description: Option<String>,
}

/// Submitted product fields.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductForm {
    pub category_id: Option<i64>,
    pub reference: String,
    pub name: String,
    pub description: Option<String>,
    /// Unit price excluding VAT
    pub price: f64,
    #[serde(default = "default_vat_rate")]
    pub vat_rate: VatRate,
    #[serde(default = "default_unit")]
    pub unit: ProductUnit,
}

const fn default_vat_rate() -> VatRate {
    VatRate::Standard
}

const fn default_unit() -> ProductUnit {
    ProductUnit::Unit
}

/// Filters for [`list_products`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    /// Matches name, reference or description
    pub search: Option<String>,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub include_archived: bool,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// A product together with its VAT-inclusive price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: product::Model,
    pub price_with_vat: f64,
}

impl From<product::Model> for ProductView {
    fn from(product: product::Model) -> Self {
        let price_with_vat = price_with_vat(product.price, product.vat_rate);
        Self {
            product,
            price_with_vat,
        }
    }
}

/// Price including VAT, rounded to the cent.
#[must_use]
pub fn price_with_vat(price: f64, vat_rate: VatRate) -> f64 {
    (price * (100.0 + vat_rate.percent())).round() / 100.0
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

async fn ensure_category_name_available<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    name: &str,
    exclude_id: Option<i64>,
) -> Result<()> {
    let mut query = ProductCategory::find()
        .filter(ProductCategoryColumn::OrganizationId.eq(organization_id))
        .filter(ProductCategoryColumn::Name.eq(name));
    if let Some(id) = exclude_id {
        query = query.filter(ProductCategoryColumn::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::conflict(format!("a category named '{name}' already exists")));
    }
    Ok(())
}

async fn find_category<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    category_id: i64,
) -> Result<product_category::Model> {
    ProductCategory::find_by_id(category_id)
        .filter(ProductCategoryColumn::OrganizationId.eq(organization_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("product category", category_id))
}

/// Creates a product category.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or longer than 80 characters
/// - The user is not a member of the organization
/// - Another category of the organization already has this name
pub async fn create_category(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    form: &CategoryForm,
) -> Result<product_category::Model> {
    let name = validation::required("name", &form.name, 80)?;
    let description = validation::optional("description", form.description.as_deref(), 500)?;
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    ensure_category_name_available(&txn, organization_id, &name, None).await?;
    let category = product_category::ActiveModel {
        organization_id: Set(organization_id),
        name: Set(name),
        description: Set(description),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;
    Ok(category)
}

/// Categories of the organization, ordered alphabetically.
///
/// # Errors
/// Returns an error if the user is not a member or the query fails.
pub async fn list_categories(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
) -> Result<Vec<product_category::Model>> {
    auth::require_membership(db, user_id, organization_id).await?;
    ProductCategory::find()
        .filter(ProductCategoryColumn::OrganizationId.eq(organization_id))
        .order_by_asc(ProductCategoryColumn::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Renames or re-describes a category.
///
/// # Errors
/// Same as [`create_category`], plus `NotFound` when the category is not in the organization.
pub async fn update_category(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    category_id: i64,
    form: &CategoryForm,
) -> Result<product_category::Model> {
    let name = validation::required("name", &form.name, 80)?;
    let description = validation::optional("description", form.description.as_deref(), 500)?;
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    let category = find_category(&txn, organization_id, category_id).await?;
    ensure_category_name_available(&txn, organization_id, &name, Some(category_id)).await?;

    let mut active: product_category::ActiveModel = category.into();
    active.name = Set(name);
    active.description = Set(description);
    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Deletes a category. Its products are kept and become uncategorized.
///
/// # Errors
/// Returns an error if the user is not a member or the category is not in the organization.
pub async fn delete_category(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    category_id: i64,
) -> Result<()> {
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    let category = find_category(&txn, organization_id, category_id).await?;
    let detached = Product::update_many()
        .col_expr(ProductColumn::CategoryId, Expr::value(Option::<i64>::None))
        .filter(ProductColumn::CategoryId.eq(category_id))
        .exec(&txn)
        .await?;
    category.delete(&txn).await?;
    txn.commit().await?;

    info!(
        "category {category_id} deleted, {} products detached",
        detached.rows_affected
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

struct ValidProduct {
    reference: String,
    name: String,
    description: Option<String>,
    price: f64,
}

fn validate(form: &ProductForm) -> Result<ValidProduct> {
    Ok(ValidProduct {
        reference: validation::reference("reference", &form.reference)?,
        name: validation::required("name", &form.name, 160)?,
        description: validation::optional("description", form.description.as_deref(), 2000)?,
        price: validation::price("price", form.price)?,
    })
}

async fn ensure_reference_available<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    reference: &str,
    exclude_id: Option<i64>,
) -> Result<()> {
    let mut query = Product::find()
        .filter(ProductColumn::OrganizationId.eq(organization_id))
        .filter(ProductColumn::Reference.eq(reference));
    if let Some(id) = exclude_id {
        query = query.filter(ProductColumn::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::conflict(format!(
            "a product with reference '{reference}' already exists"
        )));
    }
    Ok(())
}

async fn ensure_category<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    category_id: Option<i64>,
) -> Result<()> {
    let Some(id) = category_id else {
        return Ok(());
    };
    match find_category(db, organization_id, id).await {
        Ok(_) => Ok(()),
        Err(Error::NotFound { .. }) => Err(Error::validation(
            "category_id",
            "category does not exist in this organization",
        )),
        Err(e) => Err(e),
    }
}

async fn find_product<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    product_id: i64,
) -> Result<product::Model> {
    Product::find_by_id(product_id)
        .filter(ProductColumn::OrganizationId.eq(organization_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))
}

/// Creates a new product, performing input validation.
///
/// # Errors
/// Returns an error if:
/// - The reference or name is empty or malformed
/// - The price is negative or not finite (NaN, infinity)
/// - The category does not belong to the organization
/// - The user is not a member of the organization
/// - Another product of the organization uses the same reference
pub async fn create_product(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    form: &ProductForm,
) -> Result<product::Model> {
    let valid = validate(form)?;
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    ensure_category(&txn, organization_id, form.category_id).await?;
    ensure_reference_available(&txn, organization_id, &valid.reference, None).await?;

    let now = Utc::now();
    let product = product::ActiveModel {
        organization_id: Set(organization_id),
        category_id: Set(form.category_id),
        reference: Set(valid.reference),
        name: Set(valid.name),
        description: Set(valid.description),
        price: Set(valid.price),
        vat_rate: Set(form.vat_rate),
        unit: Set(form.unit),
        is_archived: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(
        "product {} ({}) created in organization {organization_id}",
        product.reference, product.id
    );
    Ok(product)
}

/// Retrieves a product of the organization, archived or not.
///
/// # Errors
/// Returns an error if the user is not a member or the product is not in the organization.
pub async fn get_product(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    product_id: i64,
) -> Result<product::Model> {
    auth::require_membership(db, user_id, organization_id).await?;
    find_product(db, organization_id, product_id).await
}

/// Products of the organization ordered alphabetically by name, each with its
/// VAT-inclusive price.
///
/// Archived products are only included when `include_archived` is set.
///
/// # Errors
/// Returns an error if the user is not a member or the query fails.
pub async fn list_products(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    query: &ProductQuery,
) -> Result<Page<ProductView>> {
    auth::require_membership(db, user_id, organization_id).await?;

    let mut select = Product::find().filter(ProductColumn::OrganizationId.eq(organization_id));
    if !query.include_archived {
        select = select.filter(ProductColumn::IsArchived.eq(false));
    }
    if let Some(category_id) = query.category_id {
        select = select.filter(ProductColumn::CategoryId.eq(category_id));
    }
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(ProductColumn::Name.contains(term))
                .add(ProductColumn::Reference.contains(term))
                .add(ProductColumn::Description.contains(term)),
        );
    }
    let select = select
        .order_by_asc(ProductColumn::Name)
        .order_by_asc(ProductColumn::Id);

    let page = pagination::fetch_page(
        db,
        select,
        PageRequest {
            page: query.page,
            per_page: query.per_page,
        },
    )
    .await?;
    Ok(page.map(ProductView::from))
}

/// Updates an existing product, performing input validation.
///
/// # Errors
/// Returns an error if:
/// - Any field fails validation (see [`create_product`])
/// - The product does not exist in the organization
/// - The product is archived
/// - The new reference is already used by another product
pub async fn update_product(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    product_id: i64,
    form: &ProductForm,
) -> Result<product::Model> {
    let valid = validate(form)?;
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    let current = find_product(&txn, organization_id, product_id).await?;
    if current.is_archived {
        return Err(Error::conflict("restore the product before editing it"));
    }
    ensure_category(&txn, organization_id, form.category_id).await?;
    if valid.reference != current.reference {
        ensure_reference_available(&txn, organization_id, &valid.reference, Some(product_id))
            .await?;
    }

    let mut active: product::ActiveModel = current.into();
    active.category_id = Set(form.category_id);
    active.reference = Set(valid.reference);
    active.name = Set(valid.name);
    active.description = Set(valid.description);
    active.price = Set(valid.price);
    active.vat_rate = Set(form.vat_rate);
    active.unit = Set(form.unit);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(updated)
}

async fn set_archived(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    product_id: i64,
    archived: bool,
) -> Result<product::Model> {
    auth::require_membership(db, user_id, organization_id).await?;
    let current = find_product(db, organization_id, product_id).await?;
    if current.is_archived == archived {
        let state = if archived { "archived" } else { "active" };
        return Err(Error::conflict(format!("product {product_id} is already {state}")));
    }

    let mut active: product::ActiveModel = current.into();
    active.is_archived = Set(archived);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Hides a product from default listings while keeping it for past documents.
///
/// # Errors
/// Returns `Conflict` if the product is already archived.
pub async fn archive_product(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    product_id: i64,
) -> Result<product::Model> {
    set_archived(db, user_id, organization_id, product_id, true).await
}

/// Brings an archived product back into listings.
///
/// # Errors
/// Returns `Conflict` if the product is not archived.
pub async fn restore_product(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    product_id: i64,
) -> Result<product::Model> {
    set_archived(db, user_id, organization_id, product_id, false).await
}

/// Permanently deletes a product.
///
/// # Errors
/// Returns an error if the user is not a member or the product is not in the organization.
pub async fn delete_product(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    product_id: i64,
) -> Result<()> {
    auth::require_membership(db, user_id, organization_id).await?;
    let product = find_product(db, organization_id, product_id).await?;
    product.delete(db).await?;
    info!("product {product_id} deleted from organization {organization_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    fn category(name: &str) -> CategoryForm {
        CategoryForm {
            name: name.to_string(),
            description: None,
        }
    }

    #[test]
    fn test_price_with_vat() {
        assert_eq!(price_with_vat(100.0, VatRate::Standard), 120.0);
        assert_eq!(price_with_vat(10.0, VatRate::Reduced), 10.55);
        assert_eq!(price_with_vat(9.99, VatRate::SuperReduced), 10.2);
        assert_eq!(price_with_vat(42.0, VatRate::Zero), 42.0);
    }

    #[tokio::test]
    async fn test_create_product_validation() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;

        // Test empty name validation
        let result = create_product(&db, owner.id, org.id, &product_form("SKU-1", "   ", 10.0)).await;
        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "name"));

        // Test negative price validation
        let result = create_product(&db, owner.id, org.id, &product_form("SKU-1", "Widget", -10.0)).await;
        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "price"));

        // Test NaN price validation
        let result = create_product(&db, owner.id, org.id, &product_form("SKU-1", "Widget", f64::NAN)).await;
        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "price"));

        // Test malformed reference
        let result = create_product(&db, owner.id, org.id, &product_form("SKU 1", "Widget", 1.0)).await;
        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "reference"));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_integration() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let tools = create_category(&db, owner.id, org.id, &category("Tools")).await?;

        let mut form = product_form("sku-1", "Hammer", 15.50);
        form.category_id = Some(tools.id);
        let product = create_product(&db, owner.id, org.id, &form).await?;

        assert_eq!(product.reference, "SKU-1");
        assert_eq!(product.name, "Hammer");
        assert_eq!(product.price, 15.50);
        assert_eq!(product.vat_rate, VatRate::Standard);
        assert_eq!(product.category_id, Some(tools.id));
        assert!(!product.is_archived);
        assert_eq!(ProductView::from(product).price_with_vat, 18.6);

        Ok(())
    }

    #[tokio::test]
    async fn test_category_must_belong_to_org() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let other = create_test_organization(&db, owner.id, "Other Org").await?;
        let foreign = create_category(&db, owner.id, other.id, &category("Tools")).await?;

        let mut form = product_form("SKU-1", "Hammer", 1.0);
        form.category_id = Some(foreign.id);
        let result = create_product(&db, owner.id, org.id, &form).await;
        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "category_id"));
        Ok(())
    }

    #[tokio::test]
    async fn test_category_lookup_failure_is_not_a_validation_error() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        db.execute_unprepared("DROP TABLE product_categories").await?;

        let mut form = product_form("SKU-1", "Hammer", 1.0);
        form.category_id = Some(1);
        let result = create_product(&db, owner.id, org.id, &form).await;
        assert!(matches!(result, Err(Error::Database(_))), "{result:?}");
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_product_reference() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        create_test_product(&db, owner.id, org.id, "SKU-1").await?;
        let result = create_test_product(&db, owner.id, org.id, "SKU-1").await;
        assert!(matches!(result, Err(Error::Conflict { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_category_names_unique_per_org() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        create_category(&db, owner.id, org.id, &category("Tools")).await?;
        let paint = create_category(&db, owner.id, org.id, &category("Paint")).await?;

        let result = create_category(&db, owner.id, org.id, &category("Tools")).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));
        let result = update_category(&db, owner.id, org.id, paint.id, &category("Tools")).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        let renamed = update_category(&db, owner.id, org.id, paint.id, &category("Coatings")).await?;
        assert_eq!(renamed.name, "Coatings");

        let names: Vec<String> = list_categories(&db, owner.id, org.id)
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["Coatings", "Tools"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_category_detaches_products() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let tools = create_category(&db, owner.id, org.id, &category("Tools")).await?;
        let mut form = product_form("SKU-1", "Hammer", 10.0);
        form.category_id = Some(tools.id);
        let product = create_product(&db, owner.id, org.id, &form).await?;

        delete_category(&db, owner.id, org.id, tools.id).await?;

        let product = get_product(&db, owner.id, org.id, product.id).await?;
        assert_eq!(product.category_id, None);
        assert!(list_categories(&db, owner.id, org.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_product_integration() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let product = create_test_product(&db, owner.id, org.id, "SKU-1").await?;

        let mut form = product_form("SKU-1", "Updated Name", 15.0);
        form.unit = ProductUnit::Hour;
        let updated = update_product(&db, owner.id, org.id, product.id, &form).await?;

        assert_eq!(updated.name, "Updated Name");
        assert_eq!(updated.price, 15.0);
        assert_eq!(updated.unit, ProductUnit::Hour);
        assert_eq!(updated.id, product.id);

        // Verify the update persisted
        let retrieved = Product::find_by_id(product.id).one(&db).await?.unwrap();
        assert_eq!(retrieved.name, "Updated Name");
        Ok(())
    }

    #[tokio::test]
    async fn test_archive_and_restore() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let product = create_test_product(&db, owner.id, org.id, "SKU-1").await?;
        create_test_product(&db, owner.id, org.id, "SKU-2").await?;

        let archived = archive_product(&db, owner.id, org.id, product.id).await?;
        assert!(archived.is_archived);
        let result = archive_product(&db, owner.id, org.id, product.id).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        // Archived products cannot be edited
        let result =
            update_product(&db, owner.id, org.id, product.id, &product_form("SKU-1", "X", 1.0)).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        let visible = list_products(&db, owner.id, org.id, &ProductQuery::default()).await?;
        assert_eq!(visible.total, 1);
        let everything = list_products(&db, owner.id, org.id, &ProductQuery {
            include_archived: true,
            ..Default::default()
        })
        .await?;
        assert_eq!(everything.total, 2);

        let restored = restore_product(&db, owner.id, org.id, product.id).await?;
        assert!(!restored.is_archived);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_products_filters() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let tools = create_category(&db, owner.id, org.id, &category("Tools")).await?;
        let mut hammer = product_form("SKU-1", "Hammer", 10.0);
        hammer.category_id = Some(tools.id);
        create_product(&db, owner.id, org.id, &hammer).await?;
        create_product(&db, owner.id, org.id, &product_form("SKU-2", "Paint", 20.0)).await?;

        let in_tools = list_products(&db, owner.id, org.id, &ProductQuery {
            category_id: Some(tools.id),
            ..Default::default()
        })
        .await?;
        assert_eq!(in_tools.total, 1);
        assert_eq!(in_tools.items[0].product.name, "Hammer");
        assert_eq!(in_tools.items[0].price_with_vat, 12.0);

        let searched = list_products(&db, owner.id, org.id, &ProductQuery {
            search: Some("pai".to_string()),
            ..Default::default()
        })
        .await?;
        assert_eq!(searched.items.len(), 1);
        assert_eq!(searched.items[0].product.reference, "SKU-2");
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_product_not_found() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;

        // Try to delete non-existent product
        let result = delete_product(&db, owner.id, org.id, 999).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        let product = create_test_product(&db, owner.id, org.id, "SKU-1").await?;
        delete_product(&db, owner.id, org.id, product.id).await?;
        assert_eq!(Product::find().count(&db).await?, 0);
        Ok(())
    }
}
