use crate::{
    api::{
        ActionResult, ApiResult, AppState,
        extract::{CurrentUser, JsonBody, QueryParams},
        list_tags,
    },
    core::{
        auth,
        product::{self, CategoryForm, ProductForm, ProductQuery, ProductView},
    },
    entities::product_category,
};
use axum::extract::{Path, State};
use serde_json::Value;
use tracing::instrument;

#[instrument(skip(state, user))]
pub async fn list_categories(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
) -> ApiResult<Value> {
    auth::require_membership(&state.db, user.id(), org_id).await?;
    let categories = state
        .cached(
            format!("org:{org_id}:product-categories"),
            &list_tags(org_id, "product-categories"),
            product::list_categories(&state.db, user.id(), org_id),
        )
        .await?;
    Ok(ActionResult::success(categories))
}

#[instrument(skip(state, user, form))]
pub async fn create_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
    JsonBody(form): JsonBody<CategoryForm>,
) -> ApiResult<product_category::Model> {
    let created = product::create_category(&state.db, user.id(), org_id, &form).await?;
    state.touched(org_id, "product-categories", None).await;
    Ok(ActionResult::success(created).with_message("category created"))
}

#[instrument(skip(state, user, form))]
pub async fn update_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, category_id)): Path<(i64, i64)>,
    JsonBody(form): JsonBody<CategoryForm>,
) -> ApiResult<product_category::Model> {
    let updated =
        product::update_category(&state.db, user.id(), org_id, category_id, &form).await?;
    state.touched(org_id, "product-categories", None).await;
    Ok(ActionResult::success(updated).with_message("category updated"))
}

#[instrument(skip(state, user))]
pub async fn delete_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, category_id)): Path<(i64, i64)>,
) -> ApiResult<()> {
    product::delete_category(&state.db, user.id(), org_id, category_id).await?;
    state.touched(org_id, "product-categories", None).await;
    // Detached products change too
    state.touched(org_id, "products", None).await;
    Ok(ActionResult::done("category deleted"))
}

#[instrument(skip(state, user))]
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
    QueryParams(query): QueryParams<ProductQuery>,
) -> ApiResult<Value> {
    auth::require_membership(&state.db, user.id(), org_id).await?;
    let page = state
        .cached(
            format!("org:{org_id}:products:{query:?}"),
            &list_tags(org_id, "products"),
            product::list_products(&state.db, user.id(), org_id, &query),
        )
        .await?;
    Ok(ActionResult::success(page))
}

#[instrument(skip(state, user, form))]
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
    JsonBody(form): JsonBody<ProductForm>,
) -> ApiResult<ProductView> {
    let created = product::create_product(&state.db, user.id(), org_id, &form).await?;
    state.touched(org_id, "products", Some(("product", created.id))).await;
    Ok(ActionResult::success(created.into()).with_message("product created"))
}

/// One product with its VAT-inclusive price.
#[instrument(skip(state, user))]
pub async fn get(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, product_id)): Path<(i64, i64)>,
) -> ApiResult<ProductView> {
    let found = product::get_product(&state.db, user.id(), org_id, product_id).await?;
    Ok(ActionResult::success(found.into()))
}

#[instrument(skip(state, user, form))]
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, product_id)): Path<(i64, i64)>,
    JsonBody(form): JsonBody<ProductForm>,
) -> ApiResult<ProductView> {
    let updated = product::update_product(&state.db, user.id(), org_id, product_id, &form).await?;
    state.touched(org_id, "products", Some(("product", product_id))).await;
    Ok(ActionResult::success(updated.into()).with_message("product updated"))
}

#[instrument(skip(state, user))]
pub async fn archive(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, product_id)): Path<(i64, i64)>,
) -> ApiResult<ProductView> {
    let archived = product::archive_product(&state.db, user.id(), org_id, product_id).await?;
    state.touched(org_id, "products", Some(("product", product_id))).await;
    Ok(ActionResult::success(archived.into()).with_message("product archived"))
}

#[instrument(skip(state, user))]
pub async fn restore(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, product_id)): Path<(i64, i64)>,
) -> ApiResult<ProductView> {
    let restored = product::restore_product(&state.db, user.id(), org_id, product_id).await?;
    state.touched(org_id, "products", Some(("product", product_id))).await;
    Ok(ActionResult::success(restored.into()).with_message("product restored"))
}

#[instrument(skip(state, user))]
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, product_id)): Path<(i64, i64)>,
) -> ApiResult<()> {
    product::delete_product(&state.db, user.id(), org_id, product_id).await?;
    state.touched(org_id, "products", Some(("product", product_id))).await;
    Ok(ActionResult::done("product deleted"))
}
