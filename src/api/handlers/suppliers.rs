use crate::{
    api::{
        ActionResult, ApiResult, AppState,
        extract::{CurrentUser, JsonBody, QueryParams},
        list_tags,
    },
    core::{
        auth,
        supplier::{self, SupplierForm, SupplierQuery},
    },
    entities::{enums::SupplierStatus, supplier as supplier_entity},
};
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: SupplierStatus,
}

#[instrument(skip(state, user))]
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
    QueryParams(query): QueryParams<SupplierQuery>,
) -> ApiResult<Value> {
    auth::require_membership(&state.db, user.id(), org_id).await?;
    let page = state
        .cached(
            format!("org:{org_id}:suppliers:{query:?}"),
            &list_tags(org_id, "suppliers"),
            supplier::list_suppliers(&state.db, user.id(), org_id, &query),
        )
        .await?;
    Ok(ActionResult::success(page))
}

#[instrument(skip(state, user))]
pub async fn next_reference(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
) -> ApiResult<String> {
    let reference = supplier::next_supplier_reference(&state.db, user.id(), org_id).await?;
    Ok(ActionResult::success(reference))
}

#[instrument(skip(state, user, form))]
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
    JsonBody(form): JsonBody<SupplierForm>,
) -> ApiResult<supplier_entity::Model> {
    let created = supplier::create_supplier(&state.db, user.id(), org_id, &form).await?;
    state.touched(org_id, "suppliers", Some(("supplier", created.id))).await;
    Ok(ActionResult::success(created).with_message("supplier created"))
}

#[instrument(skip(state, user))]
pub async fn get(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, supplier_id)): Path<(i64, i64)>,
) -> ApiResult<supplier_entity::Model> {
    let found = supplier::get_supplier(&state.db, user.id(), org_id, supplier_id).await?;
    Ok(ActionResult::success(found))
}

#[instrument(skip(state, user, form))]
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, supplier_id)): Path<(i64, i64)>,
    JsonBody(form): JsonBody<SupplierForm>,
) -> ApiResult<supplier_entity::Model> {
    let updated = supplier::update_supplier(&state.db, user.id(), org_id, supplier_id, &form).await?;
    state.touched(org_id, "suppliers", Some(("supplier", supplier_id))).await;
    Ok(ActionResult::success(updated).with_message("supplier updated"))
}

#[instrument(skip(state, user))]
pub async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, supplier_id)): Path<(i64, i64)>,
    JsonBody(change): JsonBody<StatusChange>,
) -> ApiResult<supplier_entity::Model> {
    let updated =
        supplier::update_supplier_status(&state.db, user.id(), org_id, supplier_id, change.status)
            .await?;
    state.touched(org_id, "suppliers", Some(("supplier", supplier_id))).await;
    Ok(ActionResult::success(updated).with_message("status updated"))
}

#[instrument(skip(state, user))]
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, supplier_id)): Path<(i64, i64)>,
) -> ApiResult<()> {
    supplier::delete_supplier(&state.db, user.id(), org_id, supplier_id).await?;
    state.touched(org_id, "suppliers", Some(("supplier", supplier_id))).await;
    Ok(ActionResult::done("supplier deleted"))
}
