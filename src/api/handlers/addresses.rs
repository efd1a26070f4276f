use crate::{
    api::{
        ActionResult, ApiResult, AppState,
        extract::{CurrentUser, JsonBody},
        list_tags,
    },
    cache::tags,
    core::{
        address::{self, AddressForm},
        auth,
        contact::Owner,
    },
    entities::address as address_entity,
};
use axum::extract::{Path, State};
use serde_json::Value;
use tracing::instrument;

async fn list_for(state: &AppState, user: &CurrentUser, org_id: i64, owner: Owner) -> ApiResult<Value> {
    auth::require_membership(&state.db, user.id(), org_id).await?;
    let (kind, id) = match owner {
        Owner::Client(id) => ("client", id),
        Owner::Supplier(id) => ("supplier", id),
    };
    let mut list = list_tags(org_id, "addresses");
    list.push(tags::entity(kind, id));
    let addresses = state
        .cached(
            format!("org:{org_id}:addresses:{kind}:{id}"),
            &list,
            address::list_addresses(&state.db, user.id(), org_id, owner),
        )
        .await?;
    Ok(ActionResult::success(addresses))
}

async fn create_for(
    state: &AppState,
    user: &CurrentUser,
    org_id: i64,
    owner: Owner,
    form: &AddressForm,
) -> ApiResult<address_entity::Model> {
    let created = address::create_address(&state.db, user.id(), org_id, owner, form).await?;
    state.touched(org_id, "addresses", Some(("address", created.id))).await;
    Ok(ActionResult::success(created).with_message("address added"))
}

#[instrument(skip(state, user))]
pub async fn list_for_client(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, client_id)): Path<(i64, i64)>,
) -> ApiResult<Value> {
    list_for(&state, &user, org_id, Owner::Client(client_id)).await
}

#[instrument(skip(state, user))]
pub async fn list_for_supplier(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, supplier_id)): Path<(i64, i64)>,
) -> ApiResult<Value> {
    list_for(&state, &user, org_id, Owner::Supplier(supplier_id)).await
}

#[instrument(skip(state, user, form))]
pub async fn create_for_client(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, client_id)): Path<(i64, i64)>,
    JsonBody(form): JsonBody<AddressForm>,
) -> ApiResult<address_entity::Model> {
    create_for(&state, &user, org_id, Owner::Client(client_id), &form).await
}

#[instrument(skip(state, user, form))]
pub async fn create_for_supplier(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, supplier_id)): Path<(i64, i64)>,
    JsonBody(form): JsonBody<AddressForm>,
) -> ApiResult<address_entity::Model> {
    create_for(&state, &user, org_id, Owner::Supplier(supplier_id), &form).await
}

#[instrument(skip(state, user))]
pub async fn get(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, address_id)): Path<(i64, i64)>,
) -> ApiResult<address_entity::Model> {
    let found = address::get_address(&state.db, user.id(), org_id, address_id).await?;
    Ok(ActionResult::success(found))
}

#[instrument(skip(state, user, form))]
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, address_id)): Path<(i64, i64)>,
    JsonBody(form): JsonBody<AddressForm>,
) -> ApiResult<address_entity::Model> {
    let updated = address::update_address(&state.db, user.id(), org_id, address_id, &form).await?;
    state.touched(org_id, "addresses", Some(("address", address_id))).await;
    Ok(ActionResult::success(updated).with_message("address updated"))
}

#[instrument(skip(state, user))]
pub async fn set_default(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, address_id)): Path<(i64, i64)>,
) -> ApiResult<address_entity::Model> {
    let updated = address::set_default_address(&state.db, user.id(), org_id, address_id).await?;
    state.touched(org_id, "addresses", Some(("address", address_id))).await;
    Ok(ActionResult::success(updated).with_message("default address set"))
}

#[instrument(skip(state, user))]
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, address_id)): Path<(i64, i64)>,
) -> ApiResult<()> {
    address::delete_address(&state.db, user.id(), org_id, address_id).await?;
    state.touched(org_id, "addresses", Some(("address", address_id))).await;
    Ok(ActionResult::done("address deleted"))
}
