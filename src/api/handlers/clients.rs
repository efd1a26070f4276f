use crate::{
    api::{
        ActionResult, ApiResult, AppState,
        extract::{CurrentUser, JsonBody, QueryParams},
        list_tags,
    },
    core::{
        auth,
        client::{self, ClientForm, ClientQuery},
    },
    entities::{client as client_entity, enums::ClientStatus},
};
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: ClientStatus,
}

#[instrument(skip(state, user))]
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
    QueryParams(query): QueryParams<ClientQuery>,
) -> ApiResult<Value> {
    auth::require_membership(&state.db, user.id(), org_id).await?;
    let page = state
        .cached(
            format!("org:{org_id}:clients:{query:?}"),
            &list_tags(org_id, "clients"),
            client::list_clients(&state.db, user.id(), org_id, &query),
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
    let reference = client::next_client_reference(&state.db, user.id(), org_id).await?;
    Ok(ActionResult::success(reference))
}

#[instrument(skip(state, user, form))]
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
    JsonBody(form): JsonBody<ClientForm>,
) -> ApiResult<client_entity::Model> {
    let created = client::create_client(&state.db, user.id(), org_id, &form).await?;
    state.touched(org_id, "clients", Some(("client", created.id))).await;
    Ok(ActionResult::success(created).with_message("client created"))
}

#[instrument(skip(state, user))]
pub async fn get(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, client_id)): Path<(i64, i64)>,
) -> ApiResult<client_entity::Model> {
    let found = client::get_client(&state.db, user.id(), org_id, client_id).await?;
    Ok(ActionResult::success(found))
}

#[instrument(skip(state, user, form))]
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, client_id)): Path<(i64, i64)>,
    JsonBody(form): JsonBody<ClientForm>,
) -> ApiResult<client_entity::Model> {
    let updated = client::update_client(&state.db, user.id(), org_id, client_id, &form).await?;
    state.touched(org_id, "clients", Some(("client", client_id))).await;
    Ok(ActionResult::success(updated).with_message("client updated"))
}

#[instrument(skip(state, user))]
pub async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, client_id)): Path<(i64, i64)>,
    JsonBody(change): JsonBody<StatusChange>,
) -> ApiResult<client_entity::Model> {
    let updated =
        client::update_client_status(&state.db, user.id(), org_id, client_id, change.status)
            .await?;
    state.touched(org_id, "clients", Some(("client", client_id))).await;
    Ok(ActionResult::success(updated).with_message("status updated"))
}

#[instrument(skip(state, user))]
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, client_id)): Path<(i64, i64)>,
) -> ApiResult<()> {
    client::delete_client(&state.db, user.id(), org_id, client_id).await?;
    state.touched(org_id, "clients", Some(("client", client_id))).await;
    Ok(ActionResult::done("client deleted"))
}
