use crate::{
    api::{
        ActionResult, ApiResult, AppState,
        list_tags,
        extract::{CurrentUser, JsonBody},
    },
    cache::tags,
    core::{
        auth, member,
        organization::{self, OrganizationForm},
    },
    entities::organization as organization_entity,
};
use axum::extract::{Path, State};
use serde_json::Value;
use tracing::instrument;

#[instrument(skip_all, fields(user_id = user.id()))]
pub async fn list(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Value> {
    let user_id = user.id();
    let organizations = state
        .cached(
            format!("user:{user_id}:organizations"),
            &[tags::user_organizations(user_id)],
            organization::list_organizations_for_user(&state.db, user_id),
        )
        .await?;
    Ok(ActionResult::success(organizations))
}

#[instrument(skip_all, fields(user_id = user.id()))]
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(form): JsonBody<OrganizationForm>,
) -> ApiResult<organization_entity::Model> {
    let created = organization::create_organization(&state.db, user.id(), &form).await?;
    state
        .cache
        .invalidate_tag(&tags::user_organizations(user.id()))
        .await;
    Ok(ActionResult::success(created).with_message("organization created"))
}

#[instrument(skip(state, user))]
pub async fn get(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
) -> ApiResult<organization_entity::Model> {
    let org = organization::get_organization(&state.db, user.id(), org_id).await?;
    Ok(ActionResult::success(org))
}

#[instrument(skip(state, user, form))]
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
    JsonBody(form): JsonBody<OrganizationForm>,
) -> ApiResult<organization_entity::Model> {
    let updated = organization::update_organization(&state.db, user.id(), org_id, &form).await?;
    // Every member's organization list shows the name
    let member_tags: Vec<String> = member::list_members(&state.db, user.id(), org_id)
        .await?
        .iter()
        .map(|m| tags::user_organizations(m.user_id))
        .collect();
    state.cache.invalidate_tags(&member_tags).await;
    Ok(ActionResult::success(updated).with_message("organization updated"))
}

#[instrument(skip(state, user))]
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
) -> ApiResult<()> {
    let mut stale: Vec<String> = member::list_members(&state.db, user.id(), org_id)
        .await?
        .iter()
        .map(|m| tags::user_organizations(m.user_id))
        .collect();
    organization::delete_organization(&state.db, user.id(), org_id).await?;
    stale.push(tags::organization(org_id));
    state.cache.invalidate_tags(&stale).await;
    Ok(ActionResult::done("organization deleted"))
}

/// Dashboard counters.
#[instrument(skip(state, user))]
pub async fn overview(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
) -> ApiResult<Value> {
    auth::require_membership(&state.db, user.id(), org_id).await?;
    let overview = state
        .cached(
            format!("org:{org_id}:overview"),
            &list_tags(org_id, "overview"),
            organization::organization_overview(&state.db, user.id(), org_id),
        )
        .await?;
    Ok(ActionResult::success(overview))
}
