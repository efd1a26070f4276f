use crate::{
    api::{
        ActionResult, ApiResult, AppState,
        extract::{CurrentUser, JsonBody},
        list_tags,
    },
    cache::tags,
    core::{auth, member},
    entities::{enums::MemberRole, member as member_entity},
};
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: MemberRole,
}

#[instrument(skip(state, user))]
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
) -> ApiResult<Value> {
    auth::require_membership(&state.db, user.id(), org_id).await?;
    let members = state
        .cached(
            format!("org:{org_id}:members"),
            &list_tags(org_id, "members"),
            member::list_members(&state.db, user.id(), org_id),
        )
        .await?;
    Ok(ActionResult::success(members))
}

#[instrument(skip(state, user))]
pub async fn update_role(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, member_id)): Path<(i64, i64)>,
    JsonBody(change): JsonBody<RoleChange>,
) -> ApiResult<member_entity::Model> {
    let updated =
        member::update_member_role(&state.db, user.id(), org_id, member_id, change.role).await?;
    state.touched(org_id, "members", Some(("member", member_id))).await;
    state
        .cache
        .invalidate_tag(&tags::user_organizations(updated.user_id))
        .await;
    Ok(ActionResult::success(updated).with_message("role updated"))
}

#[instrument(skip(state, user))]
pub async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, member_id)): Path<(i64, i64)>,
) -> ApiResult<()> {
    let removed = member::remove_member(&state.db, user.id(), org_id, member_id).await?;
    state.touched(org_id, "members", Some(("member", member_id))).await;
    state
        .cache
        .invalidate_tag(&tags::user_organizations(removed.user_id))
        .await;
    Ok(ActionResult::done("member removed"))
}

#[instrument(skip(state, user))]
pub async fn leave(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
) -> ApiResult<()> {
    member::leave_organization(&state.db, user.id(), org_id).await?;
    state.touched(org_id, "members", None).await;
    state
        .cache
        .invalidate_tag(&tags::user_organizations(user.id()))
        .await;
    Ok(ActionResult::done("you left the organization"))
}
