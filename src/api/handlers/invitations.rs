use crate::{
    api::{
        ActionResult, ApiResult, AppState,
        extract::{CurrentUser, JsonBody, QueryParams},
        list_tags,
    },
    cache::tags,
    core::{
        auth,
        invitation::{self, InvitationForm, ReceivedInvitation},
    },
    entities::{
        enums::{InvitationStatus, MemberRole},
        invitation as invitation_entity, member,
    },
};
use axum::extract::{Path, State};
use chrono::Duration;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

#[derive(Debug, Default, Deserialize)]
pub struct InvitationFilter {
    pub status: Option<InvitationStatus>,
}

#[instrument(skip(state, user))]
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
    QueryParams(filter): QueryParams<InvitationFilter>,
) -> ApiResult<Value> {
    auth::require_member_role(&state.db, user.id(), org_id, MemberRole::Admin).await?;
    let key = match filter.status {
        Some(status) => format!("org:{org_id}:invitations:{status:?}"),
        None => format!("org:{org_id}:invitations"),
    };
    let invitations = state
        .cached(
            key,
            &list_tags(org_id, "invitations"),
            invitation::list_invitations(&state.db, user.id(), org_id, filter.status),
        )
        .await?;
    Ok(ActionResult::success(invitations))
}

#[instrument(skip(state, user, form))]
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
    JsonBody(form): JsonBody<InvitationForm>,
) -> ApiResult<invitation_entity::Model> {
    let created = invitation::create_invitation(
        &state.db,
        state.mailer.as_ref(),
        Duration::days(state.config.invitations.ttl_days),
        user.id(),
        org_id,
        &form,
    )
    .await?;
    state.touched(org_id, "invitations", None).await;
    Ok(ActionResult::success(created).with_message("invitation sent"))
}

#[instrument(skip(state, user))]
pub async fn cancel(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, invitation_id)): Path<(i64, i64)>,
) -> ApiResult<invitation_entity::Model> {
    let cancelled =
        invitation::cancel_invitation(&state.db, user.id(), org_id, invitation_id).await?;
    state
        .touched(org_id, "invitations", Some(("invitation", invitation_id)))
        .await;
    Ok(ActionResult::success(cancelled).with_message("invitation cancelled"))
}

/// Pending invitations addressed to the current user.
#[instrument(skip_all, fields(user_id = user.id()))]
pub async fn received(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Vec<ReceivedInvitation>> {
    let invitations = invitation::list_invitations_for_user(&state.db, &user.user).await?;
    Ok(ActionResult::success(invitations))
}

#[instrument(skip_all, fields(user_id = user.id()))]
pub async fn accept(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(token): Path<String>,
) -> ApiResult<member::Model> {
    let membership = invitation::accept_invitation(&state.db, &user.user, &token).await?;
    let org_id = membership.organization_id;
    state.touched(org_id, "invitations", None).await;
    state.touched(org_id, "members", None).await;
    state
        .cache
        .invalidate_tag(&tags::user_organizations(user.id()))
        .await;
    Ok(ActionResult::success(membership).with_message("invitation accepted"))
}

#[instrument(skip_all, fields(user_id = user.id()))]
pub async fn reject(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(token): Path<String>,
) -> ApiResult<invitation_entity::Model> {
    let rejected = invitation::reject_invitation(&state.db, &user.user, &token).await?;
    state
        .touched(rejected.organization_id, "invitations", None)
        .await;
    Ok(ActionResult::success(rejected).with_message("invitation rejected"))
}
