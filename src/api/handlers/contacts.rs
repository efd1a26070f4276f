use crate::{
    api::{
        ActionResult, ApiResult, AppState,
        extract::{CurrentUser, JsonBody},
        list_tags,
    },
    cache::tags,
    core::{
        auth,
        contact::{self, ContactForm, Owner},
    },
    entities::contact as contact_entity,
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
    let mut list = list_tags(org_id, "contacts");
    list.push(tags::entity(kind, id));
    let contacts = state
        .cached(
            format!("org:{org_id}:contacts:{kind}:{id}"),
            &list,
            contact::list_contacts(&state.db, user.id(), org_id, owner),
        )
        .await?;
    Ok(ActionResult::success(contacts))
}

async fn create_for(
    state: &AppState,
    user: &CurrentUser,
    org_id: i64,
    owner: Owner,
    form: &ContactForm,
) -> ApiResult<contact_entity::Model> {
    let created = contact::create_contact(&state.db, user.id(), org_id, owner, form).await?;
    state.touched(org_id, "contacts", Some(("contact", created.id))).await;
    Ok(ActionResult::success(created).with_message("contact added"))
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
    JsonBody(form): JsonBody<ContactForm>,
) -> ApiResult<contact_entity::Model> {
    create_for(&state, &user, org_id, Owner::Client(client_id), &form).await
}

#[instrument(skip(state, user, form))]
pub async fn create_for_supplier(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, supplier_id)): Path<(i64, i64)>,
    JsonBody(form): JsonBody<ContactForm>,
) -> ApiResult<contact_entity::Model> {
    create_for(&state, &user, org_id, Owner::Supplier(supplier_id), &form).await
}

#[instrument(skip(state, user))]
pub async fn get(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, contact_id)): Path<(i64, i64)>,
) -> ApiResult<contact_entity::Model> {
    let found = contact::get_contact(&state.db, user.id(), org_id, contact_id).await?;
    Ok(ActionResult::success(found))
}

#[instrument(skip(state, user, form))]
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, contact_id)): Path<(i64, i64)>,
    JsonBody(form): JsonBody<ContactForm>,
) -> ApiResult<contact_entity::Model> {
    let updated = contact::update_contact(&state.db, user.id(), org_id, contact_id, &form).await?;
    state.touched(org_id, "contacts", Some(("contact", contact_id))).await;
    Ok(ActionResult::success(updated).with_message("contact updated"))
}

#[instrument(skip(state, user))]
pub async fn set_primary(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, contact_id)): Path<(i64, i64)>,
) -> ApiResult<contact_entity::Model> {
    let updated = contact::set_primary_contact(&state.db, user.id(), org_id, contact_id).await?;
    state.touched(org_id, "contacts", Some(("contact", contact_id))).await;
    Ok(ActionResult::success(updated).with_message("primary contact set"))
}

#[instrument(skip(state, user))]
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, contact_id)): Path<(i64, i64)>,
) -> ApiResult<()> {
    contact::delete_contact(&state.db, user.id(), org_id, contact_id).await?;
    state.touched(org_id, "contacts", Some(("contact", contact_id))).await;
    Ok(ActionResult::done("contact deleted"))
}
