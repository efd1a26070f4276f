use crate::{
    api::{
        ActionResult, ApiResult, AppState,
        extract::{CurrentUser, JsonBody, QueryParams},
        list_tags,
    },
    core::{
        auth,
        fiscal_year::{self, FiscalYearForm},
    },
    entities::{enums::FiscalYearStatus, fiscal_year as fiscal_year_entity},
};
use axum::extract::{Path, State};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: FiscalYearStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct CoveringDate {
    /// Defaults to today (UTC)
    pub date: Option<NaiveDate>,
}

#[instrument(skip(state, user))]
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
) -> ApiResult<Value> {
    auth::require_membership(&state.db, user.id(), org_id).await?;
    let years = state
        .cached(
            format!("org:{org_id}:fiscal-years"),
            &list_tags(org_id, "fiscal-years"),
            fiscal_year::list_fiscal_years(&state.db, user.id(), org_id),
        )
        .await?;
    Ok(ActionResult::success(years))
}

/// The fiscal year covering `?date=` (or today); `data` is null when none does.
#[instrument(skip(state, user))]
pub async fn current(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
    QueryParams(query): QueryParams<CoveringDate>,
) -> ApiResult<Option<fiscal_year_entity::Model>> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let year = fiscal_year::current_fiscal_year(&state.db, user.id(), org_id, date).await?;
    Ok(ActionResult::success(year))
}

#[instrument(skip(state, user, form))]
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(org_id): Path<i64>,
    JsonBody(form): JsonBody<FiscalYearForm>,
) -> ApiResult<fiscal_year_entity::Model> {
    let created = fiscal_year::create_fiscal_year(&state.db, user.id(), org_id, &form).await?;
    state
        .touched(org_id, "fiscal-years", Some(("fiscal-year", created.id)))
        .await;
    Ok(ActionResult::success(created).with_message("fiscal year created"))
}

#[instrument(skip(state, user))]
pub async fn get(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, fiscal_year_id)): Path<(i64, i64)>,
) -> ApiResult<fiscal_year_entity::Model> {
    let found = fiscal_year::get_fiscal_year(&state.db, user.id(), org_id, fiscal_year_id).await?;
    Ok(ActionResult::success(found))
}

#[instrument(skip(state, user, form))]
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, fiscal_year_id)): Path<(i64, i64)>,
    JsonBody(form): JsonBody<FiscalYearForm>,
) -> ApiResult<fiscal_year_entity::Model> {
    let updated =
        fiscal_year::update_fiscal_year(&state.db, user.id(), org_id, fiscal_year_id, &form)
            .await?;
    state
        .touched(org_id, "fiscal-years", Some(("fiscal-year", fiscal_year_id)))
        .await;
    Ok(ActionResult::success(updated).with_message("fiscal year updated"))
}

#[instrument(skip(state, user))]
pub async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, fiscal_year_id)): Path<(i64, i64)>,
    JsonBody(change): JsonBody<StatusChange>,
) -> ApiResult<fiscal_year_entity::Model> {
    let updated = fiscal_year::update_fiscal_year_status(
        &state.db,
        user.id(),
        org_id,
        fiscal_year_id,
        change.status,
    )
    .await?;
    state
        .touched(org_id, "fiscal-years", Some(("fiscal-year", fiscal_year_id)))
        .await;
    Ok(ActionResult::success(updated).with_message("status updated"))
}

#[instrument(skip(state, user))]
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((org_id, fiscal_year_id)): Path<(i64, i64)>,
) -> ApiResult<()> {
    fiscal_year::delete_fiscal_year(&state.db, user.id(), org_id, fiscal_year_id).await?;
    state
        .touched(org_id, "fiscal-years", Some(("fiscal-year", fiscal_year_id)))
        .await;
    Ok(ActionResult::done("fiscal year deleted"))
}
