use crate::{
    api::{ActionResult, ApiResult, AppState},
    config::database,
    core::labels::{self, LabelEntry},
};
use axum::extract::State;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::instrument;

/// Liveness plus a database ping.
#[instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    database::check_connection(&state.db).await?;
    Ok(ActionResult::success(json!({ "database": "ok" })))
}

/// Labels, colors and descriptions of every enumerated value.
pub async fn labels() -> ApiResult<BTreeMap<&'static str, Vec<LabelEntry>>> {
    Ok(ActionResult::success(labels::all_enum_labels()))
}
