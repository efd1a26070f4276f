//! Session bridge for the external identity provider.
//!
//! The provider authenticates the person, then calls `POST /api/auth/session`
//! with the shared bridge secret to obtain a session token for them.

use crate::{
    api::{
        ActionResult, ApiResult, AppState,
        extract::{CurrentUser, JsonBody},
    },
    cache::tags,
    core::{auth, organization},
    entities::user,
    errors::Error,
};
use axum::{extract::State, http::HeaderMap};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use subtle::ConstantTimeEq;
use tracing::{info, instrument};

/// Header carrying the bridge secret.
pub const BRIDGE_SECRET_HEADER: &str = "x-factly-bridge-secret";

#[derive(Debug, Deserialize)]
pub struct OpenSession {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct OpenedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: user::Model,
}

#[instrument(skip(state, headers, body), fields(email = %body.0.email))]
pub async fn open(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: JsonBody<OpenSession>,
) -> ApiResult<OpenedSession> {
    let JsonBody(form) = body;
    let Some(secret) = state.config.sessions.bridge_secret.as_deref() else {
        return Err(Error::forbidden("the session bridge is disabled"));
    };
    let presented = headers
        .get(BRIDGE_SECRET_HEADER)
        .map(|v| v.as_bytes())
        .unwrap_or_default();
    if !secret_matches(presented, secret) {
        return Err(Error::Unauthorized);
    }

    let user = auth::ensure_user(&state.db, &form.email, &form.name).await?;
    let session = auth::create_session(
        &state.db,
        user.id,
        Duration::hours(state.config.sessions.ttl_hours),
    )
    .await?;
    info!("session opened for user {}", user.id);

    Ok(ActionResult::success(OpenedSession {
        token: session.token,
        expires_at: session.expires_at,
        user,
    }))
}

/// Compares without short-circuiting on the first differing byte.
fn secret_matches(presented: &[u8], secret: &str) -> bool {
    presented.ct_eq(secret.as_bytes()).into()
}

#[instrument(skip_all, fields(user_id = user.id()))]
pub async fn close(State(state): State<AppState>, user: CurrentUser) -> ApiResult<()> {
    auth::revoke_session(&state.db, &user.token).await?;
    Ok(ActionResult::done("signed out"))
}

/// The current user and the organizations they belong to.
#[instrument(skip_all, fields(user_id = user.id()))]
pub async fn me(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Value> {
    let user_id = user.id();
    let organizations = state
        .cached(
            format!("user:{user_id}:organizations"),
            &[tags::user_organizations(user_id)],
            organization::list_organizations_for_user(&state.db, user_id),
        )
        .await?;
    Ok(ActionResult::success(serde_json::json!({
        "user": user.user,
        "organizations": organizations,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_matches() {
        assert!(secret_matches(b"bridge-secret", "bridge-secret"));
        assert!(!secret_matches(b"bridge-secreT", "bridge-secret"));
        assert!(!secret_matches(b"bridge", "bridge-secret"));
        assert!(!secret_matches(b"", "bridge-secret"));
    }
}
