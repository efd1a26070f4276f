//! Session and membership checks.
//!
//! Identity is verified by an external provider; once it vouches for an email,
//! [`ensure_user`] mirrors the user and [`create_session`] issues a bearer token.
//! Every action then resolves the token with [`resolve_session`] and checks
//! row-level access with [`require_membership`].

use crate::{
    entities::{
        Member, MemberColumn, Organization, Session, SessionColumn, User, UserColumn,
        enums::MemberRole, member, session, user,
    },
    errors::{Error, Result},
};
use chrono::{Duration, Utc};
use sea_orm::{Set, prelude::*};
use tracing::debug;
use uuid::Uuid;

/// Finds the user with `email`, creating it on first sight.
///
/// The name is refreshed when the provider reports a different one.
pub async fn ensure_user(db: &DatabaseConnection, email: &str, name: &str) -> Result<user::Model> {
    let email = super::validation::email("email", email)?;
    let name = super::validation::required("name", name, 120)?;

    if let Some(existing) = User::find()
        .filter(UserColumn::Email.eq(email.as_str()))
        .one(db)
        .await?
    {
        if existing.name == name {
            return Ok(existing);
        }
        let mut active: user::ActiveModel = existing.into();
        active.name = Set(name);
        return active.update(db).await.map_err(Into::into);
    }

    user::ActiveModel {
        email: Set(email),
        name: Set(name),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Issues a new session token for `user_id` valid for `ttl`.
pub async fn create_session(
    db: &DatabaseConnection,
    user_id: i64,
    ttl: Duration,
) -> Result<session::Model> {
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    let now = Utc::now();
    // Two v4 UUIDs give 244 random bits
    let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    session::ActiveModel {
        token: Set(token),
        user_id: Set(user_id),
        expires_at: Set(now + ttl),
        created_at: Set(now),
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Returns the user owning `token`.
///
/// # Errors
/// `Unauthorized` when the token is unknown or expired. Expired sessions are deleted.
pub async fn resolve_session(db: &DatabaseConnection, token: &str) -> Result<user::Model> {
    let Some(session) = Session::find_by_id(token.to_string()).one(db).await? else {
        return Err(Error::Unauthorized);
    };

    if session.expires_at <= Utc::now() {
        debug!("session for user {} expired", session.user_id);
        session.delete(db).await?;
        return Err(Error::Unauthorized);
    }

    User::find_by_id(session.user_id)
        .one(db)
        .await?
        .ok_or(Error::Unauthorized)
}

/// Deletes the session; unknown tokens are ignored.
pub async fn revoke_session(db: &DatabaseConnection, token: &str) -> Result<()> {
    Session::delete_many()
        .filter(SessionColumn::Token.eq(token))
        .exec(db)
        .await?;
    Ok(())
}

/// Returns the caller's membership in `organization_id`.
///
/// # Errors
/// - `NotFound` if the organization does not exist
/// - `Forbidden` if the user is not a member
pub async fn require_membership(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
) -> Result<member::Model> {
    Organization::find_by_id(organization_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("organization", organization_id))?;

    Member::find()
        .filter(MemberColumn::OrganizationId.eq(organization_id))
        .filter(MemberColumn::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::forbidden("you are not a member of this organization"))
}

/// Fails with `Forbidden` unless `member` has at least `role`.
pub fn require_role(member: &member::Model, role: MemberRole) -> Result<()> {
    if member.role.at_least(role) {
        Ok(())
    } else {
        Err(Error::forbidden(format!(
            "this action requires the {role:?} role"
        )))
    }
}

/// Membership check followed by a role check.
pub async fn require_member_role(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    role: MemberRole,
) -> Result<member::Model> {
    let member = require_membership(db, user_id, organization_id).await?;
    require_role(&member, role)?;
    Ok(member)
}
