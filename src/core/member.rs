//! Member business logic - roles and departures.
//!
//! Rules:
//! - only `ADMIN` or `OWNER` may change roles or remove members
//! - only an `OWNER` may grant, revoke or remove the `OWNER` role
//! - nobody changes their own role
//! - an organization always keeps at least one `OWNER`

use crate::{
    core::auth,
    entities::{Member, MemberColumn, User, enums::MemberRole, member, user},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Serialize;
use tracing::info;

/// A membership joined with the user it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberWithUser {
    pub id: i64,
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub role: MemberRole,
    pub joined_at: DateTimeUtc,
}

impl MemberWithUser {
    fn from_rows(member: member::Model, user: user::Model) -> Self {
        Self {
            id: member.id,
            user_id: user.id,
            email: user.email,
            name: user.name,
            role: member.role,
            joined_at: member.created_at,
        }
    }
}

async fn owner_count(db: &DatabaseConnection, organization_id: i64) -> Result<u64> {
    Member::find()
        .filter(MemberColumn::OrganizationId.eq(organization_id))
        .filter(MemberColumn::Role.eq(MemberRole::Owner))
        .count(db)
        .await
        .map_err(Into::into)
}

async fn find_member(
    db: &DatabaseConnection,
    organization_id: i64,
    member_id: i64,
) -> Result<member::Model> {
    Member::find_by_id(member_id)
        .filter(MemberColumn::OrganizationId.eq(organization_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("member", member_id))
}

/// Members of the organization, oldest first.
pub async fn list_members(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
) -> Result<Vec<MemberWithUser>> {
    auth::require_membership(db, user_id, organization_id).await?;

    let rows = Member::find()
        .filter(MemberColumn::OrganizationId.eq(organization_id))
        .find_also_related(User)
        .order_by_asc(MemberColumn::CreatedAt)
        .order_by_asc(MemberColumn::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(member, user)| user.map(|user| MemberWithUser::from_rows(member, user)))
        .collect())
}

/// Changes another member's role.
///
/// # Errors
///
/// - `Forbidden` unless the caller is an admin, when targeting themselves, or
///   when a non-owner grants or revokes the owner role
/// - `NotFound` when the member is not in the organization
pub async fn update_member_role(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    member_id: i64,
    role: MemberRole,
) -> Result<member::Model> {
    let actor = auth::require_member_role(db, user_id, organization_id, MemberRole::Admin).await?;
    let target = find_member(db, organization_id, member_id).await?;

    if target.user_id == actor.user_id {
        return Err(Error::forbidden("you cannot change your own role"));
    }
    let touches_owner = target.role == MemberRole::Owner || role == MemberRole::Owner;
    if touches_owner && actor.role != MemberRole::Owner {
        return Err(Error::forbidden("only an owner can grant or revoke the owner role"));
    }
    if target.role == role {
        return Ok(target);
    }

    let mut active: member::ActiveModel = target.into();
    active.role = Set(role);
    let updated = active.update(db).await?;
    info!(
        "member {member_id} of organization {organization_id} is now {:?}",
        updated.role
    );
    Ok(updated)
}

/// Removes another member from the organization and returns the removed row.
///
/// # Errors
///
/// Returns a validation error when targeting the caller (see
/// [`leave_organization`]) and `Conflict` when removing the last owner.
pub async fn remove_member(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    member_id: i64,
) -> Result<member::Model> {
    let actor = auth::require_member_role(db, user_id, organization_id, MemberRole::Admin).await?;
    let target = find_member(db, organization_id, member_id).await?;

    if target.user_id == actor.user_id {
        return Err(Error::validation(
            "member_id",
            "use leave to remove yourself from an organization",
        ));
    }
    if target.role == MemberRole::Owner {
        if actor.role != MemberRole::Owner {
            return Err(Error::forbidden("only an owner can remove another owner"));
        }
        if owner_count(db, organization_id).await? <= 1 {
            return Err(Error::conflict("an organization must keep at least one owner"));
        }
    }

    target.clone().delete(db).await?;
    info!("member {member_id} removed from organization {organization_id}");
    Ok(target)
}

/// Removes the caller from the organization.
///
/// # Errors
///
/// Returns `Conflict` if the caller is the last owner.
pub async fn leave_organization(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
) -> Result<()> {
    let me = auth::require_membership(db, user_id, organization_id).await?;
    if me.role == MemberRole::Owner && owner_count(db, organization_id).await? <= 1 {
        return Err(Error::conflict(
            "transfer ownership before leaving: an organization must keep at least one owner",
        ));
    }
    me.delete(db).await?;
    info!("user {user_id} left organization {organization_id}");
    Ok(())
}
