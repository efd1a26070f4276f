//! Invitation business logic.
//!
//! Admins invite an email address with a role. The invitee receives a token by
//! email and accepts or rejects it while signed in with the same address.
//! Status changes go through the invitation transition table; a pending
//! invitation past its deadline becomes `EXPIRED` the next time it is touched
//! or when [`expire_stale_invitations`] runs.

use crate::{
    core::{auth, transitions, validation},
    entities::{
        Invitation, InvitationColumn, Member, MemberColumn, Organization, User, UserColumn,
        enums::{InvitationStatus, MemberRole},
        invitation, member, user,
    },
    errors::{Error, Result},
    mailer::{InvitationEmail, Mailer},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Submitted invitation.
#[derive(Debug, Clone, Deserialize)]
pub struct InvitationForm {
    pub email: String,
    #[serde(default = "default_role")]
    pub role: MemberRole,
}

const fn default_role() -> MemberRole {
    MemberRole::Member
}

/// Pending invitation as shown to its recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedInvitation {
    pub id: i64,
    pub organization_id: i64,
    pub organization_name: String,
    pub role: MemberRole,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

async fn set_status<C: ConnectionTrait>(
    db: &C,
    invitation: invitation::Model,
    status: InvitationStatus,
) -> Result<invitation::Model> {
    transitions::ensure_transition(invitation.status, status)?;
    let mut active: invitation::ActiveModel = invitation.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Marks the invitation expired when its deadline passed; returns the fresh row.
async fn expire_if_due(
    db: &DatabaseConnection,
    invitation: invitation::Model,
    now: DateTime<Utc>,
) -> Result<invitation::Model> {
    if invitation.status == InvitationStatus::Pending && invitation.expires_at <= now {
        return set_status(db, invitation, InvitationStatus::Expired).await;
    }
    Ok(invitation)
}

/// Invites `form.email` into the organization; requires `ADMIN`.
///
/// # Errors
/// - `Validation` for a malformed email
/// - `Forbidden` when a non-owner tries to invite an owner
/// - `Conflict` when the address already belongs to a member or has a pending invitation
pub async fn create_invitation(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    ttl: Duration,
    user_id: i64,
    organization_id: i64,
    form: &InvitationForm,
) -> Result<invitation::Model> {
    let email = validation::email("email", &form.email)?;
    let actor = auth::require_member_role(db, user_id, organization_id, MemberRole::Admin).await?;
    if form.role == MemberRole::Owner && actor.role != MemberRole::Owner {
        return Err(Error::forbidden("only an owner can invite another owner"));
    }

    if let Some(existing_user) = User::find()
        .filter(UserColumn::Email.eq(email.as_str()))
        .one(db)
        .await?
    {
        let already_member = Member::find()
            .filter(MemberColumn::OrganizationId.eq(organization_id))
            .filter(MemberColumn::UserId.eq(existing_user.id))
            .one(db)
            .await?
            .is_some();
        if already_member {
            return Err(Error::conflict(format!("{email} is already a member")));
        }
    }

    let now = Utc::now();
    let pending = Invitation::find()
        .filter(InvitationColumn::OrganizationId.eq(organization_id))
        .filter(InvitationColumn::Email.eq(email.as_str()))
        .filter(InvitationColumn::Status.eq(InvitationStatus::Pending))
        .all(db)
        .await?;
    for invitation in pending {
        if expire_if_due(db, invitation, now).await?.status == InvitationStatus::Pending {
            return Err(Error::conflict(format!(
                "{email} already has a pending invitation"
            )));
        }
    }

    let organization = Organization::find_by_id(organization_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("organization", organization_id))?;
    let inviter = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(Error::Unauthorized)?;

    let created = invitation::ActiveModel {
        organization_id: Set(organization_id),
        email: Set(email),
        role: Set(form.role),
        status: Set(InvitationStatus::Pending),
        token: Set(Uuid::new_v4().simple().to_string()),
        invited_by: Set(user_id),
        expires_at: Set(now + ttl),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    mailer.send_invitation(&InvitationEmail {
        to: created.email.clone(),
        organization_name: organization.name,
        invited_by: inviter.name,
        token: created.token.clone(),
        expires_at: created.expires_at,
    });
    info!(
        "invitation {} sent to {} for organization {organization_id}",
        created.id, created.email
    );
    Ok(created)
}

/// Invitations of the organization, newest first, optionally filtered by status.
pub async fn list_invitations(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    status: Option<InvitationStatus>,
) -> Result<Vec<invitation::Model>> {
    auth::require_member_role(db, user_id, organization_id, MemberRole::Admin).await?;

    let mut query = Invitation::find().filter(InvitationColumn::OrganizationId.eq(organization_id));
    if let Some(status) = status {
        query = query.filter(InvitationColumn::Status.eq(status));
    }
    query
        .order_by_desc(InvitationColumn::CreatedAt)
        .order_by_desc(InvitationColumn::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Pending, unexpired invitations addressed to the user.
pub async fn list_invitations_for_user(
    db: &DatabaseConnection,
    user: &user::Model,
) -> Result<Vec<ReceivedInvitation>> {
    let rows = Invitation::find()
        .filter(InvitationColumn::Email.eq(user.email.as_str()))
        .filter(InvitationColumn::Status.eq(InvitationStatus::Pending))
        .filter(InvitationColumn::ExpiresAt.gt(Utc::now()))
        .find_also_related(Organization)
        .order_by_desc(InvitationColumn::CreatedAt)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(invitation, organization)| {
            organization.map(|organization| ReceivedInvitation {
                id: invitation.id,
                organization_id: organization.id,
                organization_name: organization.name,
                role: invitation.role,
                token: invitation.token,
                expires_at: invitation.expires_at,
            })
        })
        .collect())
}

/// Withdraws a pending invitation; requires `ADMIN`.
pub async fn cancel_invitation(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    invitation_id: i64,
) -> Result<invitation::Model> {
    auth::require_member_role(db, user_id, organization_id, MemberRole::Admin).await?;
    let invitation = Invitation::find_by_id(invitation_id)
        .filter(InvitationColumn::OrganizationId.eq(organization_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("invitation", invitation_id))?;
    set_status(db, invitation, InvitationStatus::Cancelled).await
}

/// Loads a pending invitation addressed to `user`, expiring it if overdue.
async fn claimable_invitation(
    db: &DatabaseConnection,
    user: &user::Model,
    token: &str,
) -> Result<invitation::Model> {
    let invitation = Invitation::find()
        .filter(InvitationColumn::Token.eq(token))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("invitation", "token"))?;

    if invitation.email != user.email {
        return Err(Error::forbidden("this invitation was sent to another address"));
    }

    let invitation = expire_if_due(db, invitation, Utc::now()).await?;
    if invitation.status == InvitationStatus::Expired {
        return Err(Error::validation("token", "this invitation has expired"));
    }
    Ok(invitation)
}

/// Accepts the invitation and creates the membership.
pub async fn accept_invitation(
    db: &DatabaseConnection,
    user: &user::Model,
    token: &str,
) -> Result<member::Model> {
    let invitation = claimable_invitation(db, user, token).await?;
    transitions::ensure_transition(invitation.status, InvitationStatus::Accepted)?;

    let txn = db.begin().await?;
    let already_member = Member::find()
        .filter(MemberColumn::OrganizationId.eq(invitation.organization_id))
        .filter(MemberColumn::UserId.eq(user.id))
        .one(&txn)
        .await?
        .is_some();
    if already_member {
        return Err(Error::conflict("you are already a member of this organization"));
    }

    let member = member::ActiveModel {
        organization_id: Set(invitation.organization_id),
        user_id: Set(user.id),
        role: Set(invitation.role),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    let organization_id = invitation.organization_id;
    set_status(&txn, invitation, InvitationStatus::Accepted).await?;
    txn.commit().await?;

    info!("user {} joined organization {organization_id}", user.id);
    Ok(member)
}

/// Declines the invitation.
pub async fn reject_invitation(
    db: &DatabaseConnection,
    user: &user::Model,
    token: &str,
) -> Result<invitation::Model> {
    let invitation = claimable_invitation(db, user, token).await?;
    set_status(db, invitation, InvitationStatus::Rejected).await
}

/// Marks every overdue pending invitation as expired; returns how many changed.
pub async fn expire_stale_invitations(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<u64> {
    let result = Invitation::update_many()
        .col_expr(
            InvitationColumn::Status,
            Expr::value(InvitationStatus::Expired.to_value()),
        )
        .col_expr(InvitationColumn::UpdatedAt, Expr::value(now))
        .filter(InvitationColumn::Status.eq(InvitationStatus::Pending))
        .filter(InvitationColumn::ExpiresAt.lte(now))
        .exec(db)
        .await?;
    if result.rows_affected > 0 {
        warn!("{} invitations expired without an answer", result.rows_affected);
    }
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::mailer::RecordingMailer;
    use crate::test_utils::*;

    fn form(email: &str, role: MemberRole) -> InvitationForm {
        InvitationForm {
            email: email.to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_invite_and_accept() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let mailer = RecordingMailer::default();

        let invitation = create_invitation(
            &db,
            &mailer,
            Duration::days(7),
            owner.id,
            org.id,
            &form("New@Example.com", MemberRole::Admin),
        )
        .await?;
        assert_eq!(invitation.email, "new@example.com");
        assert_eq!(invitation.status, InvitationStatus::Pending);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].token, invitation.token);
        assert_eq!(sent[0].organization_name, org.name);

        let invitee = create_test_user(&db, "new@example.com").await?;
        let received = list_invitations_for_user(&db, &invitee).await?;
        assert_eq!(received.len(), 1);

        let member = accept_invitation(&db, &invitee, &invitation.token).await?;
        assert_eq!(member.role, MemberRole::Admin);
        assert_eq!(member.organization_id, org.id);

        let stored = Invitation::find_by_id(invitation.id).one(&db).await?.unwrap();
        assert_eq!(stored.status, InvitationStatus::Accepted);

        // A used token cannot be replayed
        let again = accept_invitation(&db, &invitee, &invitation.token).await;
        assert!(matches!(again, Err(Error::InvalidTransition { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_pending_invitation_conflicts() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let mailer = RecordingMailer::default();
        let f = form("x@example.com", MemberRole::Member);
        create_invitation(&db, &mailer, Duration::days(7), owner.id, org.id, &f).await?;
        let result = create_invitation(&db, &mailer, Duration::days(7), owner.id, org.id, &f).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));
        assert_eq!(mailer.sent().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_inviting_existing_member_conflicts() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let result = create_invitation(
            &db,
            &RecordingMailer::default(),
            Duration::days(7),
            owner.id,
            org.id,
            &form(&owner.email, MemberRole::Member),
        )
        .await;
        assert!(matches!(result, Err(Error::Conflict { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_cannot_invite_owner() -> Result<()> {
        let (db, _owner, org) = setup_with_organization().await?;
        let admin = create_test_user(&db, "admin@example.com").await?;
        add_test_member(&db, org.id, admin.id, MemberRole::Admin).await?;
        let result = create_invitation(
            &db,
            &RecordingMailer::default(),
            Duration::days(7),
            admin.id,
            org.id,
            &form("boss@example.com", MemberRole::Owner),
        )
        .await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_invitation_cannot_be_accepted() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let mailer = RecordingMailer::default();
        let invitation = create_invitation(
            &db,
            &mailer,
            Duration::seconds(-1),
            owner.id,
            org.id,
            &form("late@example.com", MemberRole::Member),
        )
        .await?;
        let invitee = create_test_user(&db, "late@example.com").await?;

        let result = accept_invitation(&db, &invitee, &invitation.token).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        let stored = Invitation::find_by_id(invitation.id).one(&db).await?.unwrap();
        assert_eq!(stored.status, InvitationStatus::Expired);

        // An expired invitation no longer blocks a new one
        create_invitation(
            &db,
            &mailer,
            Duration::days(1),
            owner.id,
            org.id,
            &form("late@example.com", MemberRole::Member),
        )
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_wrong_recipient_is_forbidden() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let invitation = create_invitation(
            &db,
            &RecordingMailer::default(),
            Duration::days(7),
            owner.id,
            org.id,
            &form("right@example.com", MemberRole::Member),
        )
        .await?;
        let intruder = create_test_user(&db, "wrong@example.com").await?;
        let result = accept_invitation(&db, &intruder, &invitation.token).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_reject_and_cancel() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let mailer = RecordingMailer::default();
        let first = create_invitation(
            &db,
            &mailer,
            Duration::days(7),
            owner.id,
            org.id,
            &form("a@example.com", MemberRole::Member),
        )
        .await?;
        let second = create_invitation(
            &db,
            &mailer,
            Duration::days(7),
            owner.id,
            org.id,
            &form("b@example.com", MemberRole::Member),
        )
        .await?;

        let a = create_test_user(&db, "a@example.com").await?;
        let rejected = reject_invitation(&db, &a, &first.token).await?;
        assert_eq!(rejected.status, InvitationStatus::Rejected);

        let cancelled = cancel_invitation(&db, owner.id, org.id, second.id).await?;
        assert_eq!(cancelled.status, InvitationStatus::Cancelled);
        let again = cancel_invitation(&db, owner.id, org.id, second.id).await;
        assert!(matches!(again, Err(Error::InvalidTransition { .. })));

        let pending =
            list_invitations(&db, owner.id, org.id, Some(InvitationStatus::Pending)).await?;
        assert!(pending.is_empty());
        assert_eq!(list_invitations(&db, owner.id, org.id, None).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_expire_stale_invitations() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let mailer = RecordingMailer::default();
        create_invitation(
            &db,
            &mailer,
            Duration::seconds(-5),
            owner.id,
            org.id,
            &form("old@example.com", MemberRole::Member),
        )
        .await?;
        create_invitation(
            &db,
            &mailer,
            Duration::days(3),
            owner.id,
            org.id,
            &form("fresh@example.com", MemberRole::Member),
        )
        .await?;

        assert_eq!(expire_stale_invitations(&db, Utc::now()).await?, 1);
        assert_eq!(expire_stale_invitations(&db, Utc::now()).await?, 0);
        Ok(())
    }
}
