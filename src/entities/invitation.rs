//! Invitation entity - A pending offer for an email address to join an organization.

use super::enums::{InvitationStatus, MemberRole};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Invitation database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invitations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub organization_id: i64,
    /// Invitee email, stored lower-cased
    pub email: String,
    /// Role granted on acceptance
    pub role: MemberRole,
    pub status: InvitationStatus,
    /// Secret sent to the invitee; never serialized back to admins
    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub token: String,
    /// User id of the admin who sent the invitation
    pub invited_by: i64,
    pub expires_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id",
        on_delete = "Cascade"
    )]
    Organization,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
