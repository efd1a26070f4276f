//! Client entity - A customer of the organization.
//!
//! `reference` is the organization's own code for the client (e.g. `CLI-0042`)
//! and is unique per organization, enforced by a composite index.

use super::enums::{ClientStatus, ClientType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Client database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "clients")]
pub struct Model {
    /// Unique identifier for the client
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning organization
    pub organization_id: i64,
    /// Organization-scoped reference code
    pub reference: String,
    /// Company or person name
    pub name: String,
    /// Individual or company
    pub client_type: ClientType,
    /// Commercial status, changed through the transition table only
    pub status: ClientStatus,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    /// French company establishment number
    pub siret: Option<String>,
    /// Intra-community VAT number
    pub vat_number: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Client and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each client belongs to one organization
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id",
        on_delete = "Cascade"
    )]
    Organization,
    /// One client has many contacts
    #[sea_orm(has_many = "super::contact::Entity")]
    Contacts,
    /// One client has many addresses
    #[sea_orm(has_many = "super::address::Entity")]
    Addresses,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::contact::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contacts.def()
    }
}

impl Related<super::address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Addresses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
