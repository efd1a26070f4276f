//! Organization entity - The tenant boundary.
//!
//! Every business row (clients, suppliers, products, fiscal years...) carries an
//! `organization_id` and is only visible to members of that organization.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Organization database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organizations")]
pub struct Model {
    /// Unique identifier for the organization
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "Acme SARL")
    pub name: String,
    /// URL-safe unique handle
    #[sea_orm(unique)]
    pub slug: String,
    /// Contact email
    pub email: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
    /// Public website
    pub website: Option<String>,
    /// Logo URL returned by the upload service
    pub logo_url: Option<String>,
    /// When the organization was created
    pub created_at: DateTimeUtc,
    /// When the organization was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Organization and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One organization has many members
    #[sea_orm(has_many = "super::member::Entity")]
    Members,
    /// One organization has many clients
    #[sea_orm(has_many = "super::client::Entity")]
    Clients,
    /// One organization has many suppliers
    #[sea_orm(has_many = "super::supplier::Entity")]
    Suppliers,
    /// One organization has many products
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
    /// One organization has many fiscal years
    #[sea_orm(has_many = "super::fiscal_year::Entity")]
    FiscalYears,
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Clients.def()
    }
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Suppliers.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::fiscal_year::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FiscalYears.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
