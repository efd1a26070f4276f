//! Fiscal year entity - An accounting period of the organization.
//!
//! Periods of one organization never overlap and follow each other without gaps.
//! Both bounds are inclusive.

use super::enums::FiscalYearStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Fiscal year database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fiscal_years")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub organization_id: i64,
    /// Label such as "FY 2025"
    pub name: String,
    /// First day of the period
    pub start_date: Date,
    /// Last day of the period
    pub end_date: Date,
    pub status: FiscalYearStatus,
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
