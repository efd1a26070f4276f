//! Product entity - Goods or services the organization sells.
//!
//! Products are archived rather than hidden by a soft-delete flag so they stay
//! available for historical documents while disappearing from default listings.

use super::enums::{ProductUnit, VatRate};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning organization
    pub organization_id: i64,
    /// Optional category, cleared when the category is deleted
    pub category_id: Option<i64>,
    /// Organization-scoped reference code (SKU)
    pub reference: String,
    /// Name of the product (e.g., "Consulting day")
    pub name: String,
    pub description: Option<String>,
    /// Unit price excluding VAT
    pub price: f64,
    /// VAT rate applied on top of `price`
    pub vat_rate: VatRate,
    /// Unit the price applies to
    pub unit: ProductUnit,
    /// Archived products are hidden from default listings
    pub is_archived: bool,
    /// When the product was created
    pub created_at: DateTimeUtc,
    /// When the product was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each product belongs to one organization
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id",
        on_delete = "Cascade"
    )]
    Organization,
    /// Each product may belong to one category
    #[sea_orm(
        belongs_to = "super::product_category::Entity",
        from = "Column::CategoryId",
        to = "super::product_category::Column::Id",
        on_delete = "SetNull"
    )]
    Category,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::product_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
