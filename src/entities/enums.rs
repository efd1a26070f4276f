//! Enumerations stored as strings in the database.
//!
//! Each enum derives `DeriveActiveEnum` so SeaORM persists the upper-case string
//! value, and `serde` uses the same spelling on the wire.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of a user inside an organization
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    /// Full control, including deleting the organization
    #[sea_orm(string_value = "OWNER")]
    Owner,
    /// Manages members, invitations and settings
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    /// Works with business data
    #[sea_orm(string_value = "MEMBER")]
    Member,
}

impl MemberRole {
    /// Ordering used by permission checks: MEMBER < ADMIN < OWNER.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Member => 0,
            Self::Admin => 1,
            Self::Owner => 2,
        }
    }

    /// True when this role grants at least the rights of `other`.
    #[must_use]
    pub const fn at_least(self, other: Self) -> bool {
        self.rank() >= other.rank()
    }
}

/// Lifecycle of an invitation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "ACCEPTED")]
    Accepted,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
    #[sea_orm(string_value = "EXPIRED")]
    Expired,
}

/// Legal nature of a client
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientType {
    #[sea_orm(string_value = "INDIVIDUAL")]
    Individual,
    #[sea_orm(string_value = "COMPANY")]
    Company,
}

/// Commercial status of a client
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientStatus {
    #[sea_orm(string_value = "LEAD")]
    Lead,
    #[sea_orm(string_value = "PROSPECT")]
    Prospect,
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "INACTIVE")]
    Inactive,
    #[sea_orm(string_value = "ARCHIVED")]
    Archived,
}

/// Kind of supplier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplierType {
    #[sea_orm(string_value = "MANUFACTURER")]
    Manufacturer,
    #[sea_orm(string_value = "WHOLESALER")]
    Wholesaler,
    #[sea_orm(string_value = "SERVICE_PROVIDER")]
    ServiceProvider,
    #[sea_orm(string_value = "OTHER")]
    Other,
}

/// Relationship status of a supplier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplierStatus {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "INACTIVE")]
    Inactive,
    #[sea_orm(string_value = "BLOCKED")]
    Blocked,
    #[sea_orm(string_value = "ARCHIVED")]
    Archived,
}

/// Purpose of a postal address
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressType {
    #[sea_orm(string_value = "BILLING")]
    Billing,
    #[sea_orm(string_value = "SHIPPING")]
    Shipping,
    #[sea_orm(string_value = "HEADQUARTERS")]
    Headquarters,
    #[sea_orm(string_value = "OTHER")]
    Other,
}

/// Unit a product is sold by
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductUnit {
    #[sea_orm(string_value = "UNIT")]
    Unit,
    #[sea_orm(string_value = "HOUR")]
    Hour,
    #[sea_orm(string_value = "DAY")]
    Day,
    #[sea_orm(string_value = "KILOGRAM")]
    Kilogram,
    #[sea_orm(string_value = "LITER")]
    Liter,
    #[sea_orm(string_value = "METER")]
    Meter,
    #[sea_orm(string_value = "PACKAGE")]
    Package,
}

/// VAT rates applicable to a product
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum VatRate {
    #[sea_orm(string_value = "0")]
    #[serde(rename = "0")]
    Zero,
    #[sea_orm(string_value = "2.1")]
    #[serde(rename = "2.1")]
    SuperReduced,
    #[sea_orm(string_value = "5.5")]
    #[serde(rename = "5.5")]
    Reduced,
    #[sea_orm(string_value = "10")]
    #[serde(rename = "10")]
    Intermediate,
    #[sea_orm(string_value = "20")]
    #[serde(rename = "20")]
    Standard,
}

impl VatRate {
    /// Rate as a percentage (20.0 for the standard rate).
    #[must_use]
    pub const fn percent(self) -> f64 {
        match self {
            Self::Zero => 0.0,
            Self::SuperReduced => 2.1,
            Self::Reduced => 5.5,
            Self::Intermediate => 10.0,
            Self::Standard => 20.0,
        }
    }
}

/// Lifecycle of a fiscal year
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FiscalYearStatus {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "CLOSED")]
    Closed,
    #[sea_orm(string_value = "ARCHIVED")]
    Archived,
}
