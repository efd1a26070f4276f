//! Display metadata for every stored enumeration.
//!
//! Clients render badges and dropdowns from these tables instead of
//! hard-coding labels, so the wording lives in one place.

use crate::entities::enums::{
    AddressType, ClientStatus, ClientType, FiscalYearStatus, InvitationStatus, MemberRole,
    ProductUnit, SupplierStatus, SupplierType, VatRate,
};
use sea_orm::{ActiveEnum, Iterable};
use serde::Serialize;
use std::collections::BTreeMap;

/// Label, badge color and description of one enum value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnumLabel {
    /// Human-readable label
    pub label: &'static str,
    /// Badge color name
    pub color: &'static str,
    /// One-line explanation
    pub description: &'static str,
}

/// Serialized form of one enum value with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelEntry {
    /// Stored value (e.g. `ACTIVE`)
    pub value: String,
    #[serde(flatten)]
    pub meta: EnumLabel,
}

/// Implemented by every enum that has display metadata.
pub trait Labelled: ActiveEnum<Value = String> + Iterable + Copy {
    /// Metadata for this value.
    fn meta(self) -> EnumLabel;

    /// Human-readable label.
    fn label(self) -> &'static str {
        self.meta().label
    }

    /// All values with their metadata, in declaration order.
    fn entries() -> Vec<LabelEntry> {
        Self::iter()
            .map(|v| LabelEntry {
                value: v.to_value(),
                meta: v.meta(),
            })
            .collect()
    }
}

const fn l(label: &'static str, color: &'static str, description: &'static str) -> EnumLabel {
    EnumLabel {
        label,
        color,
        description,
    }
}

impl Labelled for MemberRole {
    fn meta(self) -> EnumLabel {
        match self {
            Self::Owner => l("Owner", "purple", "Full control over the organization"),
            Self::Admin => l("Administrator", "blue", "Manages members, invitations and settings"),
            Self::Member => l("Member", "gray", "Works with the organization's data"),
        }
    }
}

impl Labelled for InvitationStatus {
    fn meta(self) -> EnumLabel {
        match self {
            Self::Pending => l("Pending", "yellow", "Waiting for the invitee to respond"),
            Self::Accepted => l("Accepted", "green", "The invitee joined the organization"),
            Self::Rejected => l("Rejected", "red", "The invitee declined"),
            Self::Cancelled => l("Cancelled", "gray", "Withdrawn by an administrator"),
            Self::Expired => l("Expired", "gray", "No response before the deadline"),
        }
    }
}

impl Labelled for ClientType {
    fn meta(self) -> EnumLabel {
        match self {
            Self::Individual => l("Individual", "teal", "A private person"),
            Self::Company => l("Company", "indigo", "A registered business"),
        }
    }
}

impl Labelled for ClientStatus {
    fn meta(self) -> EnumLabel {
        match self {
            Self::Lead => l("Lead", "yellow", "First contact, not yet qualified"),
            Self::Prospect => l("Prospect", "orange", "Qualified, negotiation in progress"),
            Self::Active => l("Active", "green", "Currently doing business"),
            Self::Inactive => l("Inactive", "gray", "No recent activity"),
            Self::Archived => l("Archived", "slate", "Kept for history only"),
        }
    }
}

impl Labelled for SupplierType {
    fn meta(self) -> EnumLabel {
        match self {
            Self::Manufacturer => l("Manufacturer", "indigo", "Produces the goods it sells"),
            Self::Wholesaler => l("Wholesaler", "blue", "Resells goods in bulk"),
            Self::ServiceProvider => l("Service provider", "teal", "Provides services"),
            Self::Other => l("Other", "gray", "Any other kind of supplier"),
        }
    }
}

impl Labelled for SupplierStatus {
    fn meta(self) -> EnumLabel {
        match self {
            Self::Active => l("Active", "green", "Orders can be placed"),
            Self::Inactive => l("Inactive", "gray", "No current orders"),
            Self::Blocked => l("Blocked", "red", "Orders are suspended"),
            Self::Archived => l("Archived", "slate", "Kept for history only"),
        }
    }
}

impl Labelled for AddressType {
    fn meta(self) -> EnumLabel {
        match self {
            Self::Billing => l("Billing", "blue", "Where invoices are sent"),
            Self::Shipping => l("Shipping", "green", "Where goods are delivered"),
            Self::Headquarters => l("Headquarters", "purple", "Registered office"),
            Self::Other => l("Other", "gray", "Any other address"),
        }
    }
}

impl Labelled for ProductUnit {
    fn meta(self) -> EnumLabel {
        match self {
            Self::Unit => l("Unit", "gray", "Sold per piece"),
            Self::Hour => l("Hour", "blue", "Billed per hour"),
            Self::Day => l("Day", "indigo", "Billed per day"),
            Self::Kilogram => l("Kilogram", "green", "Sold by weight"),
            Self::Liter => l("Liter", "teal", "Sold by volume"),
            Self::Meter => l("Meter", "orange", "Sold by length"),
            Self::Package => l("Package", "yellow", "Sold as a bundle"),
        }
    }
}

impl Labelled for VatRate {
    fn meta(self) -> EnumLabel {
        match self {
            Self::Zero => l("0 %", "gray", "Exempt"),
            Self::SuperReduced => l("2.1 %", "teal", "Super-reduced rate"),
            Self::Reduced => l("5.5 %", "green", "Reduced rate"),
            Self::Intermediate => l("10 %", "blue", "Intermediate rate"),
            Self::Standard => l("20 %", "indigo", "Standard rate"),
        }
    }
}

impl Labelled for FiscalYearStatus {
    fn meta(self) -> EnumLabel {
        match self {
            Self::Active => l("Active", "green", "Open for bookkeeping"),
            Self::Closed => l("Closed", "orange", "Locked, can be reopened"),
            Self::Archived => l("Archived", "slate", "Permanently locked"),
        }
    }
}

/// The whole catalog keyed by enum name.
#[must_use]
pub fn all_enum_labels() -> BTreeMap<&'static str, Vec<LabelEntry>> {
    BTreeMap::from([
        ("address_type", AddressType::entries()),
        ("client_status", ClientStatus::entries()),
        ("client_type", ClientType::entries()),
        ("fiscal_year_status", FiscalYearStatus::entries()),
        ("invitation_status", InvitationStatus::entries()),
        ("member_role", MemberRole::entries()),
        ("product_unit", ProductUnit::entries()),
        ("supplier_status", SupplierStatus::entries()),
        ("supplier_type", SupplierType::entries()),
        ("vat_rate", VatRate::entries()),
    ])
}
