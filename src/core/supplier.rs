//! Supplier business logic - Handles all supplier-related operations.
//!
//! Mirrors the client rules: organization-scoped references (`FRN-0001` when
//! generated), membership required for every action, contacts and addresses
//! removed along with their supplier.

use crate::{
    core::{
        auth,
        pagination::{self, Page, PageRequest},
        transitions, validation,
    },
    entities::{
        Address, AddressColumn, Contact, ContactColumn, Supplier, SupplierColumn,
        enums::{SupplierStatus, SupplierType},
        supplier,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Condition, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use tracing::info;

use super::client::next_reference_from;

/// Prefix of generated supplier references.
pub const REFERENCE_PREFIX: &str = "FRN";

/// Submitted supplier fields.
#[derive(Debug, Clone, Deserialize)]
pub struct SupplierForm {
    pub reference: Option<String>,
    pub name: String,
    #[serde(default = "default_supplier_type")]
    pub supplier_type: SupplierType,
    /// Initial status on creation (defaults to `ACTIVE`); ignored on update
    pub status: Option<SupplierStatus>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
    pub notes: Option<String>,
}

const fn default_supplier_type() -> SupplierType {
    SupplierType::Other
}

/// Filters for [`list_suppliers`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupplierQuery {
    pub search: Option<String>,
    pub status: Option<SupplierStatus>,
    pub supplier_type: Option<SupplierType>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

fn apply_form(active: &mut supplier::ActiveModel, form: &SupplierForm) -> Result<Option<String>> {
    let reference = match form.reference.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(r) => Some(validation::reference("reference", r)?),
    };
    active.name = Set(validation::required("name", &form.name, 160)?);
    active.supplier_type = Set(form.supplier_type);
    active.email = Set(validation::optional_email("email", form.email.as_deref())?);
    active.phone = Set(validation::optional("phone", form.phone.as_deref(), 32)?);
    active.website = Set(validation::optional("website", form.website.as_deref(), 255)?);
    active.siret = Set(validation::optional_siret("siret", form.siret.as_deref())?);
    active.vat_number = Set(
        validation::optional("vat_number", form.vat_number.as_deref(), 20)?
            .map(|v| v.to_uppercase()),
    );
    active.notes = Set(validation::optional("notes", form.notes.as_deref(), 4000)?);
    Ok(reference)
}

async fn ensure_reference_available<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    reference: &str,
    exclude_id: Option<i64>,
) -> Result<()> {
    let mut query = Supplier::find()
        .filter(SupplierColumn::OrganizationId.eq(organization_id))
        .filter(SupplierColumn::Reference.eq(reference));
    if let Some(id) = exclude_id {
        query = query.filter(SupplierColumn::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::conflict(format!(
            "a supplier with reference '{reference}' already exists"
        )));
    }
    Ok(())
}

async fn find_in_org<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    supplier_id: i64,
) -> Result<supplier::Model> {
    Supplier::find_by_id(supplier_id)
        .filter(SupplierColumn::OrganizationId.eq(organization_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("supplier", supplier_id))
}

/// Verifies that `supplier_id` exists in the organization, without permission checks.
pub(crate) async fn ensure_exists<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    supplier_id: i64,
) -> Result<()> {
    find_in_org(db, organization_id, supplier_id).await.map(|_| ())
}

async fn next_reference_in<C: ConnectionTrait>(db: &C, organization_id: i64) -> Result<String> {
    let references: Vec<String> = Supplier::find()
        .select_only()
        .column(SupplierColumn::Reference)
        .filter(SupplierColumn::OrganizationId.eq(organization_id))
        .filter(SupplierColumn::Reference.starts_with(format!("{REFERENCE_PREFIX}-")))
        .into_tuple()
        .all(db)
        .await?;
    next_reference_from(REFERENCE_PREFIX, references.iter().map(String::as_str))
}

/// Suggests the next free supplier reference.
pub async fn next_supplier_reference(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
) -> Result<String> {
    auth::require_membership(db, user_id, organization_id).await?;
    next_reference_in(db, organization_id).await
}

/// Creates a supplier in the organization.
pub async fn create_supplier(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    form: &SupplierForm,
) -> Result<supplier::Model> {
    let mut active = <supplier::ActiveModel as Default>::default();
    let reference = apply_form(&mut active, form)?;
    let status = form.status.unwrap_or(SupplierStatus::Active);
    if !matches!(status, SupplierStatus::Active | SupplierStatus::Inactive) {
        return Err(Error::validation(
            "status",
            "a new supplier must start as ACTIVE or INACTIVE",
        ));
    }
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    let reference = match reference {
        Some(reference) => {
            ensure_reference_available(&txn, organization_id, &reference, None).await?;
            reference
        }
        None => next_reference_in(&txn, organization_id).await?,
    };

    let now = Utc::now();
    active.organization_id = Set(organization_id);
    active.reference = Set(reference);
    active.status = Set(status);
    active.created_at = Set(now);
    active.updated_at = Set(now);
    let created = active.insert(&txn).await?;
    txn.commit().await?;

    info!(
        "supplier {} ({}) created in organization {organization_id}",
        created.reference, created.id
    );
    Ok(created)
}

pub async fn get_supplier(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    supplier_id: i64,
) -> Result<supplier::Model> {
    auth::require_membership(db, user_id, organization_id).await?;
    find_in_org(db, organization_id, supplier_id).await
}

/// Suppliers of the organization ordered by name, filtered and paginated.
pub async fn list_suppliers(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    query: &SupplierQuery,
) -> Result<Page<supplier::Model>> {
    auth::require_membership(db, user_id, organization_id).await?;

    let mut select = Supplier::find().filter(SupplierColumn::OrganizationId.eq(organization_id));
    if let Some(status) = query.status {
        select = select.filter(SupplierColumn::Status.eq(status));
    }
    if let Some(kind) = query.supplier_type {
        select = select.filter(SupplierColumn::SupplierType.eq(kind));
    }
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(SupplierColumn::Name.contains(term))
                .add(SupplierColumn::Reference.contains(term))
                .add(SupplierColumn::Email.contains(term)),
        );
    }
    let select = select
        .order_by_asc(SupplierColumn::Name)
        .order_by_asc(SupplierColumn::Id);

    pagination::fetch_page(
        db,
        select,
        PageRequest {
            page: query.page,
            per_page: query.per_page,
        },
    )
    .await
}

pub async fn update_supplier(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    supplier_id: i64,
    form: &SupplierForm,
) -> Result<supplier::Model> {
    apply_form(&mut <supplier::ActiveModel as Default>::default(), form)?;
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    let current = find_in_org(&txn, organization_id, supplier_id).await?;
    let current_reference = current.reference.clone();
    let mut active: supplier::ActiveModel = current.into();
    let reference = apply_form(&mut active, form)?.unwrap_or_else(|| current_reference.clone());
    if reference != current_reference {
        ensure_reference_available(&txn, organization_id, &reference, Some(supplier_id)).await?;
    }
    active.reference = Set(reference);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Moves a supplier along the supplier status table.
pub async fn update_supplier_status(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    supplier_id: i64,
    status: SupplierStatus,
) -> Result<supplier::Model> {
    auth::require_membership(db, user_id, organization_id).await?;
    let current = find_in_org(db, organization_id, supplier_id).await?;
    transitions::ensure_transition(current.status, status)?;

    let mut active: supplier::ActiveModel = current.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Deletes a supplier together with its contacts and addresses.
pub async fn delete_supplier(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    supplier_id: i64,
) -> Result<()> {
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    let supplier = find_in_org(&txn, organization_id, supplier_id).await?;
    Contact::delete_many()
        .filter(ContactColumn::SupplierId.eq(supplier_id))
        .exec(&txn)
        .await?;
    Address::delete_many()
        .filter(AddressColumn::SupplierId.eq(supplier_id))
        .exec(&txn)
        .await?;
    supplier.delete(&txn).await?;
    txn.commit().await?;

    info!("supplier {supplier_id} deleted from organization {organization_id}");
    Ok(())
}
